use anyhow::Context as _;
use clap::Parser;
use colored::Colorize;
use foc::passes::dump::dump_ast;
use std::io::Read;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "foc",
    about = "Compile Fo source to C",
    version,
    long_about = "foc compiles Fo — a small statically-typed language with simplified-Go \
                  syntax — into C code that links against the Fo runtime.\n\n\
                  Reads the given source file (or stdin when the path is `-` or omitted) \
                  and writes the generated C to stdout."
)]
struct Cli {
    /// Source file to compile; `-` or omitted reads from stdin.
    input: Option<PathBuf>,

    /// Write the generated C here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a closure-capture report (per-function free and captured
    /// variables) instead of generating C.
    #[arg(long)]
    closures: bool,

    /// With --closures, emit the report as JSON.
    #[arg(long)]
    json: bool,

    /// Print the lowered AST after all transformation passes instead of
    /// generating C.
    #[arg(long)]
    dump_ast: bool,
}

fn main() {
    let cli = Cli::parse();

    // ── read source ───────────────────────────────────────────────────────────
    let source = match read_source(cli.input.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {e:#}", "error".red().bold());
            process::exit(2);
        }
    };

    // ── compile ───────────────────────────────────────────────────────────────
    let output = if cli.closures || cli.dump_ast {
        match foc::analyze(&source) {
            Ok(compilation) if cli.closures => {
                let report = compilation.context.report();
                if cli.json {
                    serde_json::to_string_pretty(&report)
                        .expect("the report contains only strings and lists")
                        + "\n"
                } else {
                    report.to_string()
                }
            }
            Ok(compilation) => dump_ast(&compilation.program),
            Err(e) => fail(e),
        }
    } else {
        match foc::compile(&source) {
            Ok(c) => c,
            Err(e) => fail(e),
        }
    };

    // ── write output ──────────────────────────────────────────────────────────
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &output) {
                eprintln!(
                    "{}: cannot write {}: {e}",
                    "error".red().bold(),
                    path.display()
                );
                process::exit(2);
            }
        }
        None => print!("{output}"),
    }
}

fn fail(e: foc::CompileError) -> ! {
    eprintln!("{}: {e}", "error".red().bold());
    process::exit(1);
}

fn read_source(input: Option<&std::path::Path>) -> anyhow::Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            Ok(buf)
        }
    }
}
