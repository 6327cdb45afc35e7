use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

// ── helpers ──────────────────────────────────────────────────────────────────

fn foc_bin() -> PathBuf {
    // CARGO_BIN_EXE_foc is set by cargo test for integration tests
    PathBuf::from(env!("CARGO_BIN_EXE_foc"))
}

struct TempFo {
    dir: tempfile::TempDir,
    path: PathBuf,
}

impl TempFo {
    fn new(content: &str) -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("program.fo");
        std::fs::write(&path, content).unwrap();
        Self { dir, path }
    }

    /// Run foc on the temp file with the given extra args.
    /// Returns (stdout, stderr, exit_code).
    fn run(&self, extra: &[&str]) -> (String, String, i32) {
        let mut cmd = Command::new(foc_bin());
        cmd.arg(&self.path);
        for a in extra {
            cmd.arg(a);
        }
        let out = cmd.output().unwrap();
        (
            String::from_utf8_lossy(&out.stdout).to_string(),
            String::from_utf8_lossy(&out.stderr).to_string(),
            out.status.code().unwrap_or(-1),
        )
    }
}

/// Run foc with `source` piped through stdin.
fn run_stdin(source: &str, extra: &[&str]) -> (String, String, i32) {
    let mut cmd = Command::new(foc_bin());
    for a in extra {
        cmd.arg(a);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(source.as_bytes())
        .unwrap();
    let out = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&out.stdout).to_string(),
        String::from_utf8_lossy(&out.stderr).to_string(),
        out.status.code().unwrap_or(-1),
    )
}

const CLOSURE_PROGRAM: &str = "\
func makeClosure(i int) func() int {
  return func() int { return i; };
}

func main() {
  var f func() int = makeClosure(2);
  var r int = f();
}
";

// ── compilation ──────────────────────────────────────────────────────────────

#[test]
fn test_compile_to_stdout() {
    let t = TempFo::new(CLOSURE_PROGRAM);
    let (stdout, stderr, code) = t.run(&[]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("#include \"runtime/gc.h\""));
    assert!(stdout.contains("makeClosure(NULL, 2)"));
    assert!(stdout.contains("((int64_t(*)(gc_header_t*))get_tuple_at(f, 0))(f)"));
}

#[test]
fn test_compile_from_stdin() {
    let (stdout, stderr, code) = run_stdin("func main() { }", &[]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("void main(gc_header_t* context_tuple)"));
}

#[test]
fn test_dash_reads_stdin() {
    let (stdout, _, code) = run_stdin("func main() { }", &["-"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("void main"));
}

#[test]
fn test_output_file() {
    let t = TempFo::new("func main() { }");
    let out_path = t.dir.path().join("out.c");
    let (stdout, stderr, code) = t.run(&["-o", out_path.to_str().unwrap()]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.is_empty());
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("void main(gc_header_t* context_tuple)"));
}

#[test]
fn test_every_function_gets_a_definition() {
    let t = TempFo::new(
        "func outer(i int) func() int {
  return func() func() int {
    var j int = 2;
    return func() int { i = i + j; return i; };
  }();
}
func main() { var f func() int = outer(1); var r int = f(); }
",
    );
    let (stdout, stderr, code) = t.run(&[]);
    assert_eq!(code, 0, "stderr: {stderr}");
    for name in ["outer", "outer_c0", "outer_c0_c0", "main"] {
        assert!(
            stdout.contains(&format!("{name}(gc_header_t* context_tuple")),
            "missing {name}"
        );
    }
}

// ── diagnostics & exit codes ─────────────────────────────────────────────────

#[test]
fn test_parse_error_exits_1() {
    let t = TempFo::new("func main( { }");
    let (_, stderr, code) = t.run(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("parsing error"));
}

#[test]
fn test_lex_error_reports_line() {
    let t = TempFo::new("func main() {\n  var a int = @;\n}");
    let (_, stderr, code) = t.run(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("lexing error at line 2"));
}

#[test]
fn test_type_mismatch_exits_1() {
    let t = TempFo::new("func main() { var x int = 1; x = 2.5; }");
    let (_, stderr, code) = t.run(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("conflicting types"));
}

#[test]
fn test_unbound_variable_exits_1() {
    let t = TempFo::new("func main() { y = 1; }");
    let (_, stderr, code) = t.run(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unbound variable `y`"));
}

#[test]
fn test_missing_input_file_exits_2() {
    let out = Command::new(foc_bin())
        .arg("no/such/file.fo")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_diagnostic_is_single_line() {
    let t = TempFo::new("func main() { y = 1; }");
    let (_, stderr, _) = t.run(&[]);
    assert_eq!(stderr.trim_end().lines().count(), 1);
}

// ── closure report ───────────────────────────────────────────────────────────

#[test]
fn test_closures_report_text() {
    let t = TempFo::new(CLOSURE_PROGRAM);
    let (stdout, stderr, code) = t.run(&["--closures"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("makeClosure, #free 0, #captured 1"));
    assert!(stdout.contains("makeClosure_c0, #free 1, #captured 0"));
    assert!(stdout.contains("free variables:"));
    assert!(stdout.contains("variables being captured:"));
}

#[test]
fn test_closures_report_json() {
    let t = TempFo::new(CLOSURE_PROGRAM);
    let (stdout, stderr, code) = t.run(&["--closures", "--json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let functions = value["functions"].as_array().unwrap();
    let inner = functions
        .iter()
        .find(|f| f["name"] == "makeClosure_c0")
        .expect("literal in report");
    assert_eq!(inner["free_vars"][0], "i");
}

// ── AST dump ─────────────────────────────────────────────────────────────────

#[test]
fn test_dump_ast() {
    let t = TempFo::new(CLOSURE_PROGRAM);
    let (stdout, stderr, code) = t.run(&["--dump-ast"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("func makeClosure(i_raw int) func() int {"));
    assert!(stdout.contains("var i int;"));
    assert!(stdout.contains("func_lit makeClosure_c0()"));
}
