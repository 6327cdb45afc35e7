//! Line-oriented text builder with scoped indentation.
//!
//! Shared by the C code generator and the lowered-AST dumper.  Indentation
//! is two spaces per level and is applied when a line is pushed, so callers
//! never format leading whitespace themselves.

pub struct CodeWriter {
    lines: Vec<String>,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            indent: 0,
        }
    }

    /// Push one line at the current indentation level.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", "  ".repeat(self.indent), text));
        }
    }

    /// Push an empty separator line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Run `f` with the indentation level raised by one.  The level is
    /// restored on every exit path out of the closure.
    pub fn indented<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_indent();
        let out = f(self);
        self.pop_indent();
        out
    }

    /// Manual indent control for emitters whose scope also spans other
    /// state (a scope stack, a visitor).  Prefer [`Self::indented`] when
    /// the writer is the only thing in scope.
    pub fn push_indent(&mut self) {
        self.indent += 1;
    }

    pub fn pop_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn build(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut w = CodeWriter::new();
        w.line("int64_t x = 0;");
        assert_eq!(w.build(), "int64_t x = 0;\n");
    }

    #[test]
    fn test_indented_block() {
        let mut w = CodeWriter::new();
        w.line("{");
        w.indented(|w| {
            w.line("return 1;");
        });
        w.line("}");
        assert_eq!(w.build(), "{\n  return 1;\n}\n");
    }

    #[test]
    fn test_nested_indent_restored() {
        let mut w = CodeWriter::new();
        w.indented(|w| {
            w.indented(|w| w.line("deep"));
            w.line("mid");
        });
        w.line("top");
        assert_eq!(w.build(), "    deep\n  mid\ntop\n");
    }

    #[test]
    fn test_blank_line_has_no_indent() {
        let mut w = CodeWriter::new();
        w.indented(|w| {
            w.blank();
            w.line("x");
        });
        assert_eq!(w.build(), "\n  x\n");
    }
}
