//! The assembly text emitter.
//!
//! Collects instructions, labels and source-line comments into the textual
//! VM assembly consumed by the assembler. Label numbering is a per-module
//! monotonic counter, so labels never collide within one module's output.
//! Builtin snippets are tracked by key and appended once, at the end of the
//! script, in first-use order.

use indexmap::IndexSet;

/// Assembly output buffer.
#[derive(Debug, Default)]
pub struct Emitter {
    buf: String,
    label_counter: u32,
    indent: usize,
    current_line: u32,
    builtins: IndexSet<&'static str>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next label number.
    pub fn next_id(&mut self) -> u32 {
        let id = self.label_counter;
        self.label_counter += 1;
        id
    }

    /// Emit one instruction at the current indentation.
    pub fn op(&mut self, text: impl AsRef<str>) {
        for _ in 0..=self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    /// Emit a label definition at column zero.
    pub fn label(&mut self, label: &str) {
        self.buf.push_str(label);
        self.buf.push_str(":\n");
    }

    /// Emit a comment line at the current indentation.
    pub fn comment(&mut self, text: &str) {
        for _ in 0..=self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str("// ");
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Emit a `// Line N: <source>` annotation when the line changes.
    pub fn source_line(&mut self, line: u32, text: Option<&str>) {
        if line == self.current_line || line == 0 {
            return;
        }
        self.current_line = line;
        match text {
            Some(text) => self.comment(&format!("Line {line}: {}", text.trim())),
            None => self.comment(&format!("Line {line}")),
        }
    }

    /// Nest one indentation level (block scope depth).
    pub fn indent_push(&mut self) {
        self.indent += 1;
    }

    pub fn indent_pop(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Record that a builtin snippet is needed.
    ///
    /// Returns whether the key was newly recorded; each snippet is appended
    /// exactly once regardless of use count.
    pub fn require_builtin(&mut self, key: &'static str) -> bool {
        self.builtins.insert(key)
    }

    /// Builtin keys in first-use order.
    pub fn builtins(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.iter().copied()
    }

    /// Append raw pre-formatted text (builtin snippets).
    pub fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
        if !text.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    /// The assembled text.
    pub fn finish(self) -> String {
        self.buf
    }
}
