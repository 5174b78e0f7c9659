//! Small structured writer for JavaScript text. All quoting and
//! identifier checks go through here.

use std::fmt::Write as _;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "let", "static", "implements", "interface",
    "package", "private", "protected", "public", "await",
];

/// Indentation-aware line writer.
#[derive(Debug, Default, Clone)]
pub struct JsWriter {
    buf: String,
    indent: usize,
}

impl JsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        JsWriter {
            buf: String::new(),
            indent,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    /// Writes `header` (which should end in `{`) and indents.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.indent += 1;
    }

    /// Dedents and writes `trailer`, typically `}` or `};`.
    pub fn close(&mut self, trailer: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(trailer);
    }

    /// Indents without writing.
    pub fn enter(&mut self) {
        self.indent += 1;
    }

    pub fn leave(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Writes one level out from the current indentation, for `case` labels.
    pub fn label(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    /// Appends text as is.
    pub fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Text written since the last opening brace, for error reports.
    pub fn tail(&self) -> &str {
        match self.buf.rfind('{') {
            Some(pos) => &self.buf[pos..],
            None => &self.buf,
        }
    }
}

/// Single quoted JavaScript string literal.
pub fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$');
    first_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !RESERVED.contains(&name)
}

/// `obj.name`, or `obj['name']` when `name` is not a plain identifier.
pub fn property(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{object}.{name}")
    } else {
        bracket(object, name)
    }
}

/// Always `obj['name']`; survives renaming by a minifier.
pub fn bracket(object: &str, name: &str) -> String {
    format!("{object}[{}]", js_string(name))
}

pub fn call(callee: &str, args: &[String]) -> String {
    format!("{callee}({})", args.join(", "))
}

pub fn js_int(v: i32) -> String {
    v.to_string()
}

pub fn js_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if v == 0.0 && v.is_sign_negative() {
        "-0".into()
    } else {
        format!("{v:?}")
    }
}

/// Floats are stored widened; the decimal form of the widened value reads
/// back to the same bits.
pub fn js_float(v: f32) -> String {
    js_double(v as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_tracks_indentation() {
        let mut w = JsWriter::new();
        w.open("function f() {");
        w.line("return 1;");
        w.close("}");
        assert_eq!(w.as_str(), "function f() {\n  return 1;\n}\n");
        assert_eq!(w.tail(), "{\n  return 1;\n}\n");
    }

    #[test]
    fn escapes_string_literals() {
        assert_eq!(js_string("it's"), "'it\\'s'");
        assert_eq!(js_string("a\\b\n"), "'a\\\\b\\n'");
        assert_eq!(js_string("\u{0}\u{2028}"), "'\\x00\\u2028'");
        assert_eq!(js_string("caf\u{e9}"), "'caf\u{e9}'");
    }

    #[test]
    fn picks_dot_or_bracket_access() {
        assert_eq!(property("vm", "a_B"), "vm.a_B");
        assert_eq!(property("vm", "new"), "vm['new']");
        assert_eq!(property("o", "$instOf_a_B"), "o.$instOf_a_B");
        assert_eq!(property("o", "9x"), "o['9x']");
        assert_eq!(bracket("o", "m__V"), "o['m__V']");
    }

    #[test]
    fn formats_numbers() {
        assert_eq!(js_double(1.5), "1.5");
        assert_eq!(js_double(1.0), "1.0");
        assert_eq!(js_double(-0.0), "-0");
        assert_eq!(js_double(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(js_double(1e300), "1e300");
        assert_eq!(js_float(0.1), "0.10000000149011612");
        assert_eq!(js_int(-2147483648), "-2147483648");
    }
}
