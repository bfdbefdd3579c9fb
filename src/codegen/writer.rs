//! Indented C# text output.

use std::fmt;

/// Header placed at the top of every generated file
pub const FILE_HEADER: &[&str] = &[
    "// <auto-generated/>",
    "#pragma warning disable",
    "#nullable enable",
];

const INDENT: &str = "    ";

/// Line oriented writer for generated C# source
#[derive(Debug, Default, Clone)]
pub struct CodeWriter {
    output: String,
    depth: usize,
}

impl CodeWriter {
    /// Creates an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that starts with the generated file header
    #[must_use]
    pub fn with_header() -> Self {
        let mut writer = Self::new();
        for line in FILE_HEADER {
            writer.line(line);
        }
        writer.blank();
        writer
    }

    /// Writes one line at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.output.push_str(INDENT);
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
        self
    }

    /// Writes several lines
    pub fn lines<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line);
        }
        self
    }

    /// Writes an empty line
    pub fn blank(&mut self) -> &mut Self {
        self.output.push('\n');
        self
    }

    /// Writes `header` followed by `{` and indents
    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        self.line(header);
        self.line("{");
        self.depth += 1;
        self
    }

    /// Dedents and writes `}`
    pub fn close(&mut self) -> &mut Self {
        self.close_with("}")
    }

    /// Dedents and writes a closing line such as `};` or `});`
    pub fn close_with(&mut self, text: &str) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(text)
    }

    /// Writes `header { body }` with `body` emitted one level deeper
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.open(header);
        body(self);
        self.close()
    }

    /// Increases indentation without writing a brace
    pub fn indent(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    /// Decreases indentation without writing a brace
    pub fn dedent(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self
    }

    /// Current indentation depth
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the written text
    #[must_use]
    pub fn finish(self) -> String {
        self.output
    }
}

impl fmt::Display for CodeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}

/// One generated source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// Unique, stable file name
    pub hint_name: String,
    /// C# source text
    pub text: String,
}

impl GeneratedSource {
    /// Creates a source file
    #[must_use]
    pub fn new(hint_name: impl Into<String>, text: impl Into<String>) -> Self {
        GeneratedSource {
            hint_name: hint_name.into(),
            text: text.into(),
        }
    }
}

/// Escapes text for a regular C# string literal
#[must_use]
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Renders text as a quoted C# string literal
#[must_use]
pub fn string_literal(text: &str) -> String {
    format!("\"{}\"", escape_string(text))
}
