//! Comment delimiters and the language tables that produce them.

use serde::{Deserialize, Serialize};

/// The comment syntax sentinels are written in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentDelims {
    /// Single-line comment, e.g. `#` or `//`
    Line(String),
    /// Open/close pair, e.g. `/*` and `*/`
    Block { start: String, end: String },
}

impl CommentDelims {
    pub fn line(start: impl Into<String>) -> Self {
        Self::Line(start.into())
    }

    pub fn block(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::Block {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Build from a `(start, end)` pair; an empty end means a single-line comment
    pub fn from_pair(start: &str, end: &str) -> Self {
        if end.is_empty() {
            Self::line(start)
        } else {
            Self::block(start, end)
        }
    }

    pub fn start(&self) -> &str {
        match self {
            Self::Line(start) => start,
            Self::Block { start, .. } => start,
        }
    }

    /// Closing delimiter, empty for single-line comments
    pub fn end(&self) -> &str {
        match self {
            Self::Line(_) => "",
            Self::Block { end, .. } => end,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    /// The delimiter used when nothing better is known
    pub fn fallback() -> Self {
        Self::line("#")
    }
}

/// Up to three delimiters: a single-line comment and a block pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelimSpec {
    pub line: String,
    pub block_start: String,
    pub block_end: String,
}

impl DelimSpec {
    /// Single-line comments are preferred when the language has both kinds
    pub fn preferred(&self) -> Option<CommentDelims> {
        if !self.line.is_empty() {
            Some(CommentDelims::line(self.line.clone()))
        } else if !self.block_start.is_empty() && !self.block_end.is_empty() {
            Some(CommentDelims::block(
                self.block_start.clone(),
                self.block_end.clone(),
            ))
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && self.block_start.is_empty() && self.block_end.is_empty()
    }
}

/// Parse the argument of `@comment` (or a language table entry).
///
/// One token is a single-line delimiter, two tokens are a block pair and
/// three tokens are both. Within a token `__` stands for a newline and `_`
/// for a space; a token spelled `@0x<hex>` is hex-decoded.
pub fn delims_from_string(s: &str) -> DelimSpec {
    let s = s.trim_start();
    let s = match s.strip_prefix("@comment") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        _ => s,
    };
    let tokens: Vec<String> = s
        .split_whitespace()
        .take(3)
        .map(decode_delim_token)
        .collect();
    match tokens.as_slice() {
        [line] => DelimSpec {
            line: line.clone(),
            ..DelimSpec::default()
        },
        [start, end] => DelimSpec {
            line: String::new(),
            block_start: start.clone(),
            block_end: end.clone(),
        },
        [line, start, end] => DelimSpec {
            line: line.clone(),
            block_start: start.clone(),
            block_end: end.clone(),
        },
        _ => DelimSpec::default(),
    }
}

/// Parse the argument of `@delims`: a start delimiter and an optional end delimiter
pub fn delims_from_delims_directive(s: &str) -> Option<CommentDelims> {
    let mut tokens = s.split_whitespace().map(decode_delim_token);
    let start = tokens.next()?;
    let end = tokens.next().unwrap_or_default();
    Some(CommentDelims::from_pair(&start, &end))
}

/// Decode `__` to newline, then `_` to space, or a whole `@0x` hex token
pub fn decode_delim_token(token: &str) -> String {
    if let Some(hex) = token.strip_prefix("@0x") {
        if let Some(bytes) = decode_hex(hex) {
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    token.replace("__", "\n").replace('_', " ")
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Comment delimiters for a language, if the language is known
pub fn delims_for_language(language: &str) -> Option<DelimSpec> {
    let language = language.trim().to_lowercase();
    let entry = LANGUAGE_DELIMS
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, delims)| *delims)?;
    Some(delims_from_string(entry))
}

/// Language for a file extension (without the dot)
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    EXTENSION_LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

pub fn is_known_language(language: &str) -> bool {
    delims_for_language(language).is_some()
}

const LANGUAGE_DELIMS: &[(&str, &str)] = &[
    ("actionscript", "// /* */"),
    ("ada", "--"),
    ("asm", ";"),
    ("batch", "REM_"),
    ("c", "// /* */"),
    ("clojure", ";"),
    ("cpp", "// /* */"),
    ("csharp", "// /* */"),
    ("css", "/* */"),
    ("cweb", "@q@ @>"),
    ("dart", "// /* */"),
    ("elisp", ";"),
    ("elixir", "#"),
    ("erlang", "%"),
    ("fortran", "C"),
    ("fortran90", "!"),
    ("go", "//"),
    ("haskell", "--_ {-_ _-}"),
    ("html", "<!-- -->"),
    ("ini", ";"),
    ("java", "// /* */"),
    ("javascript", "// /* */"),
    ("json", "#"),
    ("julia", "#"),
    ("kotlin", "// /* */"),
    ("latex", "%"),
    ("lisp", ";"),
    ("lua", "--"),
    ("makefile", "#"),
    ("markdown", "<!-- -->"),
    ("matlab", "%"),
    ("nim", "#"),
    ("ocaml", "(* *)"),
    ("pascal", "// { }"),
    ("perl", "#"),
    ("php", "// /* */"),
    ("plain", "#"),
    ("powershell", "#"),
    ("python", "#"),
    ("r", "#"),
    ("rest", ".._"),
    ("ruby", "#"),
    ("rust", "// /* */"),
    ("scala", "// /* */"),
    ("scheme", ";"),
    ("shell", "#"),
    ("sql", "--"),
    ("swift", "// /* */"),
    ("tcl", "#"),
    ("tex", "%"),
    ("text", "#"),
    ("toml", "#"),
    ("typescript", "// /* */"),
    ("unknown", "#"),
    ("vim", "\""),
    ("xml", "<!-- -->"),
    ("yaml", "#"),
    ("zig", "//"),
];

const EXTENSION_LANGUAGES: &[(&str, &str)] = &[
    ("as", "actionscript"),
    ("ada", "ada"),
    ("asm", "asm"),
    ("bat", "batch"),
    ("c", "c"),
    ("cc", "cpp"),
    ("clj", "clojure"),
    ("cpp", "cpp"),
    ("cs", "csharp"),
    ("css", "css"),
    ("cxx", "cpp"),
    ("dart", "dart"),
    ("el", "elisp"),
    ("erl", "erlang"),
    ("ex", "elixir"),
    ("f", "fortran"),
    ("f90", "fortran90"),
    ("go", "go"),
    ("h", "c"),
    ("hpp", "cpp"),
    ("hs", "haskell"),
    ("htm", "html"),
    ("html", "html"),
    ("ini", "ini"),
    ("java", "java"),
    ("jl", "julia"),
    ("js", "javascript"),
    ("json", "json"),
    ("kt", "kotlin"),
    ("lisp", "lisp"),
    ("lua", "lua"),
    ("m", "matlab"),
    ("md", "markdown"),
    ("mk", "makefile"),
    ("ml", "ocaml"),
    ("nim", "nim"),
    ("pas", "pascal"),
    ("php", "php"),
    ("pl", "perl"),
    ("ps1", "powershell"),
    ("py", "python"),
    ("pyw", "python"),
    ("r", "r"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("rst", "rest"),
    ("scala", "scala"),
    ("scm", "scheme"),
    ("sh", "shell"),
    ("sql", "sql"),
    ("swift", "swift"),
    ("tcl", "tcl"),
    ("tex", "latex"),
    ("toml", "toml"),
    ("ts", "typescript"),
    ("txt", "plain"),
    ("vim", "vim"),
    ("w", "cweb"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("zig", "zig"),
];
