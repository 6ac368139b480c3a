//! # Directive scanner
//!
//! Resolves the settings in effect for a node (language, comment
//! delimiters, encoding, tab width, line ending, page width) from the
//! directives in its own body and its ancestors' bodies, nearest first.
//! Recomputed at the start of every read and write.

use crate::config::CodecConfig;
use crate::delims::{
    delims_for_language, delims_from_delims_directive, delims_from_string, language_for_extension,
    CommentDelims,
};
use atfile_outline::{AncestorDirectives, OutlineModel, Position};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument, warn};

/// PEP 263 source encoding declaration
static PYTHON_CODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t\f]*#.*?coding[:=][ \t]*([-\w.]+)").expect("coding pattern is valid")
});

/// Headline prefixes of nodes that correspond to external files
const FILE_NODE_KINDS: &[&str] = &[
    "@file",
    "@thin",
    "@nosent",
    "@clean",
    "@asis",
    "@auto",
    "@edit",
    "@shadow",
    "@file-thin",
    "@file-nosent",
    "@file-asis",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`, also spelled `lf`
    Nl,
    Cr,
    CrLf,
    Platform,
}

impl LineEnding {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nl" | "lf" => Some(Self::Nl),
            "cr" => Some(Self::Cr),
            "crlf" => Some(Self::CrLf),
            "platform" => Some(Self::Platform),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nl => "\n",
            Self::Cr => "\r",
            Self::CrLf => "\r\n",
            Self::Platform if cfg!(windows) => "\r\n",
            Self::Platform => "\n",
        }
    }

    /// Convert `\n`-terminated text to this line ending
    pub fn apply(self, text: &str) -> String {
        match self.as_str() {
            "\n" => text.to_string(),
            ending => text.replace('\n', ending),
        }
    }
}

/// Effective settings for one read or write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveSettings {
    pub encoding: String,
    pub language: String,
    pub delims: CommentDelims,
    pub tab_width: i32,
    pub line_ending: LineEnding,
    pub page_width: u32,
    pub path: Option<String>,
    /// True when the language had no known comment syntax and `#` was used instead
    pub delims_fallback: bool,
}

impl DirectiveSettings {
    /// Settings from configuration alone
    pub fn from_config(config: &CodecConfig) -> Self {
        let (delims, delims_fallback) = resolve_language_delims(&config.default_language);
        Self {
            encoding: config.default_encoding.clone(),
            language: config.default_language.clone(),
            delims,
            tab_width: config.tab_width,
            line_ending: LineEnding::parse(&config.line_ending).unwrap_or(LineEnding::Nl),
            page_width: config.page_width,
            path: None,
            delims_fallback,
        }
    }
}

/// If `headline` names an external file node, the file's path
pub fn file_node_path(headline: &str) -> Option<&str> {
    let h = headline.trim();
    let word_end = h.find(char::is_whitespace).unwrap_or(h.len());
    let (word, rest) = h.split_at(word_end);
    let is_file_kind = FILE_NODE_KINDS.contains(&word) || word.starts_with("@auto-");
    let path = rest.trim();
    (is_file_kind && !path.is_empty()).then_some(path)
}

pub fn is_file_node(headline: &str) -> bool {
    file_node_path(headline).is_some()
}

/// Resolve the settings in effect at `position`
#[instrument(skip(model, config), fields(gnx = %position.gnx()))]
pub fn scan_directives<M: OutlineModel + ?Sized>(
    model: &M,
    position: &Position,
    config: &CodecConfig,
) -> DirectiveSettings {
    let ancestors = model.ancestor_directives(position);
    let mut settings = DirectiveSettings::from_config(config);

    if let Some(encoding) = nearest(&ancestors, "encoding") {
        settings.encoding = encoding.to_string();
    }
    if let Some(value) = nearest(&ancestors, "tabwidth") {
        match value.parse::<i32>() {
            Ok(w) if w != 0 => settings.tab_width = w,
            _ => warn!(value, "Ignoring invalid @tabwidth"),
        }
    }
    if let Some(value) = nearest(&ancestors, "pagewidth") {
        match value.parse::<u32>() {
            Ok(w) if w > 0 => settings.page_width = w,
            _ => warn!(value, "Ignoring invalid @pagewidth"),
        }
    }
    if let Some(value) = nearest(&ancestors, "lineending") {
        match LineEnding::parse(value) {
            Some(ending) => settings.line_ending = ending,
            None => warn!(value, "Ignoring invalid @lineending"),
        }
    }
    settings.path = nearest(&ancestors, "path").map(str::to_string);

    settings.language = match nearest(&ancestors, "language") {
        Some(language) => language
            .split_whitespace()
            .next()
            .unwrap_or(language)
            .to_lowercase(),
        None => infer_language(&ancestors).unwrap_or_else(|| config.default_language.clone()),
    };

    let deciding = ancestors.iter().find(|a| {
        a.contains("comment") || a.contains("delims") || a.contains("language")
    });
    let explicit = deciding.and_then(|a| {
        if let Some(comment) = a.get("comment") {
            delims_from_string(comment).preferred()
        } else if let Some(delims) = a.get("delims") {
            delims_from_delims_directive(delims)
        } else {
            None
        }
    });
    match explicit {
        Some(delims) => {
            settings.delims = delims;
            settings.delims_fallback = false;
        }
        None => {
            let (delims, fallback) = resolve_language_delims(&settings.language);
            settings.delims = delims;
            settings.delims_fallback = fallback;
        }
    }

    if nearest(&ancestors, "encoding").is_none() && settings.language == "python" {
        if let Some(coding) = python_coding(model.get_body(position.gnx())) {
            settings.encoding = coding;
        }
    }

    debug!(
        language = %settings.language,
        delims = ?settings.delims,
        encoding = %settings.encoding,
        "Resolved directives"
    );
    settings
}

fn nearest<'a>(ancestors: &'a [AncestorDirectives], key: &str) -> Option<&'a str> {
    ancestors.iter().find_map(|a| a.get(key))
}

fn infer_language(ancestors: &[AncestorDirectives]) -> Option<String> {
    let path = ancestors.iter().find_map(|a| file_node_path(&a.headline))?;
    let ext = Path::new(path).extension()?.to_str()?;
    language_for_extension(ext).map(str::to_string)
}

fn resolve_language_delims(language: &str) -> (CommentDelims, bool) {
    match delims_for_language(language).and_then(|spec| spec.preferred()) {
        Some(delims) => (delims, false),
        None => {
            warn!(language, "No comment delimiters for language, using #");
            (CommentDelims::fallback(), true)
        }
    }
}

/// Coding declaration in the first two lines after any `@first` lines
fn python_coding(body: &str) -> Option<String> {
    body.lines()
        .map(|line| line.strip_prefix("@first").map_or(line, str::trim_start))
        .take(2)
        .find_map(|line| PYTHON_CODING.captures(line).map(|c| c[1].to_lowercase()))
}
