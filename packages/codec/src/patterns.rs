//! # Sentinel patterns
//!
//! Line matchers for every sentinel kind, compiled for one pair of comment
//! delimiters. The reader rebuilds the set whenever `@comment` or `@delims`
//! changes the delimiters mid-file; the writer uses the same type to spell
//! sentinels so both directions agree on the wire format.
//!
//! Lines are matched with their line terminator removed.

use crate::delims::CommentDelims;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Header sentinel: `<start>@+leo-ver=5-thin[-encoding=<e>,.]<end>`
static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)@\+leo(-ver=(\d+))?(-thin)?(-encoding=(.*)(\.))?(.*)$")
        .expect("header pattern is valid")
});

/// The only derived file version this codec reads and writes
pub const FORMAT_VERSION: u32 = 5;

/// A parsed header sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub delims: CommentDelims,
    pub version: Option<u32>,
    pub thin: bool,
    pub encoding: Option<String>,
}

impl Header {
    /// Parse a header line, if it is one
    pub fn parse(line: &str) -> Option<Header> {
        let line = line.trim_end_matches(['\n', '\r']);
        let caps = HEADER.captures(line)?;
        let start = caps.get(1).map_or("", |m| m.as_str()).trim_start();
        let end = caps.get(8).map_or("", |m| m.as_str()).trim_end();
        let version = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let encoding = caps
            .get(6)
            .map(|m| m.as_str().trim_end_matches(',').to_string())
            .filter(|e| !e.is_empty());
        Some(Header {
            delims: CommentDelims::from_pair(start, end),
            version,
            thin: caps.get(4).is_some(),
            encoding,
        })
    }

    /// Sentinel text of the header, without delimiters
    pub fn sentinel_text(encoding: &str) -> String {
        let mut s = format!("@+leo-ver={}-thin", FORMAT_VERSION);
        let encoding = encoding.to_lowercase();
        if encoding != "utf-8" {
            s.push_str(&format!("-encoding={},.", encoding));
        }
        s
    }
}

/// Which doc-part directive opened a doc part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Bare `@`
    At,
    /// `@doc`
    Doc,
}

impl DocKind {
    pub fn directive(self) -> &'static str {
        match self {
            DocKind::At => "@",
            DocKind::Doc => "@doc",
        }
    }

    pub fn sentinel(self) -> &'static str {
        match self {
            DocKind::At => "@+at",
            DocKind::Doc => "@+doc",
        }
    }
}

/// A recognized sentinel line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sentinel {
    Verbatim,
    AfterRef,
    Others {
        indent: String,
        open: bool,
        rest: String,
    },
    SectionRef {
        indent: String,
        open: bool,
        name: String,
    },
    NodeStart {
        indent: String,
        gnx: String,
        level: usize,
        headline: String,
    },
    /// `@@c` or `@@code`, only recognized inside a doc part
    Code {
        long: bool,
        rest: String,
    },
    DocStart {
        kind: DocKind,
        trailing: String,
    },
    All {
        indent: String,
        open: bool,
        rest: String,
    },
    Clone {
        count: usize,
    },
    First,
    Last,
    Comment(String),
    Delims(String),
    Raw(String),
    EndRaw,
    LeoClose,
    /// Any other `@@` line; holds the directive text starting at its `@`
    Directive(String),
    /// Starts with the sentinel prefix but matches no known sentinel
    Unknown,
}

/// The matchers for one delimiter pair
#[derive(Debug, Clone)]
pub struct SentinelPatterns {
    delims: CommentDelims,
    prefix: String,
    cweb: bool,
    verbatim: Regex,
    after_ref: Regex,
    others: Regex,
    section_ref: Regex,
    node_start: Regex,
    code: Regex,
    doc: Regex,
    all: Regex,
    clone: Regex,
    first: Regex,
    last: Regex,
    comment: Regex,
    delims_re: Regex,
    raw: Regex,
    end_raw: Regex,
    leo_close: Regex,
    directive: Regex,
}

fn compile(pattern: &str) -> Regex {
    // Every pattern is built from regex-escaped delimiters
    Regex::new(pattern).expect("sentinel pattern is valid")
}

impl SentinelPatterns {
    pub fn new(delims: &CommentDelims) -> Self {
        let d1 = regex::escape(delims.start());
        let d2 = regex::escape(delims.end());
        Self {
            delims: delims.clone(),
            prefix: format!("{}@", delims.start()),
            cweb: delims.start().ends_with('@'),
            verbatim: compile(&format!(r"^\s*{d1}@verbatim{d2}$")),
            after_ref: compile(&format!(r"^\s*{d1}@afterref{d2}$")),
            others: compile(&format!(r"^(\s*){d1}@(\+|-)others\b(.*){d2}$")),
            section_ref: compile(&format!(r"^(\s*){d1}@(\+|-)<<(.*)>>\s*{d2}$")),
            node_start: compile(&format!(
                r"^(\s*){d1}@\+node:([^:]+): \*(\d+)?(\*?) (.*){d2}$"
            )),
            code: compile(&format!(r"^\s*{d1}@@c(ode)?(\s.*?)?{d2}$")),
            doc: compile(&format!(r"^\s*{d1}@\+(at|doc)?(\s.*?)?{d2}$")),
            all: compile(&format!(r"^(\s*){d1}@(\+|-)all\b(.*){d2}$")),
            clone: compile(&format!(r"^\s*{d1}@clone (\d+){d2}$")),
            first: compile(&format!(r"^\s*{d1}@@first{d2}$")),
            last: compile(&format!(r"^\s*{d1}@@last{d2}$")),
            comment: compile(&format!(r"^\s*{d1}@comment(.*){d2}")),
            delims_re: compile(&format!(r"^\s*{d1}@delims(.*){d2}")),
            raw: compile(&format!(r"^\s*{d1}@@raw\b(.*){d2}$")),
            end_raw: compile(&format!(r"^\s*{d1}@@end_raw\s*{d2}$")),
            leo_close: compile(&format!(r"^\s*{d1}@-leo")),
            directive: compile(&format!(r"^\s*{d1}@(@.*){d2}$")),
        }
    }

    pub fn delims(&self) -> &CommentDelims {
        &self.delims
    }

    /// `<start>@`, the text every sentinel begins with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_cweb(&self) -> bool {
        self.cweb
    }

    /// True if the line, ignoring leading whitespace, starts with the sentinel prefix
    pub fn looks_like_sentinel(&self, line: &str) -> bool {
        line.trim_start().starts_with(&self.prefix)
    }

    /// Spell a sentinel line (without indentation or newline) for `text`
    pub fn sentinel(&self, text: &str) -> String {
        let text = if self.cweb {
            apply_cweb(text)
        } else {
            text.to_string()
        };
        format!("{}{}{}", self.delims.start(), text, self.delims.end())
    }

    /// Undo the `@` doubling of cweb-style delimiters on a sentinel line
    pub fn undo_cweb(&self, line: &str) -> String {
        let unindented = line.trim_start_matches([' ', '\t']);
        if self.cweb && unindented.starts_with(&self.prefix) {
            let split = line.len() - unindented.len() + self.prefix.len();
            let (head, tail) = line.split_at(split);
            format!("{}{}", head, tail.replace("@@", "@"))
        } else {
            line.to_string()
        }
    }

    /// True for the `@end_raw` sentinel that ends raw mode
    pub fn is_end_raw(&self, line: &str) -> bool {
        self.end_raw.is_match(line)
    }

    /// Classify a line, testing sentinel kinds in precedence order.
    ///
    /// Returns `None` for lines that do not start with the sentinel prefix.
    /// `@@c`/`@@code` are only recognized while `in_doc`.
    pub fn classify(&self, line: &str, in_doc: bool) -> Option<Sentinel> {
        if !self.looks_like_sentinel(line) {
            return None;
        }
        if self.verbatim.is_match(line) {
            return Some(Sentinel::Verbatim);
        }
        if self.after_ref.is_match(line) {
            return Some(Sentinel::AfterRef);
        }
        if let Some(caps) = self.others.captures(line) {
            return Some(Sentinel::Others {
                indent: group(&caps, 1),
                open: &caps[2] == "+",
                rest: group(&caps, 3),
            });
        }
        if let Some(caps) = self.section_ref.captures(line) {
            return Some(Sentinel::SectionRef {
                indent: group(&caps, 1),
                open: &caps[2] == "+",
                name: group(&caps, 3),
            });
        }
        if let Some(caps) = self.node_start.captures(line) {
            let level = match caps.get(3) {
                Some(n) => n.as_str().parse().unwrap_or(1),
                None => 1 + caps.get(4).map_or(0, |m| m.as_str().len()),
            };
            return Some(Sentinel::NodeStart {
                indent: group(&caps, 1),
                gnx: group(&caps, 2),
                level,
                headline: group(&caps, 5),
            });
        }
        if in_doc {
            if let Some(caps) = self.code.captures(line) {
                return Some(Sentinel::Code {
                    long: caps.get(1).is_some(),
                    rest: group(&caps, 2),
                });
            }
        }
        if let Some(caps) = self.doc.captures(line) {
            let kind = match caps.get(1).map(|m| m.as_str()) {
                Some("doc") => DocKind::Doc,
                _ => DocKind::At,
            };
            return Some(Sentinel::DocStart {
                kind,
                trailing: group(&caps, 2),
            });
        }
        if let Some(caps) = self.all.captures(line) {
            return Some(Sentinel::All {
                indent: group(&caps, 1),
                open: &caps[2] == "+",
                rest: group(&caps, 3),
            });
        }
        if let Some(caps) = self.clone.captures(line) {
            if let Ok(count) = caps[1].parse() {
                return Some(Sentinel::Clone { count });
            }
        }
        if self.first.is_match(line) {
            return Some(Sentinel::First);
        }
        if self.last.is_match(line) {
            return Some(Sentinel::Last);
        }
        if let Some(caps) = self.comment.captures(line) {
            return Some(Sentinel::Comment(caps[1].trim().to_string()));
        }
        if let Some(caps) = self.delims_re.captures(line) {
            return Some(Sentinel::Delims(caps[1].trim().to_string()));
        }
        if let Some(caps) = self.raw.captures(line) {
            return Some(Sentinel::Raw(group(&caps, 1)));
        }
        if self.end_raw.is_match(line) {
            return Some(Sentinel::EndRaw);
        }
        if self.leo_close.is_match(line) {
            return Some(Sentinel::LeoClose);
        }
        if let Some(caps) = self.directive.captures(line) {
            return Some(Sentinel::Directive(caps[1].to_string()));
        }
        Some(Sentinel::Unknown)
    }
}

fn group(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i).map_or("", |m| m.as_str()).to_string()
}

/// Double every `@` of a sentinel except the first
pub fn apply_cweb(text: &str) -> String {
    let doubled = text.replace('@', "@@");
    match doubled.strip_prefix('@') {
        Some(rest) => rest.to_string(),
        None => doubled,
    }
}
