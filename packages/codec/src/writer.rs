//! # Writer
//!
//! Serializes the subtree of a root position into derived-file text. The
//! root's body drives the output: `@others` lines and section references are
//! expanded in place, each expansion wrapped in sentinels carrying the gnx,
//! level and headline of the node it came from.
//!
//! The writer only reads the model. It keeps its own visited set and
//! reports authoring problems as [`Diagnostic`]s instead of failing.

use crate::config::CodecConfig;
use crate::delims::{delims_from_delims_directive, delims_from_string, CommentDelims};
use crate::diagnostic::{Diagnostic, DiagnosticKind, WriteOutcome};
use crate::directives::{is_file_node, DirectiveSettings};
use crate::patterns::{DocKind, Header, SentinelPatterns};
use atfile_outline::{is_section_name, Gnx, OutlineModel, Position};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Directive names recognized at the start of a body line
pub const GLOBAL_DIRECTIVES: &[&str] = &[
    "all",
    "beautify",
    "colorcache",
    "code",
    "color",
    "comment",
    "c",
    "delims",
    "doc",
    "encoding",
    "end_raw",
    "first",
    "header",
    "ignore",
    "killbeautify",
    "killcolor",
    "language",
    "last",
    "lineending",
    "markup",
    "nobeautify",
    "nocolor-node",
    "nocolor",
    "noheader",
    "nowrap",
    "nopyflakes",
    "nosearch",
    "others",
    "pagewidth",
    "path",
    "quiet",
    "raw",
    "root-code",
    "root-doc",
    "root",
    "silent",
    "tabwidth",
    "terse",
    "unit",
    "verbose",
    "wrap",
];

/// How a body line is treated by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    NoDirective,
    Others,
    All,
    /// Bare `@` starting a doc part
    At,
    Doc,
    C,
    Code,
    Raw,
    EndRaw,
    Verbatim,
    /// Any other known directive
    Misc,
}

const DIRECTIVE_TABLE: &[(&str, DirectiveKind)] = &[
    ("@all", DirectiveKind::All),
    ("@c", DirectiveKind::C),
    ("@code", DirectiveKind::Code),
    ("@doc", DirectiveKind::Doc),
    ("@end_raw", DirectiveKind::EndRaw),
    ("@others", DirectiveKind::Others),
    ("@raw", DirectiveKind::Raw),
    ("@verbatim", DirectiveKind::Verbatim),
];

/// True if `s` starts with `word` and the next character cannot continue a word
pub fn match_word(s: &str, word: &str) -> bool {
    match s.strip_prefix(word) {
        Some(rest) => !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_'),
        None => false,
    }
}

/// Classify one body line (without its newline).
///
/// Decorators such as `@property` are plain lines: only words in
/// [`GLOBAL_DIRECTIVES`] not followed by `.` or `(` are directives.
pub fn directive_kind(line: &str, cweb: bool) -> DirectiveKind {
    let Some(rest) = line.strip_prefix('@') else {
        let trimmed = line.trim_start_matches([' ', '\t']);
        if match_word(trimmed, "@others") {
            return DirectiveKind::Others;
        }
        if match_word(trimmed, "@all") {
            return DirectiveKind::All;
        }
        return DirectiveKind::NoDirective;
    };
    match rest.chars().next() {
        None | Some(' ') | Some('\t') | Some('\n') => {
            // Bare `@` is not a doc part in cweb
            return if cweb {
                DirectiveKind::NoDirective
            } else {
                DirectiveKind::At
            };
        }
        Some(c) if !c.is_alphabetic() => return DirectiveKind::NoDirective,
        _ => {}
    }
    if cweb && match_word(line, "@c") {
        return DirectiveKind::NoDirective;
    }
    if let Some((_, kind)) = DIRECTIVE_TABLE
        .iter()
        .find(|(name, _)| match_word(line, name))
    {
        return *kind;
    }
    let word_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    let (word, after) = rest.split_at(word_len);
    if !GLOBAL_DIRECTIVES.contains(&word) || after.starts_with(['.', '(']) {
        return DirectiveKind::NoDirective;
    }
    DirectiveKind::Misc
}

/// Byte length of the leading blanks of `s` and their width with tabs expanded
pub fn leading_ws_width(s: &str, tab_width: i32) -> (usize, usize) {
    let tab = tab_width.unsigned_abs().max(1) as usize;
    let mut width = 0;
    let mut len = 0;
    for b in s.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += tab - (width % tab),
            _ => break,
        }
        len += 1;
    }
    (len, width)
}

/// The first `<<name>>` at or after byte `from`: `(name, start, end)`
fn find_section_name(s: &str, from: usize) -> Option<(String, usize, usize)> {
    let tail = s.get(from..)?;
    let n1 = tail.find("<<")? + from;
    let n2 = tail.find(">>")? + from;
    if n1 < n2 {
        Some((s[n1..n2 + 2].to_string(), n1, n2 + 2))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write sentinel lines; `false` gives `@nosent`-style output
    pub sentinels: bool,
    pub allow_undefined_refs: bool,
    pub force_newlines_in_nosent_bodies: bool,
}

impl WriterOptions {
    pub fn from_config(config: &CodecConfig, sentinels: bool) -> Self {
        Self {
            sentinels,
            allow_undefined_refs: config.allow_undefined_refs,
            force_newlines_in_nosent_bodies: config.force_newlines_in_nosent_bodies,
        }
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            sentinels: true,
            allow_undefined_refs: false,
            force_newlines_in_nosent_bodies: false,
        }
    }
}

/// Per-body state while writing one node's body
#[derive(Debug, Default)]
struct BodyStatus {
    at_comment_seen: bool,
    at_delims_seen: bool,
    clash_reported: bool,
    has_at_others: bool,
    in_doc: bool,
}

pub struct AtFileWriter<'a, M: OutlineModel + ?Sized> {
    model: &'a M,
    root: Position,
    settings: DirectiveSettings,
    options: WriterOptions,
    patterns: SentinelPatterns,
    out: String,
    /// Current indentation width in columns
    indent: usize,
    raw: bool,
    visited: HashSet<Gnx>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, M: OutlineModel + ?Sized> AtFileWriter<'a, M> {
    pub fn new(
        model: &'a M,
        root: Position,
        settings: DirectiveSettings,
        options: WriterOptions,
    ) -> Self {
        let patterns = SentinelPatterns::new(&settings.delims);
        Self {
            model,
            root,
            settings,
            options,
            patterns,
            out: String::new(),
            indent: 0,
            raw: false,
            visited: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Write the root's subtree, consuming the writer
    #[instrument(skip(self), fields(root = %self.root.gnx(), sentinels = self.options.sentinels))]
    pub fn write(mut self) -> WriteOutcome {
        info!("Writing derived file");
        if self.settings.delims_fallback {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::DelimsFallback,
                    format!(
                        "no comment delimiters for language {}, using {}",
                        self.settings.language,
                        self.settings.delims.start()
                    ),
                )
                .in_node(self.root.gnx(), self.model.get_headline(self.root.gnx())),
            );
        }

        let root = self.root.clone();
        let root_body = self.normalized_body(&root);
        self.put_at_first_lines(&root_body);
        self.put_sentinel(&Header::sentinel_text(&self.settings.encoding));
        self.put_open_node_sentinel(&root, false);
        self.put_body(&root);
        self.raw = false;
        self.put_sentinel("@-leo");
        self.put_at_last_lines(&root_body);
        self.check_orphans();

        let text = self.settings.line_ending.apply(&self.out);
        info!(
            bytes = text.len(),
            nodes = self.visited.len(),
            diagnostics = self.diagnostics.len(),
            "Derived file written"
        );
        WriteOutcome {
            text,
            diagnostics: self.diagnostics,
            visited: self.visited,
        }
    }

    fn headline(&self, p: &Position) -> &'a str {
        self.model.get_headline(p.gnx())
    }

    fn report(&mut self, diagnostic: Diagnostic, p: &Position) {
        let headline = self.headline(p);
        warn!(kind = ?diagnostic.kind, headline, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic.in_node(p.gnx(), headline));
    }

    /// Body text with a trailing newline added when sentinels need one
    fn normalized_body(&self, p: &Position) -> String {
        let mut s = self.model.get_body(p.gnx()).to_string();
        let wants_newline = self.options.sentinels || self.options.force_newlines_in_nosent_bodies;
        if wants_newline && !s.is_empty() && !s.ends_with('\n') {
            s.push('\n');
        }
        s
    }

    // Output primitives

    fn put_indent(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let w = self.settings.tab_width;
        if w > 1 {
            let w = w as usize;
            self.out.push_str(&"\t".repeat(n / w));
            self.out.push_str(&" ".repeat(n % w));
        } else {
            self.out.push_str(&" ".repeat(n));
        }
    }

    fn put_sentinel(&mut self, text: &str) {
        if !self.options.sentinels {
            return;
        }
        self.put_indent(self.indent);
        let line = self.patterns.sentinel(text);
        self.out.push_str(&line);
        self.out.push('\n');
    }

    /// Newline that only exists because a sentinel follows
    fn onl_sent(&mut self) {
        if self.options.sentinels {
            self.out.push('\n');
        }
    }

    fn start_delim(&self) -> String {
        self.patterns.delims().start().to_string()
    }

    fn end_delim(&self) -> String {
        self.patterns.delims().end().to_string()
    }

    // Bodies

    /// Write a node's body; returns true if it contained `@others`
    fn put_body(&mut self, p: &Position) -> bool {
        let s = self.normalized_body(p);
        self.visited.insert(p.gnx().clone());
        self.raw = false;
        let cweb = self.settings.language == "cweb";
        let mut status = BodyStatus::default();
        for line in s.split_inclusive('\n') {
            let kind = directive_kind(line.trim_end_matches('\n'), cweb);
            self.put_line(kind, p, line, &mut status);
        }
        if status.in_doc {
            self.put_end_doc_line();
        }
        status.has_at_others
    }

    fn put_line(&mut self, kind: DirectiveKind, p: &Position, line: &str, status: &mut BodyStatus) {
        if self.raw && kind != DirectiveKind::NoDirective {
            if kind == DirectiveKind::EndRaw {
                self.raw = false;
                self.put_sentinel("@@end_raw");
            } else {
                self.put_code_line(line);
            }
            return;
        }
        match kind {
            DirectiveKind::NoDirective => {
                if status.in_doc {
                    self.put_doc_line(line);
                } else if !self.raw && find_section_name(line, 0).is_some() {
                    self.put_ref_line(line, p);
                } else {
                    self.put_code_line(line);
                }
            }
            DirectiveKind::At | DirectiveKind::Doc => {
                if status.in_doc {
                    self.put_end_doc_line();
                }
                let doc = if kind == DirectiveKind::Doc {
                    DocKind::Doc
                } else {
                    DocKind::At
                };
                self.put_start_doc_line(line, doc);
                status.in_doc = true;
            }
            DirectiveKind::C | DirectiveKind::Code => {
                if status.in_doc {
                    self.put_end_doc_line();
                }
                self.put_directive(line, p);
                status.in_doc = false;
            }
            DirectiveKind::All => {
                if status.in_doc {
                    self.put_doc_line(line);
                } else if *p == self.root {
                    self.put_at_all_line(line, p);
                } else {
                    self.report(
                        Diagnostic::error(DiagnosticKind::MisplacedAll, "@all is only valid in the root node"),
                        p,
                    );
                }
            }
            DirectiveKind::Others => {
                if status.in_doc {
                    self.put_doc_line(line);
                } else if status.has_at_others {
                    self.report(
                        Diagnostic::error(DiagnosticKind::MultipleOthers, "multiple @others in one body"),
                        p,
                    );
                    self.put_code_line(line);
                } else {
                    self.put_at_others_line(line, p);
                    status.has_at_others = true;
                }
            }
            DirectiveKind::Raw => {
                self.raw = true;
                let text = format!("@{}", line.trim_end());
                self.put_sentinel(&text);
            }
            DirectiveKind::EndRaw => {
                self.report(
                    Diagnostic::error(DiagnosticKind::UnmatchedEndRaw, "unmatched @end_raw directive"),
                    p,
                );
            }
            DirectiveKind::Verbatim => self.put_code_line(line),
            DirectiveKind::Misc => {
                if match_word(line, "@comment") {
                    status.at_comment_seen = true;
                } else if match_word(line, "@delims") {
                    status.at_delims_seen = true;
                }
                if status.at_comment_seen && status.at_delims_seen && !status.clash_reported {
                    status.clash_reported = true;
                    self.report(
                        Diagnostic::error(DiagnosticKind::DelimsClash, "@comment and @delims in one node"),
                        p,
                    );
                }
                self.put_directive(line, p);
            }
        }
    }

    fn put_code_line(&mut self, line: &str) {
        let trimmed = line.trim_start_matches([' ', '\t']);
        if !self.raw && trimmed.starts_with(self.patterns.prefix()) {
            self.put_sentinel("@verbatim");
        }
        let content = line.strip_suffix('\n');
        let text = content.unwrap_or(line);
        if !text.is_empty() {
            if !self.raw {
                self.put_indent(self.indent);
            }
            self.out.push_str(text);
        }
        if content.is_some() {
            self.out.push('\n');
        }
    }

    // Directives

    fn put_directive(&mut self, line: &str, p: &Position) {
        let directive = line.trim_end_matches(['\n', '\r']);
        if match_word(directive, "@delims") {
            self.put_delims(directive, p);
        } else if match_word(directive, "@comment") {
            self.put_sentinel(directive);
            let spec = delims_from_string(directive);
            match spec.preferred() {
                Some(delims) => self.switch_delims(delims),
                None => self.report(
                    Diagnostic::error(DiagnosticKind::BadDelims, "bad @comment directive"),
                    p,
                ),
            }
        } else if match_word(directive, "@first") || match_word(directive, "@last") {
            let tag = if directive.starts_with("@first") {
                "@@first"
            } else {
                "@@last"
            };
            if *p == self.root {
                self.put_sentinel(tag);
            } else {
                self.report(
                    Diagnostic::error(
                        DiagnosticKind::MisplacedFirstLast,
                        format!("ignoring {} outside the root node", &tag[1..]),
                    ),
                    p,
                );
            }
        } else {
            self.put_sentinel(&format!("@{}", directive));
        }
    }

    fn put_delims(&mut self, directive: &str, p: &Position) {
        // Trailing space protects the last delimiter from the closing comment
        self.put_sentinel(&format!("{} ", directive));
        let args = directive.strip_prefix("@delims").unwrap_or_default();
        match delims_from_delims_directive(args) {
            Some(delims) => self.switch_delims(delims),
            None => self.report(
                Diagnostic::error(DiagnosticKind::BadDelims, "bad @delims directive"),
                p,
            ),
        }
    }

    fn switch_delims(&mut self, delims: CommentDelims) {
        debug!(?delims, "Switching comment delimiters");
        self.patterns = SentinelPatterns::new(&delims);
    }

    /// `@first` lines go before the header, `@last` lines after `@-leo`
    fn put_at_first_lines(&mut self, body: &str) {
        for line in body.split_inclusive('\n') {
            let Some(rest) = line.strip_prefix("@first") else {
                break;
            };
            let text = rest.trim_start_matches([' ', '\t']);
            self.out.push_str(text.trim_end_matches('\n'));
            self.out.push('\n');
        }
    }

    fn put_at_last_lines(&mut self, body: &str) {
        let lines: Vec<&str> = body.split_inclusive('\n').collect();
        let mut start = lines.len();
        while start > 0 {
            let line = lines[start - 1];
            if line.starts_with("@last") || line.trim().is_empty() {
                start -= 1;
            } else {
                break;
            }
        }
        for line in &lines[start..] {
            if let Some(rest) = line.strip_prefix("@last") {
                self.out.push_str(rest.trim_start_matches([' ', '\t']));
            }
        }
    }

    // Doc parts

    fn put_start_doc_line(&mut self, line: &str, kind: DocKind) {
        let follow = line
            .trim_end_matches('\n')
            .get(kind.directive().len()..)
            .unwrap_or_default();
        self.put_sentinel(&format!("{}{}", kind.sentinel(), follow));
        let end = self.end_delim();
        if !end.is_empty() {
            self.put_indent(self.indent);
            let start = self.start_delim();
            self.out.push_str(&start);
            self.out.push('\n');
        }
    }

    fn put_doc_line(&mut self, line: &str) {
        let start = self.start_delim();
        let end = self.end_delim();
        if line.trim().is_empty() {
            if end.is_empty() {
                self.put_indent(self.indent);
                self.out.push_str(&start);
            }
            self.out.push('\n');
            return;
        }
        self.put_indent(self.indent);
        if end.is_empty() {
            self.out.push_str(&start);
            self.out.push(' ');
        }
        self.out.push_str(line);
        if !line.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn put_end_doc_line(&mut self) {
        let end = self.end_delim();
        if !end.is_empty() {
            self.put_indent(self.indent);
            self.out.push_str(&end);
            self.out.push('\n');
        }
    }

    // Node sentinels

    fn node_sentinel_text(&self, p: &Position) -> String {
        let mut h = self.headline(p).to_string();
        let end = self.end_delim();
        if !end.is_empty() {
            h = h.replace(&self.start_delim(), "").replace(&end, "");
        }
        let level = p.level_below(&self.root);
        if level > 2 {
            format!("{}: *{}* {}", p.gnx(), level, h)
        } else {
            format!("{}: {} {}", p.gnx(), "*".repeat(level), h)
        }
    }

    fn put_open_node_sentinel(&mut self, p: &Position, in_at_all: bool) {
        if !in_at_all && *p != self.root && is_file_node(self.headline(p)) {
            let message = format!("@file not valid in: {}", self.headline(p));
            self.report(Diagnostic::error(DiagnosticKind::NestedFileNode, message), p);
            return;
        }
        let text = format!("@+node:{}", self.node_sentinel_text(p));
        self.put_sentinel(&text);
    }

    // @others

    fn put_at_others_line(&mut self, line: &str, p: &Position) {
        let (j, delta) = leading_ws_width(line, self.settings.tab_width);
        self.indent += delta;
        let directive = line[j + 1..].trim();
        self.put_sentinel(&format!("@+{}", directive));
        for child in p.children(self.model) {
            let mut stack = vec![child];
            while let Some(q) = stack.pop() {
                if is_section_name(self.headline(&q)) {
                    continue;
                }
                self.put_open_node_sentinel(&q, false);
                let had_others = self.put_body(&q);
                self.raw = false;
                if !had_others {
                    stack.extend(q.children(self.model).into_iter().rev());
                }
            }
        }
        self.put_sentinel("@-others");
        self.indent -= delta;
    }

    // Section references

    fn put_ref_line(&mut self, line: &str, p: &Position) {
        let Some((name, n1, n2)) = find_section_name(line, 0) else {
            self.put_code_line(line);
            return;
        };
        let Some(definition) = self.find_reference(&name, p) else {
            if self.options.allow_undefined_refs {
                self.put_code_line(line);
            }
            return;
        };
        let (_, delta) = leading_ws_width(line, self.settings.tab_width);
        self.put_lead_in(line, n1);
        self.put_ref_at(&name, &definition, delta);

        let mut i = n2;
        while let Some((name, n1, n2)) = find_section_name(line, i) {
            if let Some(definition) = self.find_reference(&name, p) {
                let middle = line[i..n1].to_string();
                self.put_after_middle_ref(&middle, delta);
                self.put_ref_at(&name, &definition, delta);
            }
            i = n2;
        }
        self.put_after_last_ref(line, i, delta);
    }

    fn find_reference(&mut self, name: &str, p: &Position) -> Option<Position> {
        let found = self.model.resolve_section_definition(name, p);
        if found.is_none() {
            let message = format!("undefined section: {}", name);
            let diagnostic = if self.options.allow_undefined_refs {
                Diagnostic::warning(DiagnosticKind::UndefinedSection, message)
            } else {
                Diagnostic::error(DiagnosticKind::UndefinedSection, message)
            };
            self.report(diagnostic, p);
        }
        if let Some(definition) = &found {
            if definition.level() > p.level() + 1 {
                let message = format!("section {} is not a child of the referencing node", name);
                self.report(Diagnostic::warning(DiagnosticKind::IndirectSection, message), p);
            }
        }
        found
    }

    /// Text before the first reference is written on its own line unless it is blank
    fn put_lead_in(&mut self, line: &str, j: usize) {
        let (k, _) = leading_ws_width(line, self.settings.tab_width);
        if j == 0 || j == k {
            return;
        }
        self.put_indent(self.indent);
        self.out.push_str(&line[..j]);
        self.onl_sent();
    }

    fn put_ref_at(&mut self, name: &str, definition: &Position, delta: usize) {
        self.indent += delta;
        self.put_sentinel(&format!("@+{}", name));
        self.put_open_node_sentinel(definition, false);
        self.put_body(definition);
        self.raw = false;
        self.put_sentinel(&format!("@-{}", name));
        self.indent -= delta;
    }

    fn put_after_middle_ref(&mut self, s: &str, delta: usize) {
        if s.is_empty() {
            return;
        }
        self.indent += delta;
        self.put_sentinel("@afterref");
        self.out.push_str(s);
        self.onl_sent();
        self.indent -= delta;
    }

    fn put_after_last_ref(&mut self, line: &str, start: usize, delta: usize) {
        let after = &line[start..];
        if after.trim_start_matches([' ', '\t']).trim_end_matches('\n').is_empty() {
            return;
        }
        self.indent += delta;
        self.put_sentinel("@afterref");
        self.out.push_str(after);
        if self.options.sentinels && !after.ends_with('\n') {
            self.out.push('\n');
        }
        self.indent -= delta;
    }

    // @all

    fn put_at_all_line(&mut self, line: &str, p: &Position) {
        let (j, delta) = leading_ws_width(line, self.settings.tab_width);
        self.indent += delta;
        let directive = line[j + 1..].trim();
        self.put_sentinel(&format!("@+{}", directive));
        self.put_at_all_children(p);
        self.put_sentinel("@-all");
        self.indent -= delta;
    }

    /// Runs of sibling clones are written once, after an `@clone <n>` marker
    fn put_at_all_children(&mut self, p: &Position) {
        let children = p.children(self.model);
        let mut i = 0;
        while i < children.len() {
            let gnx = children[i].gnx();
            let run = children[i..]
                .iter()
                .take_while(|c| c.gnx() == gnx)
                .count();
            if run > 1 {
                self.put_sentinel(&format!("@clone {}", run));
            }
            self.put_at_all_child(&children[i]);
            i += run;
        }
    }

    fn put_at_all_child(&mut self, p: &Position) {
        self.put_open_node_sentinel(p, true);
        self.put_at_all_body(p);
        self.put_at_all_children(p);
    }

    /// Bodies inside `@all` are written with no directive interpretation
    fn put_at_all_body(&mut self, p: &Position) {
        let s = self.normalized_body(p);
        self.visited.insert(p.gnx().clone());
        for line in s.split_inclusive('\n') {
            self.put_code_line(line);
        }
    }

    // Orphans

    fn check_orphans(&mut self) {
        let mut reported: HashSet<Gnx> = HashSet::new();
        for q in self.root.subtree(self.model) {
            if self.visited.contains(q.gnx()) || !reported.insert(q.gnx().clone()) {
                continue;
            }
            let message = format!("orphan node not written: {}", self.headline(&q));
            self.report(Diagnostic::error(DiagnosticKind::Orphan, message), &q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::scan_directives;
    use atfile_outline::Outline;

    fn write(outline: &Outline, root: &Position) -> WriteOutcome {
        let config = CodecConfig::default();
        let settings = scan_directives(outline, root, &config);
        AtFileWriter::new(outline, root.clone(), settings, WriterOptions::default()).write()
    }

    #[test]
    fn test_directive_kinds() {
        assert_eq!(directive_kind("x = 1", false), DirectiveKind::NoDirective);
        assert_eq!(directive_kind("    @others", false), DirectiveKind::Others);
        assert_eq!(directive_kind("@others", false), DirectiveKind::Others);
        assert_eq!(directive_kind("@", false), DirectiveKind::At);
        assert_eq!(directive_kind("@ intro", false), DirectiveKind::At);
        assert_eq!(directive_kind("@", true), DirectiveKind::NoDirective);
        assert_eq!(directive_kind("@doc", false), DirectiveKind::Doc);
        assert_eq!(directive_kind("@c", false), DirectiveKind::C);
        assert_eq!(directive_kind("@code", false), DirectiveKind::Code);
        assert_eq!(directive_kind("@language rust", false), DirectiveKind::Misc);
        assert_eq!(directive_kind("@property", false), DirectiveKind::NoDirective);
        assert_eq!(directive_kind("@language.x", false), DirectiveKind::NoDirective);
        assert_eq!(directive_kind("@raw", false), DirectiveKind::Raw);
        assert_eq!(directive_kind("@1", false), DirectiveKind::NoDirective);
    }

    #[test]
    fn test_leading_ws_width() {
        assert_eq!(leading_ws_width("    x", -4), (4, 4));
        assert_eq!(leading_ws_width("\tx", 4), (1, 4));
        assert_eq!(leading_ws_width("  \tx", -4), (3, 4));
        assert_eq!(leading_ws_width("x", 4), (0, 0));
    }

    #[test]
    fn test_find_section_name() {
        assert_eq!(
            find_section_name("  <<a>> = <<b>>", 0),
            Some(("<<a>>".to_string(), 2, 7))
        );
        assert_eq!(
            find_section_name("  <<a>> = <<b>>", 7),
            Some(("<<b>>".to_string(), 10, 15))
        );
        assert_eq!(find_section_name("a >> b << c", 0), None);
    }

    #[test]
    fn test_concrete_scenario() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r1", "R", "intro\n@others\n").unwrap();
        outline.add_new_child(root.gnx(), "c1", "C", "code here\n").unwrap();

        let outcome = write(&outline, &root);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert_eq!(
            outcome.text,
            "#@+leo-ver=5-thin\n\
             #@+node:r1: * R\n\
             intro\n\
             #@+others\n\
             #@+node:c1: ** C\n\
             code here\n\
             #@-others\n\
             #@-leo\n"
        );
    }

    #[test]
    fn test_level_encoding() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "@others\n").unwrap();
        let mut parent = root.gnx().clone();
        for n in 1..=4 {
            parent = outline
                .add_new_child(&parent, &format!("n{}", n), &format!("N{}", n), "x\n")
                .unwrap();
        }
        let text = write(&outline, &root).text;
        assert!(text.contains("#@+node:n1: ** N1\n"));
        assert!(text.contains("#@+node:n2: *3* N2\n"));
        assert!(text.contains("#@+node:n4: *5* N4\n"));
    }

    #[test]
    fn test_sentinel_looking_line_is_escaped() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "  #@+node:fake: * X\nplain\n")
            .unwrap();
        let text = write(&outline, &root).text;
        assert!(text.contains("#@verbatim\n  #@+node:fake: * X\nplain\n"));
    }

    #[test]
    fn test_indented_others() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "class A:\n    @others\n")
            .unwrap();
        outline
            .add_new_child(root.gnx(), "m", "m", "def m(self):\n    pass\n\n")
            .unwrap();
        let text = write(&outline, &root).text;
        assert!(text.contains(
            "class A:\n    #@+others\n    #@+node:m: ** m\n    def m(self):\n        pass\n\n    #@-others\n"
        ));
    }

    #[test]
    fn test_section_reference() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "<< imports >>\nmain()\n")
            .unwrap();
        outline
            .add_new_child(root.gnx(), "s", "<< imports >>", "import os\n")
            .unwrap();
        let outcome = write(&outline, &root);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert!(outcome.text.contains(
            "#@+<< imports >>\n#@+node:s: ** << imports >>\nimport os\n#@-<< imports >>\nmain()\n"
        ));
    }

    #[test]
    fn test_undefined_section_is_dropped_and_reported() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "<< missing >>\nx\n").unwrap();
        let outcome = write(&outline, &root);
        assert!(!outcome.text.contains("missing"));
        assert_eq!(
            outcome
                .diagnostics_of(DiagnosticKind::UndefinedSection)
                .count(),
            1
        );
        assert!(outcome.has_errors());
    }

    #[test]
    fn test_undefined_section_allowed() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "<< missing >>\n").unwrap();
        let config = CodecConfig {
            allow_undefined_refs: true,
            ..CodecConfig::default()
        };
        let settings = scan_directives(&outline, &root, &config);
        let outcome = AtFileWriter::new(
            &outline,
            root.clone(),
            settings,
            WriterOptions::from_config(&config, true),
        )
        .write();
        assert!(outcome.text.contains("\n<< missing >>\n"));
        assert!(!outcome.has_errors());
    }

    #[test]
    fn test_multiple_others_reported() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "@others\n@others\n").unwrap();
        outline.add_new_child(root.gnx(), "c", "C", "c\n").unwrap();
        let outcome = write(&outline, &root);
        assert_eq!(
            outcome.diagnostics_of(DiagnosticKind::MultipleOthers).count(),
            1
        );
        assert_eq!(outcome.text.matches("#@+others").count(), 1);
        assert!(outcome.text.contains("#@-others\n@others\n"));
    }

    #[test]
    fn test_orphans_reported() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "no others here\n").unwrap();
        outline.add_new_child(root.gnx(), "c", "Lost", "c\n").unwrap();
        let outcome = write(&outline, &root);
        let orphans: Vec<_> = outcome.diagnostics_of(DiagnosticKind::Orphan).collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].headline, "Lost");
    }

    #[test]
    fn test_doc_part_with_block_delims() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "@language c\n@ doc text\nmore\n@c\nint x;\n")
            .unwrap();
        let config = CodecConfig::default();
        let mut settings = scan_directives(&outline, &root, &config);
        settings.delims = CommentDelims::block("/*", "*/");
        let outcome =
            AtFileWriter::new(&outline, root.clone(), settings, WriterOptions::default()).write();
        assert!(outcome.text.contains(
            "/*@@language c*/\n/*@+at doc text*/\n/*\nmore\n*/\n/*@@c*/\nint x;\n"
        ));
    }

    #[test]
    fn test_first_and_last_lines() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "@first #!/usr/bin/env python\nbody\n@last # end\n")
            .unwrap();
        let text = write(&outline, &root).text;
        assert!(text.starts_with("#!/usr/bin/env python\n#@+leo-ver=5-thin\n"));
        assert!(text.ends_with("#@@last\n#@-leo\n# end\n"));
    }

    #[test]
    fn test_nosent_output() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r1", "R", "intro\n@others\n").unwrap();
        outline.add_new_child(root.gnx(), "c1", "C", "code here").unwrap();
        let config = CodecConfig::default();
        let settings = scan_directives(&outline, &root, &config);
        let outcome = AtFileWriter::new(
            &outline,
            root.clone(),
            settings,
            WriterOptions::from_config(&config, false),
        )
        .write();
        assert_eq!(outcome.text, "intro\ncode here");
    }

    #[test]
    fn test_nested_file_node_reported() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "@file a.py", "@others\n").unwrap();
        outline
            .add_new_child(root.gnx(), "f", "@file b.py", "b\n")
            .unwrap();
        let outcome = write(&outline, &root);
        assert_eq!(
            outcome.diagnostics_of(DiagnosticKind::NestedFileNode).count(),
            1
        );
    }

    #[test]
    fn test_at_all_marks_sibling_clones() {
        let mut outline = Outline::new();
        let root = outline.add_top_level("r", "R", "@all\n").unwrap();
        let c = outline.add_new_child(root.gnx(), "c", "C", "@others\n").unwrap();
        outline.add_child(root.gnx(), &c).unwrap();
        let outcome = write(&outline, &root);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert!(outcome
            .text
            .contains("#@+all\n#@clone 2\n#@+node:c: ** C\n@others\n#@-all\n"));
    }

    #[test]
    fn test_line_endings_applied() {
        let mut outline = Outline::new();
        let root = outline
            .add_top_level("r", "R", "@lineending crlf\nx\n")
            .unwrap();
        let text = write(&outline, &root).text;
        assert!(text.contains("#@@lineending crlf\r\nx\r\n"));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }
}
