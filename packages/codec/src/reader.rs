//! # Reader
//!
//! Single forward pass over a derived file that rebuilds the outline under
//! an existing root vnode. Expanded regions collapse back into their
//! `@others` or `<<section>>` line; node sentinels create vnodes, or reuse
//! the vnode already known under that gnx, and link them under the parent
//! their level names.
//!
//! All scanner state lives in a [`ScanContext`] threaded through the pass.
//! Nested scopes are an explicit stack of [`Scope`] values, so pathological
//! nesting never recurses.

use crate::delims::{delims_from_delims_directive, delims_from_string, CommentDelims};
use crate::error::{ReadError, ReadResult};
use crate::patterns::{Header, Sentinel, SentinelPatterns, FORMAT_VERSION};
use atfile_outline::{Gnx, OutlineModel};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// What a read found besides the outline itself
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReport {
    pub header: Header,
    /// Lines before the header sentinel
    pub first_lines: Vec<String>,
    /// Lines after the `@-leo` sentinel
    pub last_lines: Vec<String>,
    pub warnings: Vec<String>,
    /// Node sentinels read, the root included
    pub nodes_read: usize,
}

/// A nested region opened by `@+others`, `@+<<name>>` or `@+all`
#[derive(Debug, Clone)]
enum Scope {
    Others { gnx: Gnx, indent: usize },
    Section { gnx: Gnx, indent: usize },
    All { gnx: Gnx, indent: usize },
}

impl Scope {
    fn restore(self) -> (Gnx, usize) {
        match self {
            Scope::Others { gnx, indent }
            | Scope::Section { gnx, indent }
            | Scope::All { gnx, indent } => (gnx, indent),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Scope::Others { .. } => "@others",
            Scope::Section { .. } => "section reference",
            Scope::All { .. } => "@all",
        }
    }
}

/// Mutable scanner state for one pass
#[derive(Debug)]
struct ScanContext {
    patterns: SentinelPatterns,
    /// Indentation stripped from every line of the current scope
    indent: usize,
    in_doc: bool,
    in_raw: bool,
    /// The next line is appended without interpretation
    verbatim: bool,
    /// The next line continues the previous body line
    after_ref: bool,
    /// Link count requested by an `@clone <n>` sentinel for the next node
    pending_clone: Option<usize>,
}

impl ScanContext {
    fn new(delims: &CommentDelims) -> Self {
        Self {
            patterns: SentinelPatterns::new(delims),
            indent: 0,
            in_doc: false,
            in_raw: false,
            verbatim: false,
            after_ref: false,
            pending_clone: None,
        }
    }

    fn set_delims(&mut self, delims: &CommentDelims) {
        debug!(?delims, "Switching comment delimiters");
        self.patterns = SentinelPatterns::new(delims);
    }

    fn strip_indent<'l>(&self, line: &'l str) -> &'l str {
        let n = self.indent;
        if n > 0
            && line.len() > n
            && line.as_bytes()[..n].iter().all(|b| b.is_ascii_whitespace())
        {
            &line[n..]
        } else {
            line
        }
    }
}

/// Reads derived files into an outline model
pub struct FastAtRead<'m, M: OutlineModel + ?Sized> {
    model: &'m mut M,
}

/// Bookkeeping for the vnodes of one pass
struct PassState {
    root: Gnx,
    /// File gnx to model vnode; the root's file gnx is an alias of the caller's root
    aliases: HashMap<String, Gnx>,
    bodies: HashMap<Gnx, Vec<String>>,
    current: Gnx,
    /// `(vnode, clone tree root)` for each level, the root at index 0
    level_stack: Vec<(Gnx, Option<Gnx>)>,
    scopes: Vec<Scope>,
    root_seen: bool,
    first_index: usize,
    nodes_read: usize,
    warnings: Vec<String>,
}

impl PassState {
    fn push(&mut self, line: impl Into<String>) {
        self.bodies
            .entry(self.current.clone())
            .or_default()
            .push(line.into());
    }

    fn warn(&mut self, line_no: usize, message: String) {
        warn!(line = line_no, "{}", message);
        self.warnings.push(format!("line {}: {}", line_no, message));
    }

    /// Level of the node whose body holds the innermost open section reference
    fn section_owner_level(&self) -> Option<usize> {
        match self.scopes.last() {
            Some(Scope::Section { gnx, .. }) => self
                .level_stack
                .iter()
                .rposition(|(g, _)| g == gnx)
                .map(|i| i + 1),
            _ => None,
        }
    }

    /// Lines inside the scope are indented exactly like its open sentinel
    fn open_scope(&mut self, scope: Scope, ctx: &mut ScanContext, indent: usize) {
        self.scopes.push(scope);
        ctx.indent = indent;
    }

    fn close_scope(
        &mut self,
        ctx: &mut ScanContext,
        line_no: usize,
        matches: fn(&Scope) -> bool,
        what: &str,
    ) -> ReadResult<()> {
        match self.scopes.pop() {
            Some(scope) if matches(&scope) => {
                let (gnx, indent) = scope.restore();
                self.current = gnx;
                ctx.indent = indent;
                Ok(())
            }
            Some(scope) => Err(ReadError::malformed(
                line_no,
                format!("{} closes an open {}", what, scope.kind()),
            )),
            None => Err(ReadError::malformed(
                line_no,
                format!("unmatched {} sentinel", what),
            )),
        }
    }
}

impl<'m, M: OutlineModel + ?Sized> FastAtRead<'m, M> {
    pub fn new(model: &'m mut M) -> Self {
        Self { model }
    }

    /// Read `contents` into the vnode `root`, replacing its children.
    ///
    /// On error the root may keep partially rebuilt children; callers
    /// should discard it.
    #[instrument(skip_all, fields(path = %path, root = %root, bytes = contents.len()))]
    pub fn read_into_root(
        &mut self,
        contents: &str,
        path: &str,
        root: &Gnx,
    ) -> ReadResult<ReadReport> {
        info!("Reading derived file");
        let contents = contents.replace('\r', "");
        let lines: Vec<&str> = contents.split_inclusive('\n').collect();

        let (header_index, header) = lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| Header::parse(line).map(|h| (i, h)))
            .ok_or_else(|| ReadError::missing_header(path))?;
        match header.version {
            Some(FORMAT_VERSION) => {}
            other => return Err(ReadError::unsupported_version(path, other.unwrap_or(0))),
        }
        let first_lines: Vec<String> = lines[..header_index]
            .iter()
            .map(|l| l.to_string())
            .collect();

        let mut ctx = ScanContext::new(&header.delims);
        let mut state = PassState {
            root: root.clone(),
            aliases: HashMap::new(),
            bodies: HashMap::new(),
            current: root.clone(),
            level_stack: vec![(root.clone(), None)],
            scopes: Vec::new(),
            root_seen: false,
            first_index: 0,
            nodes_read: 0,
            warnings: Vec::new(),
        };

        let mut leo_index = None;
        for (offset, raw_line) in lines[header_index + 1..].iter().enumerate() {
            let index = header_index + 1 + offset;
            let done = self.scan_line(raw_line, index + 1, &first_lines, &mut ctx, &mut state)?;
            if done {
                leo_index = Some(index);
                break;
            }
        }
        let Some(leo_index) = leo_index else {
            return Err(ReadError::missing_leo(path));
        };
        if let Some(scope) = state.scopes.last() {
            return Err(ReadError::malformed(
                leo_index + 1,
                format!("{} still open at @-leo", scope.kind()),
            ));
        }

        let last_lines: Vec<String> = lines[leo_index + 1..]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let root_body = state.bodies.entry(state.root.clone()).or_default();
        root_body.extend(last_lines.iter().map(|l| format!("@last {}", l)));

        self.post_pass(state.bodies);
        info!(
            nodes = state.nodes_read,
            warnings = state.warnings.len(),
            "Derived file read"
        );
        Ok(ReadReport {
            header,
            first_lines,
            last_lines,
            warnings: state.warnings,
            nodes_read: state.nodes_read,
        })
    }

    /// Handle one line; returns true at `@-leo`
    fn scan_line(
        &mut self,
        raw_line: &str,
        line_no: usize,
        first_lines: &[String],
        ctx: &mut ScanContext,
        state: &mut PassState,
    ) -> ReadResult<bool> {
        if ctx.verbatim {
            ctx.verbatim = false;
            if ctx.after_ref {
                ctx.after_ref = false;
                let body = state.bodies.entry(state.current.clone()).or_default();
                match body.last_mut() {
                    Some(last) => *last = format!("{}{}", last.trim_end(), raw_line),
                    None => body.push(raw_line.to_string()),
                }
            } else {
                let line = ctx.strip_indent(raw_line).to_string();
                state.push(line);
            }
            return Ok(false);
        }
        if ctx.in_raw {
            let uncwebbed = ctx.patterns.undo_cweb(raw_line);
            if ctx.patterns.is_end_raw(uncwebbed.trim_end_matches('\n')) {
                ctx.in_raw = false;
                state.push("@end_raw\n");
            } else {
                state.push(raw_line);
            }
            return Ok(false);
        }

        let uncwebbed = ctx.patterns.undo_cweb(raw_line);
        let line_indent = uncwebbed.len() - uncwebbed.trim_start_matches([' ', '\t']).len();
        let line = ctx.strip_indent(&uncwebbed);
        let content = line.strip_suffix('\n').unwrap_or(line);

        // Most lines are plain code
        if !ctx.in_doc && !ctx.patterns.looks_like_sentinel(content) {
            state.push(line);
            return Ok(false);
        }

        let Some(sentinel) = ctx.patterns.classify(content, ctx.in_doc) else {
            self.doc_line(line, content, ctx, state);
            return Ok(false);
        };
        match sentinel {
            Sentinel::Verbatim => ctx.verbatim = true,
            Sentinel::AfterRef => {
                ctx.verbatim = true;
                ctx.after_ref = true;
            }
            Sentinel::Others { indent, open, rest } => {
                ctx.in_doc = false;
                if open {
                    state.push(format!("{}@others{}\n", indent, rest));
                    let scope = Scope::Others {
                        gnx: state.current.clone(),
                        indent: ctx.indent,
                    };
                    state.open_scope(scope, ctx, line_indent);
                } else {
                    state.close_scope(
                        ctx,
                        line_no,
                        |s| matches!(s, Scope::Others { .. }),
                        "@-others",
                    )?;
                }
            }
            Sentinel::SectionRef { indent, open, name } => {
                ctx.in_doc = false;
                if open {
                    state.push(format!("{}<<{}>>\n", indent, name));
                    let scope = Scope::Section {
                        gnx: state.current.clone(),
                        indent: ctx.indent,
                    };
                    state.open_scope(scope, ctx, line_indent);
                } else {
                    state.close_scope(
                        ctx,
                        line_no,
                        |s| matches!(s, Scope::Section { .. }),
                        "section reference",
                    )?;
                }
            }
            Sentinel::NodeStart {
                gnx,
                level,
                headline,
                ..
            } => {
                ctx.in_doc = false;
                ctx.in_raw = false;
                let count = ctx.pending_clone.take().unwrap_or(1);
                self.start_node(&gnx, level, headline, count, line_no, state)?;
            }
            Sentinel::Code { long, rest } => {
                ctx.in_doc = false;
                let word = if long { "@code" } else { "@c" };
                state.push(format!("{}{}\n", word, rest));
            }
            Sentinel::DocStart { kind, trailing } => {
                state.push(format!("{}{}\n", kind.directive(), trailing));
                ctx.in_doc = true;
            }
            Sentinel::All { indent, open, rest } => {
                if open {
                    state.push(format!("{}@all{}\n", indent, rest));
                    let scope = Scope::All {
                        gnx: state.current.clone(),
                        indent: ctx.indent,
                    };
                    state.open_scope(scope, ctx, line_indent);
                } else {
                    state.close_scope(ctx, line_no, |s| matches!(s, Scope::All { .. }), "@-all")?;
                }
            }
            Sentinel::Clone { count } => ctx.pending_clone = Some(count.max(1)),
            Sentinel::First => match first_lines.get(state.first_index) {
                Some(first) => {
                    state.first_index += 1;
                    if first.trim_end_matches('\n').is_empty() {
                        state.push("@first\n");
                    } else {
                        state.push(format!("@first {}", first));
                    }
                }
                None => state.warn(line_no, "too many @first lines".to_string()),
            },
            // Regenerated from the lines after @-leo
            Sentinel::Last => {}
            Sentinel::Comment(args) => {
                state.push(format!("@comment {}\n", args));
                match delims_from_string(&args).preferred() {
                    Some(delims) => ctx.set_delims(&delims),
                    None => state.warn(line_no, format!("ignoring invalid @comment {}", args)),
                }
            }
            Sentinel::Delims(args) => {
                state.push(format!("@delims {}\n", args));
                match delims_from_delims_directive(&args) {
                    Some(delims) => ctx.set_delims(&delims),
                    None => state.warn(line_no, format!("ignoring invalid @delims {}", args)),
                }
            }
            Sentinel::Raw(rest) => {
                state.push(format!("@raw{}\n", rest));
                ctx.in_raw = true;
            }
            Sentinel::EndRaw => state.push("@end_raw\n"),
            Sentinel::LeoClose => return Ok(true),
            Sentinel::Directive(text) => state.push(format!("{}\n", text)),
            Sentinel::Unknown => {
                if ctx.in_doc {
                    self.doc_line(line, content, ctx, state);
                } else {
                    state.warn(
                        line_no,
                        format!("inserting unexpected line: {}", content.trim_end()),
                    );
                    state.push(line);
                }
            }
        }
        Ok(false)
    }

    /// A line inside a doc part that is not a sentinel
    fn doc_line(&self, line: &str, content: &str, ctx: &ScanContext, state: &mut PassState) {
        let delims = ctx.patterns.delims();
        if delims.is_block() {
            // The block-comment open and close lines of the doc part
            let t = content.trim();
            if t == delims.start() || t == delims.end() {
                return;
            }
            state.push(line);
            return;
        }
        let stripped = line.trim_start();
        let rest = stripped.strip_prefix(delims.start()).unwrap_or(stripped);
        let tail = rest.strip_prefix(' ').unwrap_or(rest);
        if tail.trim().is_empty() {
            state.push("\n");
        } else {
            state.push(tail);
        }
    }

    fn start_node(
        &mut self,
        file_gnx: &str,
        level: usize,
        headline: String,
        count: usize,
        line_no: usize,
        state: &mut PassState,
    ) -> ReadResult<()> {
        state.nodes_read += 1;
        if !state.root_seen {
            // The first node sentinel is the caller's root, whatever its gnx
            state.root_seen = true;
            let root = state.root.clone();
            state.aliases.insert(file_gnx.to_string(), root.clone());
            self.model.set_headline(&root, headline);
            self.model.set_children(&root, Vec::new());
            state.bodies.insert(root.clone(), Vec::new());
            state.current = root;
            return Ok(());
        }

        let depth = state.level_stack.len();
        let level = match state.section_owner_level() {
            // A section defined below a grandchild of the node referencing it
            Some(owner) if level >= 2 && level - 2 >= depth => {
                let message = format!(
                    "section definition {} has level {} below depth {}; linking it under the referencing node",
                    file_gnx, level, depth
                );
                state.warn(line_no, message);
                owner + 1
            }
            _ => level,
        };
        if level < 2 || level - 2 >= depth {
            return Err(ReadError::malformed(
                line_no,
                format!("node {} has level {} below depth {}", file_gnx, level, depth),
            ));
        }
        let (parent, clone_root) = state.level_stack[level - 2].clone();
        let existing = state
            .aliases
            .get(file_gnx)
            .cloned()
            .or_else(|| self.model.lookup_by_gnx(file_gnx));

        if let Some(v) = &existing {
            if state.level_stack[..level - 1].iter().any(|(g, _)| g == v) {
                return Err(ReadError::malformed(
                    line_no,
                    format!("node {} is its own ancestor", file_gnx),
                ));
            }
        }

        let (v, clone_root) = match (existing, clone_root) {
            // Inside a clone tree: the last version of body and headline wins
            (Some(v), Some(clone_root)) => (v, Some(clone_root)),
            // An existing vnode starts a clone tree
            (Some(v), None) => (v.clone(), Some(v)),
            (None, clone_root) => {
                let v = self
                    .model
                    .create_vnode(file_gnx)
                    .map_err(|e| ReadError::invalid_node(line_no, e.to_string()))?;
                (v, clone_root)
            }
        };
        self.model.set_headline(&v, headline);
        self.model.set_children(&v, Vec::new());
        state.bodies.insert(v.clone(), Vec::new());
        state.level_stack.truncate(level - 1);
        state.level_stack.push((v.clone(), clone_root));
        // A section referenced twice in one body is expanded twice but linked once
        let repeated_section = matches!(state.scopes.last(), Some(Scope::Section { .. }))
            && self.model.children(&parent).contains(&v);
        if !repeated_section {
            for _ in 0..count {
                self.model.link(&parent, &v);
            }
        }
        debug!(gnx = %v, level, parent = %parent, "Read node");
        state.current = v;
        Ok(())
    }

    /// Join every body buffer into its vnode's body
    fn post_pass(&mut self, bodies: HashMap<Gnx, Vec<String>>) {
        for (gnx, lines) in bodies {
            self.model.set_body(&gnx, lines.concat());
            self.model.mark_visited(&gnx);
        }
    }
}
