//! # Outline capability interface
//!
//! The narrow set of operations the derived-file codec needs from whatever
//! owns the outline. Vnode handles are gnxs; the host decides how vnodes are
//! stored. [`Outline`](crate::Outline) is the in-crate arena implementation.
//!
//! Accessors on an unknown gnx return empty values and mutators on an
//! unknown gnx do nothing; the codec only passes gnxs it obtained from the
//! model itself.

use crate::error::OutlineResult;
use crate::gnx::Gnx;
use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Directive keys collected from bodies by [`OutlineModel::ancestor_directives`]
pub const SCANNED_DIRECTIVES: &[&str] = &[
    "language",
    "comment",
    "delims",
    "encoding",
    "pagewidth",
    "tabwidth",
    "lineending",
    "path",
];

/// Directives found in the body of one node on a position's ancestor chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorDirectives {
    pub gnx: Gnx,
    pub headline: String,
    /// `(key, value)` pairs in body order, first occurrence of each key only
    pub directives: Vec<(String, String)>,
}

impl AncestorDirectives {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

pub trait OutlineModel {
    fn get_gnx<'a>(&self, vnode: &'a Gnx) -> &'a str {
        vnode.as_str()
    }

    fn get_headline(&self, vnode: &Gnx) -> &str;

    fn get_body(&self, vnode: &Gnx) -> &str;

    fn set_body(&mut self, vnode: &Gnx, body: String);

    fn set_headline(&mut self, vnode: &Gnx, headline: String);

    fn children(&self, vnode: &Gnx) -> &[Gnx];

    /// Replace the child list, keeping every child's parent links consistent
    fn set_children(&mut self, vnode: &Gnx, children: Vec<Gnx>);

    fn parents(&self, vnode: &Gnx) -> &[Gnx];

    /// Record `parent` in `vnode`'s parent list (one entry per child link)
    fn add_parent_link(&mut self, vnode: &Gnx, parent: &Gnx);

    /// Append `child` to `vnode`'s child list
    fn add_child_link(&mut self, vnode: &Gnx, child: &Gnx);

    fn lookup_by_gnx(&self, gnx: &str) -> Option<Gnx>;

    fn create_vnode(&mut self, gnx: &str) -> OutlineResult<Gnx>;

    /// Record that a read produced this vnode. Hosts without visit bookkeeping ignore it.
    fn mark_visited(&mut self, _vnode: &Gnx) {}

    /// Append `child` under `parent`, updating both sides of the link
    fn link(&mut self, parent: &Gnx, child: &Gnx) {
        self.add_child_link(parent, child);
        self.add_parent_link(child, parent);
    }

    /// Find the definition of section `name` (spelled `<<name>>`) in the subtree of `scope`
    fn resolve_section_definition(&self, name: &str, scope: &Position) -> Option<Position> {
        scope
            .subtree(self)
            .into_iter()
            .find(|p| match_headline(self.get_headline(p.gnx()), name))
    }

    /// Directives of `position` and each of its ancestors, nearest first
    fn ancestor_directives(&self, position: &Position) -> Vec<AncestorDirectives> {
        position
            .self_and_parents()
            .into_iter()
            .map(|p| AncestorDirectives {
                gnx: p.gnx().clone(),
                headline: self.get_headline(p.gnx()).to_string(),
                directives: scan_body_directives(self.get_body(p.gnx())),
            })
            .collect()
    }
}

/// True if a headline defines a section: optional periods, then `<<...>>`
pub fn is_section_name(headline: &str) -> bool {
    let h = headline.trim_start().trim_start_matches('.');
    match h.strip_prefix("<<") {
        Some(rest) => rest.contains(">>"),
        None => false,
    }
}

/// Headline match used for section lookup: case- and whitespace-insensitive prefix match
pub fn match_headline(headline: &str, name: &str) -> bool {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| *c != ' ' && *c != '\t')
            .flat_map(char::to_lowercase)
            .collect()
    };
    let h = squash(headline);
    let h = h.trim_start_matches('.');
    let n = squash(name);
    !n.is_empty() && h.starts_with(&n)
}

/// Collect `@key value` lines for the keys in [`SCANNED_DIRECTIVES`]
pub fn scan_body_directives(body: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = Vec::new();
    for line in body.lines() {
        let Some(rest) = line.strip_prefix('@') else {
            continue;
        };
        let key_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        let (key, value) = rest.split_at(key_len);
        if !SCANNED_DIRECTIVES.contains(&key) {
            continue;
        }
        // `@language` must be followed by whitespace or end of line
        if value.chars().next().is_some_and(|c| !c.is_whitespace()) {
            continue;
        }
        if found.iter().any(|(k, _)| k == key) {
            continue;
        }
        found.push((key.to_string(), value.trim().to_string()));
    }
    found
}
