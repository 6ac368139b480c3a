use crate::gnx::Gnx;
use serde::{Deserialize, Serialize};

/// The unit of shared content: headline, body and links to other vnodes.
///
/// Children and parents are gnx lists resolved through the owning
/// [`Outline`](crate::Outline). A vnode listed in more than one parent
/// link is a clone: every position that reaches it sees the same headline
/// and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VNode {
    gnx: Gnx,
    headline: String,
    body: String,
    children: Vec<Gnx>,
    /// One entry per child link pointing at this vnode
    parents: Vec<Gnx>,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    visited: bool,
}

impl VNode {
    pub fn new(gnx: Gnx) -> Self {
        Self {
            gnx,
            headline: String::new(),
            body: String::new(),
            children: Vec::new(),
            parents: Vec::new(),
            dirty: false,
            visited: false,
        }
    }

    pub fn gnx(&self) -> &Gnx {
        &self.gnx
    }

    pub fn headline(&self) -> &str {
        &self.headline
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn children(&self) -> &[Gnx] {
        &self.children
    }

    pub fn parents(&self) -> &[Gnx] {
        &self.parents
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_cloned(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    pub fn set_visited(&mut self) {
        self.visited = true;
    }

    pub fn clear_visited(&mut self) {
        self.visited = false;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_headline(&mut self, headline: String) {
        if self.headline != headline {
            self.headline = headline;
            self.dirty = true;
        }
    }

    pub(crate) fn set_body(&mut self, body: String) {
        if self.body != body {
            self.body = body;
            self.dirty = true;
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Gnx> {
        self.dirty = true;
        &mut self.children
    }

    pub(crate) fn parents_mut(&mut self) -> &mut Vec<Gnx> {
        &mut self.parents
    }

    /// Remove a single parent entry, keeping any other links from the same parent
    pub(crate) fn remove_parent_link(&mut self, parent: &Gnx) -> bool {
        match self.parents.iter().position(|p| p == parent) {
            Some(index) => {
                self.parents.remove(index);
                true
            }
            None => false,
        }
    }
}
