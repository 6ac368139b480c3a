//! # Outline arena
//!
//! Owns every vnode, keyed by gnx. Parent/child structure lives in the
//! vnodes as gnx lists, so a clone is simply a gnx listed under more than one
//! parent. The arena also keeps the ordered list of top-level vnodes, which
//! plays the part of the hidden root.
//!
//! ## Invariants
//!
//! - every gnx in a child or parent list names a vnode in the arena
//! - `parents` of a vnode holds one entry per child link pointing at it
//! - no vnode is its own ancestor
//!
//! Helpers that build trees (`add_node`, `add_child`) check these; the raw
//! [`OutlineModel`] methods trust their caller, as the codec's reader does.

use crate::error::{OutlineError, OutlineResult};
use crate::gnx::Gnx;
use crate::model::OutlineModel;
use crate::position::Position;
use crate::vnode::VNode;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct Outline {
    nodes: HashMap<Gnx, VNode>,
    top_level: Vec<Gnx>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, gnx: &str) -> bool {
        self.nodes.contains_key(gnx)
    }

    pub fn get(&self, gnx: &str) -> Option<&VNode> {
        self.nodes.get(gnx)
    }

    pub fn vnodes(&self) -> impl Iterator<Item = &VNode> {
        self.nodes.values()
    }

    pub fn top_level(&self) -> &[Gnx] {
        &self.top_level
    }

    /// Positions of the top-level vnodes
    pub fn roots(&self) -> Vec<Position> {
        self.top_level.iter().cloned().map(Position::root).collect()
    }

    /// Create a detached vnode with the given headline and body
    pub fn add_node(&mut self, gnx: &str, headline: &str, body: &str) -> OutlineResult<Gnx> {
        let gnx = self.create_vnode(gnx)?;
        if let Some(v) = self.nodes.get_mut(&gnx) {
            v.set_headline(headline.to_string());
            v.set_body(body.to_string());
        }
        Ok(gnx)
    }

    /// Create a vnode and make it the last top-level node
    pub fn add_top_level(&mut self, gnx: &str, headline: &str, body: &str) -> OutlineResult<Position> {
        let gnx = self.add_node(gnx, headline, body)?;
        self.top_level.push(gnx.clone());
        Ok(Position::root(gnx))
    }

    /// Create a vnode as the last child of `parent`
    pub fn add_new_child(
        &mut self,
        parent: &Gnx,
        gnx: &str,
        headline: &str,
        body: &str,
    ) -> OutlineResult<Gnx> {
        if !self.contains(parent.as_str()) {
            return Err(OutlineError::unknown_gnx(parent.as_str()));
        }
        let child = self.add_node(gnx, headline, body)?;
        self.link(parent, &child);
        Ok(child)
    }

    /// Link an existing vnode as the last child of `parent`.
    ///
    /// Linking a vnode that already has a parent makes it a clone.
    pub fn add_child(&mut self, parent: &Gnx, child: &Gnx) -> OutlineResult<()> {
        for gnx in [parent, child] {
            if !self.contains(gnx.as_str()) {
                return Err(OutlineError::unknown_gnx(gnx.as_str()));
            }
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(OutlineError::cycle_detected(parent.as_str(), child.as_str()));
        }
        self.link(parent, child);
        Ok(())
    }

    /// Unlink the child at `index`, returning its gnx. The vnode itself stays in the arena.
    pub fn remove_child(&mut self, parent: &Gnx, index: usize) -> OutlineResult<Gnx> {
        let v = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| OutlineError::unknown_gnx(parent.as_str()))?;
        if index >= v.children().len() {
            return Err(OutlineError::ChildIndexOutOfRange {
                parent: parent.to_string(),
                index,
            });
        }
        let child = v.children_mut().remove(index);
        if let Some(c) = self.nodes.get_mut(&child) {
            c.remove_parent_link(parent);
        }
        Ok(child)
    }

    /// True if `ancestor` is reachable from `gnx` by following parent links
    pub fn is_ancestor(&self, ancestor: &Gnx, gnx: &Gnx) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![gnx];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            for parent in self.parents(current) {
                if parent == ancestor {
                    return true;
                }
                pending.push(parent);
            }
        }
        false
    }

    /// Delete vnodes no longer reachable from the top-level list. Returns how many were removed.
    pub fn prune_unreachable(&mut self) -> usize {
        let mut reachable: HashSet<Gnx> = HashSet::new();
        let mut pending: Vec<Gnx> = self.top_level.clone();
        while let Some(gnx) = pending.pop() {
            if reachable.insert(gnx.clone()) {
                pending.extend(self.children(&gnx).iter().cloned());
            }
        }
        let doomed: Vec<Gnx> = self
            .nodes
            .keys()
            .filter(|gnx| !reachable.contains(*gnx))
            .cloned()
            .collect();
        for gnx in &doomed {
            self.nodes.remove(gnx);
        }
        // Survivors may still list a deleted parent
        for v in self.nodes.values_mut() {
            v.parents_mut().retain(|p| reachable.contains(p));
        }
        debug!(removed = doomed.len(), "Pruned unreachable vnodes");
        doomed.len()
    }

    pub fn clear_visited(&mut self) {
        for v in self.nodes.values_mut() {
            v.clear_visited();
        }
    }

    pub fn set_visited(&mut self, gnx: &Gnx) {
        if let Some(v) = self.nodes.get_mut(gnx) {
            v.set_visited();
        }
    }

    pub fn clear_dirty(&mut self) {
        for v in self.nodes.values_mut() {
            v.clear_dirty();
        }
    }
}

impl OutlineModel for Outline {
    fn get_headline(&self, vnode: &Gnx) -> &str {
        self.nodes.get(vnode).map(VNode::headline).unwrap_or("")
    }

    fn get_body(&self, vnode: &Gnx) -> &str {
        self.nodes.get(vnode).map(VNode::body).unwrap_or("")
    }

    fn set_body(&mut self, vnode: &Gnx, body: String) {
        match self.nodes.get_mut(vnode) {
            Some(v) => v.set_body(body),
            None => warn!(gnx = %vnode, "set_body on unknown vnode"),
        }
    }

    fn set_headline(&mut self, vnode: &Gnx, headline: String) {
        match self.nodes.get_mut(vnode) {
            Some(v) => v.set_headline(headline),
            None => warn!(gnx = %vnode, "set_headline on unknown vnode"),
        }
    }

    fn children(&self, vnode: &Gnx) -> &[Gnx] {
        self.nodes.get(vnode).map(VNode::children).unwrap_or(&[])
    }

    fn set_children(&mut self, vnode: &Gnx, children: Vec<Gnx>) {
        let Some(v) = self.nodes.get_mut(vnode) else {
            warn!(gnx = %vnode, "set_children on unknown vnode");
            return;
        };
        let old = std::mem::take(v.children_mut());
        for child in &old {
            if let Some(c) = self.nodes.get_mut(child) {
                c.remove_parent_link(vnode);
            }
        }
        for child in &children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents_mut().push(vnode.clone());
            }
        }
        if let Some(v) = self.nodes.get_mut(vnode) {
            *v.children_mut() = children;
        }
    }

    fn parents(&self, vnode: &Gnx) -> &[Gnx] {
        self.nodes.get(vnode).map(VNode::parents).unwrap_or(&[])
    }

    fn add_parent_link(&mut self, vnode: &Gnx, parent: &Gnx) {
        if let Some(v) = self.nodes.get_mut(vnode) {
            v.parents_mut().push(parent.clone());
        }
    }

    fn add_child_link(&mut self, vnode: &Gnx, child: &Gnx) {
        if let Some(v) = self.nodes.get_mut(vnode) {
            v.children_mut().push(child.clone());
        }
    }

    fn mark_visited(&mut self, vnode: &Gnx) {
        self.set_visited(vnode);
    }

    fn lookup_by_gnx(&self, gnx: &str) -> Option<Gnx> {
        self.nodes.get(gnx).map(|v| v.gnx().clone())
    }

    fn create_vnode(&mut self, gnx: &str) -> OutlineResult<Gnx> {
        let gnx = Gnx::parse(gnx)?;
        if self.nodes.contains_key(&gnx) {
            return Err(OutlineError::duplicate_gnx(gnx.as_str()));
        }
        self.nodes.insert(gnx.clone(), VNode::new(gnx.clone()));
        Ok(gnx)
    }
}
