//! # Positions
//!
//! A position is a transient path to a vnode: the vnode's gnx, its index in
//! its parent's child list, and the `(gnx, child_index)` pairs of every
//! ancestor from the top of the tree down. Positions never own a vnode;
//! equality is structural, so two positions are equal only when they name the
//! same vnode through the same chain of ancestors.

use crate::gnx::Gnx;
use crate::model::OutlineModel;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    gnx: Gnx,
    child_index: usize,
    stack: Vec<(Gnx, usize)>,
}

impl Position {
    /// A position with no ancestors
    pub fn root(gnx: Gnx) -> Self {
        Self {
            gnx,
            child_index: 0,
            stack: Vec::new(),
        }
    }

    pub fn gnx(&self) -> &Gnx {
        &self.gnx
    }

    pub fn child_index(&self) -> usize {
        self.child_index
    }

    /// Ancestor chain, outermost first
    pub fn stack(&self) -> &[(Gnx, usize)] {
        &self.stack
    }

    /// Number of ancestors (0 for a root position)
    pub fn level(&self) -> usize {
        self.stack.len()
    }

    pub fn parent(&self) -> Option<Position> {
        let mut stack = self.stack.clone();
        let (gnx, child_index) = stack.pop()?;
        Some(Self {
            gnx,
            child_index,
            stack,
        })
    }

    pub fn child<M: OutlineModel + ?Sized>(&self, model: &M, n: usize) -> Option<Position> {
        let gnx = model.children(&self.gnx).get(n)?.clone();
        let mut stack = self.stack.clone();
        stack.push((self.gnx.clone(), self.child_index));
        Some(Self {
            gnx,
            child_index: n,
            stack,
        })
    }

    pub fn children<M: OutlineModel + ?Sized>(&self, model: &M) -> Vec<Position> {
        (0..model.children(&self.gnx).len())
            .filter_map(|n| self.child(model, n))
            .collect()
    }

    pub fn has_children<M: OutlineModel + ?Sized>(&self, model: &M) -> bool {
        !model.children(&self.gnx).is_empty()
    }

    pub fn next_sibling<M: OutlineModel + ?Sized>(&self, model: &M) -> Option<Position> {
        let parent = self.parent()?;
        parent.child(model, self.child_index + 1)
    }

    /// Self followed by every descendant, in outline (pre-)order
    pub fn self_and_subtree<M: OutlineModel + ?Sized>(&self, model: &M) -> Vec<Position> {
        let mut result = Vec::new();
        let mut pending = vec![self.clone()];
        while let Some(p) = pending.pop() {
            // Clone cycles in a host model would never terminate
            if !p.is_own_ancestor() {
                pending.extend(p.children(model).into_iter().rev());
            }
            result.push(p);
        }
        result
    }

    /// Every descendant, in outline order, without self
    pub fn subtree<M: OutlineModel + ?Sized>(&self, model: &M) -> Vec<Position> {
        let mut nodes = self.self_and_subtree(model);
        nodes.remove(0);
        nodes
    }

    /// Gnxs from self up to the outermost ancestor
    pub fn ancestor_gnxs(&self) -> impl Iterator<Item = &Gnx> {
        std::iter::once(&self.gnx).chain(self.stack.iter().rev().map(|(gnx, _)| gnx))
    }

    /// Positions from self up to the outermost ancestor
    pub fn self_and_parents(&self) -> Vec<Position> {
        let mut result = vec![self.clone()];
        let mut current = self.parent();
        while let Some(p) = current {
            current = p.parent();
            result.push(p);
        }
        result
    }

    /// True when this vnode also appears among its own ancestors
    pub fn is_own_ancestor(&self) -> bool {
        self.stack.iter().any(|(gnx, _)| *gnx == self.gnx)
    }

    /// Level of self measured from `root` (1 for the root itself)
    pub fn level_below(&self, root: &Position) -> usize {
        1 + self.level().saturating_sub(root.level())
    }
}
