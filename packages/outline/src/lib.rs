//! # Atfile Outline
//!
//! The outline model the derived-file codec reads from and writes into:
//! an arena of [`VNode`]s addressed by [`Gnx`], transient [`Position`]s that
//! locate them, and the [`OutlineModel`] capability trait that the codec
//! depends on.
//!
//! ```rust,ignore
//! use atfile_outline::{Outline, OutlineModel};
//!
//! let mut outline = Outline::new();
//! let root = outline.add_top_level("r1", "R", "intro\n@others\n")?;
//! outline.add_new_child(root.gnx(), "c1", "C", "code here\n")?;
//! ```

pub mod error;
pub mod gnx;
pub mod model;
pub mod outline;
pub mod position;
pub mod vnode;

pub use error::{OutlineError, OutlineResult};
pub use gnx::{Gnx, GnxGenerator};
pub use model::{is_section_name, match_headline, AncestorDirectives, OutlineModel};
pub use outline::Outline;
pub use position::Position;
pub use vnode::VNode;
