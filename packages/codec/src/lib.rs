//! # Atfile Codec
//!
//! Serializes an outline subtree into a derived file, a plain text file
//! whose comment-embedded sentinel lines record the outline structure, and
//! reads such a file back into the outline.
//!
//! ```rust,ignore
//! use atfile_codec::{deserialize, serialize, CodecConfig};
//! use atfile_outline::{Outline, OutlineModel};
//!
//! let mut outline = Outline::new();
//! let root = outline.add_top_level("r1", "R", "intro\n@others\n")?;
//! outline.add_new_child(root.gnx(), "c1", "C", "code here\n")?;
//!
//! let outcome = serialize(&outline, &root, true, &CodecConfig::default());
//! assert!(deserialize(&mut outline, &outcome.text, "x.py", root.gnx()));
//! ```

pub mod config;
pub mod delims;
pub mod diagnostic;
pub mod directives;
pub mod error;
pub mod patterns;
pub mod persist;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod tests_roundtrip;

pub use config::CodecConfig;
pub use delims::CommentDelims;
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLevel, WriteOutcome};
pub use directives::{scan_directives, DirectiveSettings, LineEnding};
pub use error::{ConfigError, PersistError, ReadError, ReadResult};
pub use persist::{
    read_derived_file, write_derived_file, FileSystem, MockFileSystem, RealFileSystem,
    WriteStatus,
};
pub use reader::{FastAtRead, ReadReport};
pub use writer::{AtFileWriter, WriterOptions};

use atfile_outline::{Gnx, OutlineModel, Position};
use tracing::error;

/// Write the subtree at `root` as derived file text.
///
/// With sentinels, a non-empty body that lacks a final newline gets one, so
/// it reads back newline-terminated.
pub fn serialize<M: OutlineModel + ?Sized>(
    model: &M,
    root: &Position,
    sentinels: bool,
    config: &CodecConfig,
) -> WriteOutcome {
    persist::write_outcome(model, root, sentinels, config)
}

/// Read derived file `text` into `root`; false if the text could not be read
pub fn deserialize<M: OutlineModel + ?Sized>(
    model: &mut M,
    text: &str,
    path: &str,
    root: &Gnx,
) -> bool {
    match FastAtRead::new(model).read_into_root(text, path, root) {
        Ok(_) => true,
        Err(e) => {
            error!(path, error = %e, "Failed to read derived file");
            false
        }
    }
}
