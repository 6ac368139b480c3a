//! Reading and writing derived files through a [`FileSystem`].

use crate::config::CodecConfig;
use crate::diagnostic::WriteOutcome;
use crate::directives::scan_directives;
use crate::error::PersistError;
use crate::reader::{FastAtRead, ReadReport};
use crate::writer::{AtFileWriter, WriterOptions};
use atfile_outline::{OutlineModel, Position};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// File system abstraction for derived file I/O and testing
pub trait FileSystem {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error>;

    /// Create or replace a file, creating parent directories as needed
    fn write(&self, path: &Path, contents: &str) -> Result<(), std::io::Error>;
}

/// Real file system implementation
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }
}

/// In-memory file system for testing
#[derive(Default)]
pub struct MockFileSystem {
    files: RefCell<HashMap<PathBuf, String>>,
    writes: RefCell<usize>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    /// Number of `write` calls so far
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, std::io::Error> {
        self.contents(path).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), std::io::Error> {
        *self.writes.borrow_mut() += 1;
        self.add_file(path, contents);
        Ok(())
    }
}

/// What `write_derived_file` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The file already held the same text, up to line endings
    Unchanged,
    Written,
}

/// Read the derived file at `path` into `root`
#[instrument(skip_all, fields(path = %path.display(), root = %root.gnx()))]
pub fn read_derived_file<F, M>(
    fs: &F,
    path: &Path,
    model: &mut M,
    root: &Position,
    config: &CodecConfig,
) -> Result<ReadReport, PersistError>
where
    F: FileSystem + ?Sized,
    M: OutlineModel + ?Sized,
{
    let contents = fs
        .read_to_string(path)
        .map_err(|source| PersistError::io(path, source))?;
    let settings = scan_directives(&*model, root, config);
    let report =
        FastAtRead::new(model).read_into_root(&contents, &path.to_string_lossy(), root.gnx())?;
    if report.header.delims != settings.delims {
        warn!(
            file = ?report.header.delims,
            outline = ?settings.delims,
            "Header delimiters differ from the outline's"
        );
    }
    Ok(report)
}

/// Serialize `root` and write it to `path` unless the file already matches
#[instrument(skip_all, fields(path = %path.display(), root = %root.gnx()))]
pub fn write_derived_file<F, M>(
    fs: &F,
    path: &Path,
    model: &M,
    root: &Position,
    config: &CodecConfig,
) -> Result<WriteStatus, PersistError>
where
    F: FileSystem + ?Sized,
    M: OutlineModel + ?Sized,
{
    let sentinels = !model.get_headline(root.gnx()).trim_start().starts_with("@nosent");
    let outcome = write_outcome(model, root, sentinels, config);
    if outcome.has_errors() {
        return Err(PersistError::WriteErrors {
            path: path.to_path_buf(),
            count: outcome.error_count(),
        });
    }

    if fs.exists(path) {
        let existing = fs
            .read_to_string(path)
            .map_err(|source| PersistError::io(path, source))?;
        if same_ignoring_line_endings(&existing, &outcome.text) {
            info!("Derived file unchanged");
            return Ok(WriteStatus::Unchanged);
        }
    }
    fs.write(path, &outcome.text)
        .map_err(|source| PersistError::io(path, source))?;
    info!(bytes = outcome.text.len(), "Derived file written");
    Ok(WriteStatus::Written)
}

pub(crate) fn write_outcome<M: OutlineModel + ?Sized>(
    model: &M,
    root: &Position,
    sentinels: bool,
    config: &CodecConfig,
) -> WriteOutcome {
    let settings = scan_directives(model, root, config);
    let options = WriterOptions::from_config(config, sentinels);
    AtFileWriter::new(model, root.clone(), settings, options).write()
}

fn same_ignoring_line_endings(a: &str, b: &str) -> bool {
    a.replace("\r\n", "\n").replace('\r', "\n") == b.replace("\r\n", "\n").replace('\r', "\n")
}
