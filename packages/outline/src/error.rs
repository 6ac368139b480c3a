use thiserror::Error;

pub type OutlineResult<T> = Result<T, OutlineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutlineError {
    #[error("Duplicate gnx: {gnx}")]
    DuplicateGnx { gnx: String },

    #[error("Unknown gnx: {gnx}")]
    UnknownGnx { gnx: String },

    #[error("Invalid gnx {gnx:?}: {reason}")]
    InvalidGnx { gnx: String, reason: String },

    #[error("Linking {child} under {parent} would make {child} its own ancestor")]
    CycleDetected { parent: String, child: String },

    #[error("Child index {index} out of range for {parent}")]
    ChildIndexOutOfRange { parent: String, index: usize },
}

impl OutlineError {
    pub fn duplicate_gnx(gnx: impl Into<String>) -> Self {
        Self::DuplicateGnx { gnx: gnx.into() }
    }

    pub fn unknown_gnx(gnx: impl Into<String>) -> Self {
        Self::UnknownGnx { gnx: gnx.into() }
    }

    pub fn invalid_gnx(gnx: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGnx {
            gnx: gnx.into(),
            reason: reason.into(),
        }
    }

    pub fn cycle_detected(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::CycleDetected {
            parent: parent.into(),
            child: child.into(),
        }
    }
}
