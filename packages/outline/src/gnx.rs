use crate::error::{OutlineError, OutlineResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Globally unique node identifier, stable across sessions and files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gnx(String);

impl Gnx {
    pub fn new(gnx: impl Into<String>) -> Self {
        Self(gnx.into())
    }

    /// Build a gnx, rejecting spellings that cannot survive a node sentinel
    pub fn parse(gnx: &str) -> OutlineResult<Self> {
        if gnx.trim().is_empty() {
            return Err(OutlineError::invalid_gnx(gnx, "empty"));
        }
        if gnx.contains(':') {
            return Err(OutlineError::invalid_gnx(gnx, "contains ':'"));
        }
        if gnx.contains(['\n', '\r']) {
            return Err(OutlineError::invalid_gnx(gnx, "contains a line break"));
        }
        Ok(Self(gnx.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gnx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Gnx {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Gnx {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Gnx {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Gnx {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sequential gnx generator: `<user>.<timestamp>.<n>`
#[derive(Clone)]
pub struct GnxGenerator {
    user: String,
    timestamp: String,
    count: u32,
}

impl GnxGenerator {
    pub fn new(user: &str) -> Self {
        Self::with_timestamp(user, &Local::now().format("%Y%m%d%H%M%S").to_string())
    }

    pub fn with_timestamp(user: &str, timestamp: &str) -> Self {
        Self {
            user: user.to_string(),
            timestamp: timestamp.to_string(),
            count: 0,
        }
    }

    /// Generate next sequential gnx
    pub fn new_gnx(&mut self) -> Gnx {
        self.count += 1;
        Gnx(format!("{}.{}.{}", self.user, self.timestamp, self.count))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_gnxs() {
        let mut gen = GnxGenerator::with_timestamp("ekr", "20240101120000");

        let g1 = gen.new_gnx();
        let g2 = gen.new_gnx();

        assert_eq!(g1.as_str(), "ekr.20240101120000.1");
        assert_eq!(g2.as_str(), "ekr.20240101120000.2");
    }

    #[test]
    fn test_generated_gnx_is_parseable() {
        let mut gen = GnxGenerator::new("user");
        let gnx = gen.new_gnx();

        assert!(gnx.as_str().starts_with("user."));
        assert_eq!(gen.timestamp().len(), 14);
        assert!(Gnx::parse(gnx.as_str()).is_ok());
    }

    #[test]
    fn test_parse_rejects_sentinel_breaking_gnx() {
        assert!(Gnx::parse("").is_err());
        assert!(Gnx::parse("a:b").is_err());
        assert!(Gnx::parse("a\nb").is_err());
        assert_eq!(Gnx::parse("r1").unwrap(), Gnx::from("r1"));
    }

    #[test]
    fn test_gnx_serializes_as_plain_string() {
        let json = serde_json::to_string(&Gnx::from("c1")).unwrap();
        assert_eq!(json, "\"c1\"");
    }
}
