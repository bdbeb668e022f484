use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a row in `securities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityId(pub i32);

/// Primary key of a row in `benchmarks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BenchmarkId(pub i32);

/// Primary key of a row in `portfolios`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortfolioId(pub i32);

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BenchmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which price table an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Security,
    Benchmark,
}

impl EntityKind {
    /// Tag stored in `data_quality_status.entity_type`.
    pub fn as_tag(&self) -> &'static str {
        match self {
            EntityKind::Security => "security",
            EntityKind::Benchmark => "benchmark",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "security" => Some(EntityKind::Security),
            "benchmark" => Some(EntityKind::Benchmark),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_tags_match_status_table() {
        assert_eq!(EntityKind::Security.as_tag(), "security");
        assert_eq!(EntityKind::Benchmark.to_string(), "benchmark");
        assert_eq!(EntityKind::from_tag("security"), Some(EntityKind::Security));
        assert_eq!(EntityKind::from_tag("portfolio"), None);
    }

    #[test]
    fn ids_display_as_raw_integers() {
        assert_eq!(SecurityId(7).to_string(), "7");
        assert_eq!(PortfolioId(1).to_string(), "1");
    }
}
