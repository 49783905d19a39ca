//! Kind maturity
//!
//! `Maturity` is the totally ordered contract level a kind declares. It is
//! monotonic across a kind's published history. Planned kinds that have no
//! declaration yet are a reporting concern only, expressed by `KindStatus`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared maturity of a kind, ordered `committed < synchronized < stable < mature`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    /// Schema exists in the tree but may still be freely rewritten
    Committed,
    /// Schema is kept in sync with its consumers but not yet frozen
    Synchronized,
    /// Published lineage is append-only from here on
    Stable,
    /// Stable and long-lived
    Mature,
}

impl Maturity {
    /// All maturities in ascending order
    pub const ALL: [Maturity; 4] = [
        Maturity::Committed,
        Maturity::Synchronized,
        Maturity::Stable,
        Maturity::Mature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::Committed => "committed",
            Maturity::Synchronized => "synchronized",
            Maturity::Stable => "stable",
            Maturity::Mature => "mature",
        }
    }

    /// Whether the append-only rule applies to a kind published at this maturity
    pub fn is_append_only(&self) -> bool {
        *self >= Maturity::Stable
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Maturity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Maturity::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown maturity '{}' (expected one of: committed, synchronized, stable, mature)",
                    s
                )
            })
    }
}

/// Reporting-only status of a kind.
///
/// Sorts below every declared maturity, so a planned kind can never be
/// mistaken for a committed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "maturity")]
pub enum KindStatus {
    /// Listed as planned in configuration; no declaration exists yet
    Planned,
    /// Declared in the tree at the given maturity
    Declared(Maturity),
}

impl KindStatus {
    pub fn maturity(&self) -> Option<Maturity> {
        match self {
            KindStatus::Planned => None,
            KindStatus::Declared(m) => Some(*m),
        }
    }
}

impl fmt::Display for KindStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindStatus::Planned => f.write_str("planned"),
            KindStatus::Declared(m) => write!(f, "{}", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maturity_ordering() {
        assert!(Maturity::Committed < Maturity::Synchronized);
        assert!(Maturity::Synchronized < Maturity::Stable);
        assert!(Maturity::Stable < Maturity::Mature);
    }

    #[test]
    fn test_append_only_threshold() {
        assert!(!Maturity::Committed.is_append_only());
        assert!(!Maturity::Synchronized.is_append_only());
        assert!(Maturity::Stable.is_append_only());
        assert!(Maturity::Mature.is_append_only());
    }

    #[test]
    fn test_parse_rejects_reporting_states() {
        assert_eq!("stable".parse::<Maturity>().unwrap(), Maturity::Stable);
        assert!("planned".parse::<Maturity>().is_err());
        assert!("experimental".parse::<Maturity>().is_err());
    }

    #[test]
    fn test_planned_sorts_below_declared() {
        assert!(KindStatus::Planned < KindStatus::Declared(Maturity::Committed));
        assert_eq!(KindStatus::Declared(Maturity::Mature).maturity(), Some(Maturity::Mature));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Maturity::Synchronized).unwrap();
        assert_eq!(json, "\"synchronized\"");
        let back: Maturity = serde_json::from_str("\"mature\"").unwrap();
        assert_eq!(back, Maturity::Mature);
    }
}
