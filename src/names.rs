//! Dotted hierarchical names such as `frank.coco.com.`
//!
//! The rightmost label is the most significant one. `.` alone names the
//! root of the hierarchy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NamingError;

/// A parsed dotted name, stored in written order (`frank`, `coco`, `com`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DottedName {
    labels: Vec<String>,
}

impl DottedName {
    /// The root name `.`.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Parse a dotted name. The trailing dot is optional on input.
    pub fn parse(input: &str) -> Result<Self, NamingError> {
        let trimmed = input.trim();
        if trimmed == "." {
            return Ok(Self::root());
        }
        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(NamingError::InvalidName(input.to_string()));
        }

        let mut labels = Vec::new();
        for label in body.split('.') {
            validate_label(label).map_err(|_| NamingError::InvalidName(input.to_string()))?;
            labels.push(label.to_string());
        }
        Ok(Self { labels })
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of labels; zero for the root.
    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    /// The least significant label (`frank` for `frank.coco.com.`).
    pub fn leaf(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// The enclosing name, or `None` for the root.
    pub fn parent(&self) -> Option<DottedName> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].to_vec(),
        })
    }

    /// Labels from most to least significant (`com`, `coco`, `frank`).
    pub fn components_from_right(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().rev().map(String::as_str)
    }

    /// Name of the child `label` directly below this one.
    pub fn child(&self, label: &str) -> Result<DottedName, NamingError> {
        validate_label(label)?;
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(label.to_string());
        labels.extend(self.labels.iter().cloned());
        Ok(Self { labels })
    }
}

fn validate_label(label: &str) -> Result<(), NamingError> {
    if label.is_empty() || label.contains('.') || label.chars().any(char::is_whitespace) {
        return Err(NamingError::InvalidName(label.to_string()));
    }
    Ok(())
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        Ok(())
    }
}

impl FromStr for DottedName {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DottedName {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DottedName> for String {
    fn from(name: DottedName) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fully_qualified_name() {
        let name = DottedName::parse("frank.coco.com.").unwrap();
        assert_eq!(name.depth(), 3);
        assert_eq!(name.leaf(), Some("frank"));
        assert_eq!(name.to_string(), "frank.coco.com.");
    }

    #[test]
    fn trailing_dot_is_optional() {
        assert_eq!(
            DottedName::parse("coco.com").unwrap(),
            DottedName::parse("coco.com.").unwrap()
        );
    }

    #[test]
    fn root_round_trips() {
        let root = DottedName::parse(".").unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), ".");
        assert!(root.parent().is_none());
        assert!(root.leaf().is_none());
    }

    #[test]
    fn rejects_empty_labels() {
        assert!(DottedName::parse("a..b.").is_err());
        assert!(DottedName::parse("").is_err());
        assert!(DottedName::parse("..").is_err());
        assert!(DottedName::parse("bad name.com.").is_err());
    }

    #[test]
    fn components_walk_from_the_right() {
        let name = DottedName::parse("frank.coco.com.").unwrap();
        let walked: Vec<&str> = name.components_from_right().collect();
        assert_eq!(walked, vec!["com", "coco", "frank"]);
    }

    #[test]
    fn parent_and_child_are_inverse() {
        let coco = DottedName::parse("coco.com.").unwrap();
        let frank = coco.child("frank").unwrap();
        assert_eq!(frank.to_string(), "frank.coco.com.");
        assert_eq!(frank.parent().unwrap(), coco);
        assert_eq!(
            DottedName::parse("com.").unwrap().parent().unwrap(),
            DottedName::root()
        );
    }

    #[test]
    fn serializes_as_string() {
        let name = DottedName::parse("coco.com.").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"coco.com.\"");
        let back: DottedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
