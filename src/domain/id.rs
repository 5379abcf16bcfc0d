//! Opaque identifiers for projects and tasks
//!
//! ID Format:
//! - Generated project IDs: `p-{7-char-hash}` (e.g., `p-7f2b4c1`)
//! - Generated task IDs: `t-{7-char-hash}` (e.g., `t-9d3e5f2`)
//!
//! Hash is derived from title + creation timestamp. Snapshots exported from
//! other systems may carry any opaque ID (UUIDs, numbers), so parsing only
//! requires a non-empty string without whitespace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("ID must not be empty")]
    Empty,

    #[error("ID must not contain whitespace: '{0}'")]
    Whitespace(String),
}

/// Generates a 7-character hash from title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", title, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

fn validate(s: &str) -> Result<String, IdError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace(s.to_string()));
    }
    Ok(s.to_string())
}

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generates a new ID from a title and creation timestamp
            pub fn generate(title: &str, timestamp: DateTime<Utc>) -> Self {
                Self(format!("{}-{}", $prefix, generate_hash(title, timestamp)))
            }

            /// Returns the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate(s).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a project (the tenant scope tasks are ordered within)
    ProjectId,
    "p"
);

opaque_id!(
    /// Identifier of a task, unique within a snapshot
    TaskId,
    "t"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_task_id_format() {
        let id = TaskId::generate("Build API", Utc::now());
        let s = id.to_string();

        assert!(s.starts_with("t-"));
        assert_eq!(s.len(), 9);
        assert!(s[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_project_id_format() {
        let id = ProjectId::generate("Website", Utc::now());
        assert!(id.as_str().starts_with("p-"));
    }

    #[test]
    fn same_title_different_time_differs() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::nanoseconds(1);

        assert_ne!(TaskId::generate("Same", t1), TaskId::generate("Same", t2));
    }

    #[test]
    fn parses_opaque_ids() {
        let uuid: TaskId = "3f1e2a7c-9b0d-4c55-8e21-0a6b7d4f9c12".parse().unwrap();
        assert_eq!(uuid.as_str(), "3f1e2a7c-9b0d-4c55-8e21-0a6b7d4f9c12");

        let short: TaskId = "  A ".parse().unwrap();
        assert_eq!(short.as_str(), "A");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!("".parse::<TaskId>(), Err(IdError::Empty));
        assert_eq!("   ".parse::<ProjectId>(), Err(IdError::Empty));
        assert!(matches!(
            "two words".parse::<TaskId>(),
            Err(IdError::Whitespace(_))
        ));
    }

    #[test]
    fn serde_as_plain_string() {
        let id: TaskId = "t-1234567".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t-1234567\"");

        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<TaskId>("\"\"").is_err());
    }
}
