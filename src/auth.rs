//! Stream access control
//!
//! A static table mapping stream names to their required passwords, loaded
//! once at startup. A stream can only be opened if its name has an entry
//! and the producer presents the matching password.
//!
//! File format (JSON):
//!
//! ```json
//! {
//!     "temp1": { "password": "x" },
//!     "accel0": { "password": "secret" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::StreamError;

/// Access requirements for one stream name
#[derive(Debug, Clone, Deserialize)]
pub struct AccessEntry {
    /// Required OpenStream password
    pub password: String,
}

/// Static stream-name -> password table
#[derive(Debug, Clone, Default)]
pub struct AccessTable {
    entries: HashMap<String, AccessEntry>,
}

impl AccessTable {
    /// Load the table from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, AccessEntry> = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self { entries })
    }

    /// Build a table from name -> password pairs
    pub fn from_pairs<I, N, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(name, password)| {
                (
                    name.into(),
                    AccessEntry {
                        password: password.into(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Verify that `name` exists and `password` matches
    pub fn check(&self, name: &str, password: &str) -> Result<(), StreamError> {
        match self.entries.get(name) {
            None => Err(StreamError::UnknownStream(name.to_owned())),
            Some(entry) if entry.password != password => {
                Err(StreamError::BadPassword(name.to_owned()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Number of configured streams
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        let table = AccessTable::from_pairs([("temp1", "x")]);

        assert!(table.check("temp1", "x").is_ok());
        assert_eq!(
            table.check("temp1", "wrong"),
            Err(StreamError::BadPassword("temp1".into()))
        );
        assert_eq!(
            table.check("nope", "x"),
            Err(StreamError::UnknownStream("nope".into()))
        );
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_rights.json");
        std::fs::write(
            &path,
            r#"{ "temp1": { "password": "x" }, "accel0": { "password": "s" } }"#,
        )
        .unwrap();

        let table = AccessTable::from_path(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.check("accel0", "s").is_ok());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_rights.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(AccessTable::from_path(&path).is_err());
    }
}
