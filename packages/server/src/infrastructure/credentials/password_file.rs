//! Password file backed credential store.
//!
//! One user per line:
//!
//! ```text
//! # comment
//! alice = 5f4dcc3b5aa765d61d8327deb882cf99:02
//! bob = 7c6a180b36896a0a8c02787eeafb0e4c
//! ```
//!
//! The part after `:` lists the doors the user may open, one decimal digit
//! per door. Without it the user may open doors 0 through 99.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::domain::{CredentialStore, UserRecord};

const ALL_DOORS: std::ops::RangeInclusive<usize> = 0..=99;

#[derive(Debug, Error)]
pub enum PasswordFileError {
    #[error("failed to read password file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse password file text into user records. Malformed lines are skipped.
pub fn parse_passwords(text: &str) -> HashMap<String, UserRecord> {
    let mut users = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, rest)) = line.split_once('=') else {
            tracing::debug!("Skipping password line without '='");
            continue;
        };
        let name = name.trim();
        let rest = rest.trim();
        if name.is_empty() || rest.is_empty() {
            continue;
        }

        let (hash, doors) = match rest.split_once(':') {
            Some((hash, digits)) => (
                hash.trim(),
                digits
                    .trim()
                    .chars()
                    .filter_map(|c| c.to_digit(10))
                    .map(|d| d as usize)
                    .collect::<BTreeSet<_>>(),
            ),
            None => (rest, ALL_DOORS.collect()),
        };

        users.insert(
            name.to_string(),
            UserRecord {
                password_hash: hash.to_string(),
                doors,
            },
        );
    }
    users
}

/// Credential store loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct PasswordFileStore {
    users: HashMap<String, UserRecord>,
}

impl PasswordFileStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PasswordFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PasswordFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_text(&text);
        tracing::info!("Loaded {} users from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            users: parse_passwords(text),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for PasswordFileStore {
    fn lookup(&self, user: &str) -> Option<UserRecord> {
        self.users.get(user).cloned()
    }
}
