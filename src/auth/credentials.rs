//! In-memory credential table.
//!
//! Secrets are kept only as `SHA-256(salt ":" secret)` digests and compared in
//! constant time.  Plaintext entries from the config are salted with their
//! own username.  Lookups for unknown users hash against a dummy entry so the
//! miss path does the same work as a wrong-password path.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::UserEntry;

struct StoredSecret {
    salt: Vec<u8>,
    digest: [u8; 32],
}

impl StoredSecret {
    fn from_plain(salt: &[u8], secret: &str) -> Self {
        Self {
            salt: salt.to_vec(),
            digest: salted_digest(salt, secret.as_bytes()),
        }
    }

    fn matches(&self, secret: &str) -> bool {
        let candidate = salted_digest(&self.salt, secret.as_bytes());
        candidate[..].ct_eq(&self.digest[..]).into()
    }
}

fn salted_digest(salt: &[u8], secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(b":");
    hasher.update(secret);
    hasher.finalize().into()
}

/// Read-only username → secret table, built once at startup.
pub struct CredentialStore {
    entries: HashMap<String, StoredSecret>,
    decoy: StoredSecret,
}

impl CredentialStore {
    /// Build the store from the configured user table.
    pub fn from_config(users: &HashMap<String, UserEntry>) -> Result<Self> {
        let mut entries = HashMap::with_capacity(users.len());
        for (username, entry) in users {
            let stored = match entry {
                UserEntry::Plain(secret) => StoredSecret::from_plain(username.as_bytes(), secret),
                UserEntry::Hashed { salt, sha256 } => {
                    let bytes = hex::decode(sha256)
                        .with_context(|| format!("user {username:?}: sha256 is not valid hex"))?;
                    let digest: [u8; 32] = bytes.try_into().map_err(|_| {
                        anyhow::anyhow!("user {username:?}: sha256 must be 32 bytes")
                    })?;
                    StoredSecret {
                        salt: salt.as_bytes().to_vec(),
                        digest,
                    }
                }
            };
            entries.insert(username.clone(), stored);
        }
        Ok(Self {
            entries,
            decoy: StoredSecret::from_plain(b"decoy", ""),
        })
    }

    /// `true` iff `username` is registered and `secret` is its secret.
    pub fn verify(&self, username: &str, secret: &str) -> bool {
        match self.entries.get(username) {
            Some(stored) => stored.matches(secret),
            None => {
                std::hint::black_box(self.decoy.matches(secret));
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hex digest for a pre-hashed `users` entry with the given salt.
pub fn hash_secret(salt: &str, secret: &str) -> String {
    hex::encode(salted_digest(salt.as_bytes(), secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(users: &[(&str, UserEntry)]) -> CredentialStore {
        let map = users
            .iter()
            .map(|(name, entry)| (name.to_string(), entry.clone()))
            .collect();
        CredentialStore::from_config(&map).unwrap()
    }

    fn plain(secret: &str) -> UserEntry {
        UserEntry::Plain(secret.to_string())
    }

    #[test]
    fn accepts_registered_pair() {
        let store = store(&[("alice", plain("s3cret"))]);
        assert!(store.verify("alice", "s3cret"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let store = store(&[("alice", plain("s3cret"))]);
        assert!(!store.verify("alice", "wrong"));
        assert!(!store.verify("alice", ""));
        assert!(!store.verify("alice", "s3cret "));
    }

    #[test]
    fn rejects_unknown_user() {
        let store = store(&[("alice", plain("s3cret"))]);
        assert!(!store.verify("bob", "anything"));
        assert!(!store.verify("", ""));
    }

    #[test]
    fn secrets_are_per_user() {
        let store = store(&[("alice", plain("one")), ("bob", plain("two"))]);
        assert!(store.verify("alice", "one"));
        assert!(store.verify("bob", "two"));
        assert!(!store.verify("alice", "two"));
        assert!(!store.verify("bob", "one"));
    }

    #[test]
    fn username_is_case_sensitive() {
        let store = store(&[("alice", plain("s3cret"))]);
        assert!(!store.verify("Alice", "s3cret"));
    }

    #[test]
    fn empty_secret_is_a_valid_secret() {
        let store = store(&[("guest", plain(""))]);
        assert!(store.verify("guest", ""));
        assert!(!store.verify("guest", "x"));
    }

    #[test]
    fn accepts_prehashed_entry() {
        let entry = UserEntry::Hashed {
            salt: "pepper".to_string(),
            sha256: hash_secret("pepper", "s3cret"),
        };
        let store = store(&[("alice", entry)]);
        assert!(store.verify("alice", "s3cret"));
        assert!(!store.verify("alice", "wrong"));
    }

    #[test]
    fn rejects_invalid_hex() {
        let users = HashMap::from([(
            "alice".to_string(),
            UserEntry::Hashed {
                salt: "pepper".to_string(),
                sha256: "not-hex".to_string(),
            },
        )]);
        assert!(CredentialStore::from_config(&users).is_err());
    }

    #[test]
    fn rejects_short_digest() {
        let users = HashMap::from([(
            "alice".to_string(),
            UserEntry::Hashed {
                salt: "pepper".to_string(),
                sha256: "00ff".to_string(),
            },
        )]);
        let err = CredentialStore::from_config(&users).err().unwrap();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn len_counts_users() {
        let store = store(&[("alice", plain("a")), ("bob", plain("b"))]);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
