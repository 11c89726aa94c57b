//! Credential collaborator
//!
//! The protocol engine only ever asks one question: is this user/password
//! pair authorized? The store behind it is a `user:pass` text file (one pair
//! per line, `#` comments allowed) or the built-in development set.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use log::info;

pub struct Credentials {
    users: HashMap<String, String>,
}

impl Credentials {
    /// Loads an authorized-users file of `user:pass` lines.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut users = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((user, pass)) = line.split_once(':') {
                users.insert(user.trim().to_string(), pass.trim().to_string());
            }
        }
        info!("loaded {} credential entries", users.len());
        Ok(Self { users })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            users: pairs
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    /// Built-in development store, for running without an authusers file.
    pub fn development() -> Self {
        Self::from_pairs([("alice", "alice123"), ("bob", "bob123"), ("admin", "admin123")])
    }

    /// The lookup the PASS handler delegates to.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users.get(username).is_some_and(|p| p == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticates_known_pairs_only() {
        let creds = Credentials::from_pairs([("alice", "secret")]);
        assert!(creds.authenticate("alice", "secret"));
        assert!(!creds.authenticate("alice", "wrongpass"));
        assert!(!creds.authenticate("mallory", "secret"));
    }

    #[test]
    fn parses_authusers_format() {
        let path = std::env::temp_dir().join(format!("ferroftp-authusers-{}", std::process::id()));
        std::fs::write(&path, "# authorized users\nalice:secret\n\nbob : hunter2\n").unwrap();
        let creds = Credentials::from_file(&path).unwrap();
        assert!(creds.authenticate("alice", "secret"));
        assert!(creds.authenticate("bob", "hunter2"));
        assert!(!creds.authenticate("carol", "x"));
        std::fs::remove_file(&path).unwrap();
    }
}
