//! In-memory account registry.
//!
//! Holds registered users and their bcrypt password hashes for the lifetime
//! of the process. The chat layer consults it to reject unknown
//! counterparts and to resolve display names for events.

use std::collections::HashMap;

use bcrypt::{hash, verify, DEFAULT_COST};
use chatme_common::UserInfo;
use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

struct Account {
    info: UserInfo,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, Account>,
    by_email: HashMap<String, String>,
}

pub struct UserDirectory {
    inner: RwLock<Inner>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a new account. Fails if the email is already taken.
    pub fn register(&self, email: &str, name: &str, password: &str) -> Result<UserInfo> {
        let email = email.trim().to_lowercase();
        let name = name.trim();
        if email.is_empty() || name.is_empty() {
            return Err(Error::InvalidArgument(
                "email and name must not be empty".into(),
            ));
        }
        if password.is_empty() {
            return Err(Error::InvalidArgument("password must not be empty".into()));
        }

        // Hash outside the lock; bcrypt is deliberately slow.
        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))?;

        let mut inner = self.inner.write();
        if inner.by_email.contains_key(&email) {
            return Err(Error::InvalidArgument("email already registered".into()));
        }

        let info = UserInfo {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: name.to_string(),
            avatar: None,
        };

        inner.by_email.insert(email.clone(), info.id.clone());
        inner.by_id.insert(
            info.id.clone(),
            Account {
                info: info.clone(),
                password_hash,
            },
        );

        info!("registered user {} ({})", info.name, email);

        Ok(info)
    }

    /// Check credentials for login. The caller gets `Unauthenticated` for
    /// unknown emails and bad passwords alike.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserInfo> {
        let email = email.trim().to_lowercase();

        let (info, password_hash) = {
            let inner = self.inner.read();
            let id = inner.by_email.get(&email).ok_or(Error::Unauthenticated)?;
            let account = inner.by_id.get(id).ok_or(Error::Unauthenticated)?;
            (account.info.clone(), account.password_hash.clone())
        };

        let valid = verify(password, &password_hash)
            .map_err(|e| Error::Internal(format!("failed to verify password: {e}")))?;

        if !valid {
            warn!("failed login attempt for {email}");
            return Err(Error::Unauthenticated);
        }

        Ok(info)
    }

    pub fn get(&self, user_id: &str) -> Result<UserInfo> {
        self.inner
            .read()
            .by_id
            .get(user_id)
            .map(|a| a.info.clone())
            .ok_or(Error::NotFound("user"))
    }

    pub fn list(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self
            .inner
            .read()
            .by_id
            .values()
            .map(|a| a.info.clone())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_authenticate() {
        let dir = UserDirectory::new();
        let user = dir.register("john@example.com", "John Doe", "password").unwrap();

        let found = dir.authenticate("john@example.com", "password").unwrap();
        assert_eq!(found.id, user.id);

        // Email lookup is case-insensitive.
        assert!(dir.authenticate("John@Example.com", "password").is_ok());
    }

    #[test]
    fn duplicate_email_rejected() {
        let dir = UserDirectory::new();
        dir.register("john@example.com", "John", "pw").unwrap();
        assert!(matches!(
            dir.register("john@example.com", "Johnny", "pw2"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn bad_password_is_unauthenticated() {
        let dir = UserDirectory::new();
        dir.register("john@example.com", "John", "pw").unwrap();
        assert!(matches!(
            dir.authenticate("john@example.com", "wrong"),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            dir.authenticate("nobody@example.com", "pw"),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = UserDirectory::new();
        assert!(matches!(dir.get("missing"), Err(Error::NotFound("user"))));
    }
}
