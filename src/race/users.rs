//! User Directory
//!
//! Login-by-email and id lookup. Holds email and full name only.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::error::RaceError;
use super::model::{User, UserId};

#[derive(Default)]
struct Directory {
    users: BTreeMap<UserId, User>,
    by_email: BTreeMap<String, UserId>,
    next_id: u64,
}

/// Known users, keyed by id and by normalized email.
pub struct UserDirectory {
    inner: RwLock<Directory>,
}

impl UserDirectory {
    /// Create an empty directory. Ids start at 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Directory {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Log in with `email`, creating the user on first sight.
    ///
    /// An existing user keeps their id; their name is only filled in
    /// if it was previously empty.
    pub async fn login(&self, email: &str, full_name: &str) -> Result<User, RaceError> {
        let email = normalize_email(email)?;
        let full_name = full_name.trim();

        let mut dir = self.inner.write().await;

        if let Some(id) = dir.by_email.get(&email).copied() {
            let user = dir
                .users
                .get_mut(&id)
                .ok_or(RaceError::UserNotFound(id))?;
            if user.full_name.is_empty() && !full_name.is_empty() {
                user.full_name = full_name.to_string();
            }
            return Ok(user.clone());
        }

        let id = UserId::new(dir.next_id);
        dir.next_id += 1;

        let user = User {
            id,
            email: email.clone(),
            full_name: full_name.to_string(),
        };
        dir.users.insert(id, user.clone());
        dir.by_email.insert(email, id);

        Ok(user)
    }

    /// Look up a user.
    pub async fn get(&self, id: UserId) -> Result<User, RaceError> {
        let dir = self.inner.read().await;
        dir.users.get(&id).cloned().ok_or(RaceError::UserNotFound(id))
    }

    /// Number of known users.
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, RaceError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(RaceError::InvalidInput(format!("invalid email address: {:?}", email))),
    }
}
