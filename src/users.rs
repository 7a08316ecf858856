// 🔐 Users & Roles - operator accounts and the actor context
//
// Passwords are stored as salted SHA-256, never in clear. Role gating is
// explicit: mutating operations take an ActorContext and call
// require_master() themselves instead of reading ambient session state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Full access, including destructive operations
    Master,

    /// Read and day-to-day data entry
    Standard,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "Master",
            Role::Standard => "Standard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Master" => Some(Role::Master),
            "Standard" => Some(Role::Standard),
            _ => None,
        }
    }
}

// ============================================================================
// ACTOR CONTEXT
// ============================================================================

/// Request-scoped identity of whoever is performing an operation. Passed
/// into store calls explicitly; audit entries are written from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_code: i64,
    pub username: String,
    pub role: Role,
}

impl ActorContext {
    pub fn new(user_code: i64, username: &str, role: Role) -> Self {
        ActorContext {
            user_code,
            username: username.to_string(),
            role,
        }
    }

    /// Gate for Master-only operations.
    pub fn require_master(&self) -> Result<(), String> {
        if self.role == Role::Master {
            Ok(())
        } else {
            Err(format!(
                "access denied: {} requires the Master role",
                self.username
            ))
        }
    }
}

// ============================================================================
// USER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub code: i64,
    pub username: String,
    pub full_name: String,

    /// "salt$digest", both hex
    pub password_hash: String,

    pub role: Role,
}

impl User {
    pub fn new(username: &str, full_name: &str, password: &str, role: Role) -> Self {
        let mut user = User {
            code: 0,
            username: username.to_string(),
            full_name: full_name.to_string(),
            password_hash: String::new(),
            role,
        };
        user.set_password(password);
        user
    }

    pub fn set_password(&mut self, password: &str) {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        self.password_hash = format!("{}${}", salt, digest(&salt, password));
    }

    pub fn check_password(&self, password: &str) -> bool {
        match self.password_hash.split_once('$') {
            Some((salt, stored)) => digest(salt, password) == stored,
            None => false,
        }
    }

    pub fn actor(&self) -> ActorContext {
        ActorContext::new(self.code, &self.username, self.role)
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", salt, password));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// USER REGISTRY
// ============================================================================

pub struct UserRegistry {
    users: Vec<User>,
    next_code: i64,
}

impl UserRegistry {
    pub fn new() -> Self {
        UserRegistry {
            users: Vec::new(),
            next_code: 1,
        }
    }

    pub fn register(&mut self, mut user: User) -> Result<i64, String> {
        if user.username.trim().is_empty() {
            return Err("username cannot be empty".to_string());
        }

        if self
            .users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(format!("username already taken: {}", user.username));
        }

        user.code = self.next_code;
        self.next_code += 1;

        let code = user.code;
        self.users.push(user);
        Ok(code)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    /// Verify credentials and hand back the actor context for the session.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<ActorContext> {
        self.find_by_username(username)
            .filter(|u| u.check_password(password))
            .map(|u| u.actor())
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let user = User::new("ana", "Ana Lima", "s3cret", Role::Master);

        assert!(user.check_password("s3cret"));
        assert!(!user.check_password("wrong"));
        assert!(!user.password_hash.contains("s3cret"));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let a = User::new("a", "A", "same-password", Role::Standard);
        let b = User::new("b", "B", "same-password", Role::Standard);
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn test_register_unique_username() {
        let mut registry = UserRegistry::new();
        registry
            .register(User::new("ana", "Ana Lima", "pw", Role::Master))
            .unwrap();

        let err = registry
            .register(User::new("ANA", "Another", "pw", Role::Standard))
            .unwrap_err();
        assert!(err.contains("already taken"));
    }

    #[test]
    fn test_authenticate() {
        let mut registry = UserRegistry::new();
        registry
            .register(User::new("ana", "Ana Lima", "s3cret", Role::Master))
            .unwrap();

        let actor = registry.authenticate("ana", "s3cret").unwrap();
        assert_eq!(actor.username, "ana");
        assert_eq!(actor.role, Role::Master);

        assert!(registry.authenticate("ana", "wrong").is_none());
        assert!(registry.authenticate("nobody", "s3cret").is_none());
    }

    #[test]
    fn test_require_master_gate() {
        let master = ActorContext::new(1, "ana", Role::Master);
        let standard = ActorContext::new(2, "rui", Role::Standard);

        assert!(master.require_master().is_ok());
        let err = standard.require_master().unwrap_err();
        assert!(err.contains("access denied"));
    }

    #[test]
    fn test_set_password_rotates_hash() {
        let mut user = User::new("ana", "Ana Lima", "old", Role::Master);
        let old_hash = user.password_hash.clone();

        user.set_password("new");
        assert_ne!(user.password_hash, old_hash);
        assert!(user.check_password("new"));
        assert!(!user.check_password("old"));
    }
}
