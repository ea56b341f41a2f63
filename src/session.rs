// 🔐 Login Gate - Partner picks their name, enters the shared password
//
// This is a UI gate, not authentication: one password for the whole
// partnership, compared by SHA-256 digest so the configured value never has
// to be stored in clear text.

use crate::error::LoginError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex SHA-256 of a password
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A logged-in partner. Lives until logout or until the UI goes away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub partner: String,
    pub token: Uuid,
    pub started_at: DateTime<Utc>,
}

impl Session {
    fn start(partner: &str) -> Self {
        Self {
            partner: partner.to_string(),
            token: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    pub fn greeting(&self) -> String {
        format!("Welcome, {}!", self.partner)
    }
}

#[derive(Debug, Clone)]
pub struct LoginGate {
    partners: Vec<String>,
    password_digest: String,
}

impl LoginGate {
    pub fn new(partners: Vec<String>, password_digest: impl Into<String>) -> Self {
        Self {
            partners,
            password_digest: password_digest.into().to_lowercase(),
        }
    }

    /// Names offered on the login screen
    pub fn partners(&self) -> &[String] {
        &self.partners
    }

    pub fn login(&self, selected: &str, password: &str) -> Result<Session, LoginError> {
        let selected = selected.trim();
        if selected.is_empty() || !self.partners.iter().any(|p| p == selected) {
            return Err(LoginError::MissingSelection);
        }
        if password.is_empty() {
            return Err(LoginError::MissingPassword);
        }
        if password_digest(password) != self.password_digest {
            log::warn!("Rejected login attempt for {}", selected);
            return Err(LoginError::IncorrectPassword);
        }

        log::info!("{} logged in", selected);
        Ok(Session::start(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_gate() -> LoginGate {
        LoginGate::new(
            vec!["George Bierwirth".to_string(), "Byron Smith".to_string()],
            password_digest("letmein"),
        )
    }

    #[test]
    fn test_password_digest_is_hex_sha256() {
        let digest = password_digest("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_login_success() {
        let gate = create_gate();
        let session = gate.login("Byron Smith", "letmein").unwrap();

        assert_eq!(session.partner, "Byron Smith");
        assert_eq!(session.greeting(), "Welcome, Byron Smith!");
    }

    #[test]
    fn test_login_requires_selection() {
        let gate = create_gate();
        assert_eq!(gate.login("", "letmein"), Err(LoginError::MissingSelection));
        assert_eq!(gate.login("Stranger", "letmein"), Err(LoginError::MissingSelection));
    }

    #[test]
    fn test_login_requires_password() {
        let gate = create_gate();
        assert_eq!(gate.login("Byron Smith", ""), Err(LoginError::MissingPassword));
    }

    #[test]
    fn test_login_wrong_password() {
        let gate = create_gate();
        assert_eq!(gate.login("Byron Smith", "LETMEIN"), Err(LoginError::IncorrectPassword));
    }

    #[test]
    fn test_uppercase_digest_accepted() {
        let gate = LoginGate::new(vec!["Byron Smith".to_string()], password_digest("x").to_uppercase());
        assert!(gate.login("Byron Smith", "x").is_ok());
    }

    #[test]
    fn test_sessions_get_distinct_tokens() {
        let gate = create_gate();
        let a = gate.login("Byron Smith", "letmein").unwrap();
        let b = gate.login("Byron Smith", "letmein").unwrap();
        assert_ne!(a.token, b.token);
    }
}
