//! Explicit session identity.
//!
//! Components that need to know who the user is receive a [`Session`]
//! value instead of consulting a process-wide accessor. The session holds
//! at most one authenticated principal for its whole lifetime.

use serde::{Deserialize, Serialize};

use crate::models::Area;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// The current session: either anonymous or bound to a principal.
#[derive(Debug, Clone, Default)]
pub struct Session {
    principal: Option<Principal>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn email(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.email.as_str())
    }

    /// Whether the session's user created `area`. Only the creator may
    /// edit or delete an area.
    pub fn owns(&self, area: &Area) -> bool {
        match self.email() {
            Some(email) => !area.upload_user.is_empty() && area.upload_user == email,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(email: &str) -> Principal {
        Principal {
            uid: "uid-1".into(),
            email: email.into(),
            display_name: None,
            photo_url: None,
        }
    }

    #[test]
    fn test_anonymous() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert_eq!(session.email(), None);
    }

    #[test]
    fn test_owns() {
        let session = Session::authenticated(principal("me@example.com"));
        let mine = Area::new("A", "B", 1.0, 2.0).with_upload_user("me@example.com");
        let theirs = Area::new("A", "B", 1.0, 2.0).with_upload_user("other@example.com");
        let orphan = Area::new("A", "B", 1.0, 2.0);

        assert!(session.owns(&mine));
        assert!(!session.owns(&theirs));
        assert!(!session.owns(&orphan));
        assert!(!Session::anonymous().owns(&mine));
    }
}
