use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique primary identifier
    pub username: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    /// `DateTime::UNIX_EPOCH` until the password is first changed
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_changed_password(&self) -> bool {
        self.password_changed_at != DateTime::<Utc>::UNIX_EPOCH
    }
}

/// Parameters for inserting a new user row. The password must already be
/// hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

/// Partial update of a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.hashed_password.is_none()
    }
}
