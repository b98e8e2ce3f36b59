use std::fmt;

use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

use crate::model::{Role, User};

/// Shared-password check at connection startup. Identity is resolved per
/// statement from the `user` parameter (the caller's e-mail).
#[derive(Debug)]
pub struct RoomSlotAuthSource {
    password: String,
}

impl RoomSlotAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for RoomSlotAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The connection's e-mail is not a registered user.
    NotRegistered(String),
    Forbidden { role: Role, action: &'static str },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotRegistered(email) => {
                write!(f, "{email} is not registered; INSERT INTO users first")
            }
            AuthError::Forbidden { role, action } => {
                write!(f, "role {} may not {action}", role.as_str())
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Require a registered caller holding one of `allowed`. An empty slice admits any role.
pub fn authorize<'a>(
    caller: Option<&'a User>,
    email: &str,
    allowed: &[Role],
    action: &'static str,
) -> Result<&'a User, AuthError> {
    let user = caller.ok_or_else(|| AuthError::NotRegistered(email.to_string()))?;
    if allowed.is_empty() || allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(AuthError::Forbidden {
            role: user.role,
            action,
        })
    }
}
