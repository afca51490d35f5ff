use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    password::Hasher,
    repo_types::{AccessLevel, AuthToken, User},
};
use crate::{config::AppConfig, error::AppError, state::AppState, storage::UserStore};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Credential and session manager: password hashing, token issue,
/// resolution and revocation over a [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: Arc<JwtKeys>,
    hasher: Hasher,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AuthService {
    pub fn new(config: &AppConfig, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        Ok(Self {
            users,
            keys: Arc::new(JwtKeys::new(&config.jwt)),
            hasher: Hasher::new(&config.password)?,
        })
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<(User, String), AppError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation(format!("{email} is not a valid email")));
        }
        validate_password(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let user = User::new(email, password, &self.hasher).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AppError::Internal(e.to_string())
        })?;
        // A concurrent registration can still win the race; the store reports it.
        self.users.insert(&user).await?;

        let token = self.issue_token(user.id).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, token))
    }

    /// Unknown email and wrong password fail the same way.
    #[instrument(skip(self, password))]
    pub async fn find_by_credentials(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AppError::Authentication);
        };

        match self.hasher.verify(password, &user.password_hash) {
            Ok(true) => Ok(user),
            Ok(false) => {
                warn!(user_id = %user.id, "login invalid password");
                Err(AppError::Authentication)
            }
            Err(e) => {
                error!(error = %e, user_id = %user.id, "stored password hash unreadable");
                Err(AppError::Authentication)
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AppError> {
        let user = self.find_by_credentials(email, password).await?;
        let token = self.issue_token(user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    /// Signs a new token and stores it before handing it out.
    #[instrument(skip(self))]
    pub async fn issue_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let access = AccessLevel::Auth;
        let token = self.keys.sign(user_id, access).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::Internal(e.to_string())
        })?;
        self.users
            .push_token(
                user_id,
                &AuthToken {
                    access,
                    token: token.clone(),
                },
            )
            .await?;
        Ok(token)
    }

    /// Resolves a bearer token to its user. The token must verify and
    /// still be on record; every failure is [`AppError::Authentication`].
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let claims = match self.keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AppError::Authentication);
            }
        };

        match self.users.find_by_token(claims.sub, claims.access, token).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                warn!(user_id = %claims.sub, "token not on record");
                Err(AppError::Authentication)
            }
            Err(e) => {
                error!(error = %e, user_id = %claims.sub, "token lookup failed");
                Err(AppError::Authentication)
            }
        }
    }

    /// Revokes one token. Revoking an unknown token succeeds.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, user_id: Uuid, token: &str) -> Result<(), AppError> {
        self.users
            .remove_token(user_id, AccessLevel::Auth, token)
            .await
            .map_err(AppError::Persistence)?;
        info!(user_id = %user_id, "token revoked");
        Ok(())
    }

    /// Rehashes and saves against the stored record. Existing sessions
    /// stay valid.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            warn!(user_id = %user_id, "password change for unknown user");
            return Err(AppError::Authentication);
        };
        let ok = self
            .hasher
            .verify(current, &user.password_hash)
            .unwrap_or(false);
        if !ok {
            warn!("password change with wrong current password");
            return Err(AppError::Authentication);
        }
        validate_password(new)?;

        user.set_password(new, &self.hasher)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.users.save(&user).await?;
        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
