use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::AccessLevel;

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,            // user ID
    pub access: AccessLevel,  // token purpose
    pub jti: Uuid,            // makes every token distinct
    pub iat: usize,           // issued at (unix timestamp)
    pub exp: usize,           // expires at (unix timestamp)
    pub iss: String,          // issuer
    pub aud: String,          // audience
}
