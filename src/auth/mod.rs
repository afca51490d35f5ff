use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo_types;
pub mod services;

pub use extractors::AuthUser;
pub use services::AuthService;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
