pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

#[cfg(test)]
mod tests;

pub use auth::{generate_token, verify_token, AuthenticatedUser, Claims};
pub use error::{ApiError, ApiResult};
pub use server::{router, run};
