pub mod config;
pub mod context;
pub mod error;
pub mod keys;
pub mod locks;
pub mod store;
pub mod types;
pub mod users;

pub use config::Config;
pub use context::SouqContext;
pub use error::{AppError, AppResult};
pub use locks::{KeyGuard, KeyLocks};
pub use store::{get_json, set_json, KvStore, MemoryStore, RedisPool, SharedStore, StoreError};
pub use types::{generate_id, User, UserProfile, UserRole};
pub use users::{ProfileUpdate, RegisterUser, UserDirectory};
