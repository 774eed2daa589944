//! Persisted-mode storage for game records.

mod error;
mod models;
mod schema;
mod store;

pub use error::DbError;
pub use models::{GameRecord, NewGameRecord};
pub use store::GameStore;
