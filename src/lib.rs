//! Stateless Chess - correspondence chess over tamper-evident links
//!
//! Two remote parties play through exchanged links with no ambient
//! trust: every link proves its own state with a keyed integrity stamp,
//! and per-side capability tokens prove the right to move.
//!
//! # Architecture
//!
//! - **Stateless mode**: the entire game state travels in the link; the
//!   server holds no record.
//! - **Persisted mode**: the server holds the record, the link carries a
//!   numeric id, and concurrent transitions are serialized by an
//!   optimistic version check.
//!
//! Both modes share one transition contract in [`MoveAuthorizer`]; the
//! chess rules themselves are an external collaborator behind the
//! [`Rules`] trait.
//!
//! # Example
//!
//! ```no_run
//! use stateless_chess::{MoveAuthorizer, NotificationQueue, ChessRules, ServerConfig};
//! use std::sync::Arc;
//!
//! # fn example(config: ServerConfig) {
//! let (queue, _rx) = NotificationQueue::channel();
//! let authorizer = MoveAuthorizer::new(&config, Arc::new(ChessRules::new()), queue);
//! let (state, link, white_token) =
//!     authorizer.create_stateless("alice".to_string(), "bob".to_string());
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod authorizer;
mod cli;
mod config;
mod db;
mod error;
mod link;
mod notify;
mod rules;
mod server;
mod stamp;
mod state;
mod token;

// Crate-level exports - CLI
pub use cli::{Cli, Command};

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Error taxonomy
pub use error::ProtocolError;

// Crate-level exports - Rules engine contract
pub use rules::{ChessRules, GameResult, Position, Rules};

// Crate-level exports - Stamping and capability tokens
pub use stamp::{SecretError, SigningSecret, Stamper};
pub use token::{CapabilityToken, Side, TokenIssuer};

// Crate-level exports - Game state
pub use state::{GameId, GameState};

// Crate-level exports - Links
pub use link::{ClaimedState, GameLink, LinkMinter, Successor, Successors};

// Crate-level exports - Authorization
pub use authorizer::{MoveAuthorizer, MoveOutcome, MoveRequest};

// Crate-level exports - Persistence
pub use db::{DbError, GameRecord, GameStore, NewGameRecord};

// Crate-level exports - Notifications
pub use notify::{LogNotifier, Notification, NotificationQueue, Notifier, NotifyError};

// Crate-level exports - HTTP server
pub use server::{
    AppState, CreateGameRequest, CreatedGame, GameView, LinkMoveSubmission, MoveAccepted,
    MoveSubmission, PlayView, SuccessorView, router,
};
