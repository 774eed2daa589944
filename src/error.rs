//! Protocol error taxonomy for the move-authorization path.

use derive_more::{Display, Error, From};

use crate::db::DbError;

/// Terminating condition of a move-authorization request.
///
/// Every rejection the authorizer can produce is one of these variants;
/// none are retried internally except [`ProtocolError::ConcurrencyConflict`],
/// which callers may retry from a fresh load.
#[derive(Debug, Clone, Display, Error, From)]
pub enum ProtocolError {
    /// The position notation does not match the canonical grammar.
    #[display("Malformed position notation")]
    MalformedPosition,

    /// Stamp verification failed: the link was altered, or signed with a
    /// rotated secret.
    #[display("Link integrity stamp did not verify")]
    TamperedLink,

    /// Unknown game record.
    #[display("Game not found")]
    NotFound,

    /// The requested move is not in the legal set for the current position.
    #[display("Move is not legal in the current position")]
    IllegalMove,

    /// Mutation attempted against a terminated game.
    #[display("Game is already over")]
    GameOver,

    /// No capability token was supplied with the request.
    #[display("Capability token missing")]
    MissingToken,

    /// The supplied capability token does not authorize the side to move.
    #[display("Capability token not valid for this side")]
    UnauthorizedToken,

    /// Draw claim attempted while the position does not qualify.
    #[display("Draw is not claimable in the current position")]
    DrawNotClaimable,

    /// A concurrent writer committed against the same record first.
    #[display("Concurrent transition committed first, reload and retry")]
    ConcurrencyConflict,

    /// The rules engine rejected an operation it should support.
    #[display("Rules engine failure: {_0}")]
    #[from(ignore)]
    Engine(#[error(not(source))] String),

    /// Record store failure unrelated to the concurrency contract.
    #[display("Storage failure: {_0}")]
    Storage(DbError),
}

impl ProtocolError {
    /// Whether an unauthenticated observer may learn which part of a
    /// forged link was wrong. Tampered stamps, unknown records, and
    /// off-board moves are deliberately indistinguishable.
    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self,
            Self::TamperedLink | Self::NotFound | Self::IllegalMove
        )
    }
}
