//! Contract for the external move-legality engine.
//!
//! The protocol core never implements chess rules. It consumes this
//! trait for legality, application, termination, and canonical
//! notation, and treats positions as opaque notation strings.

mod engine;

pub use engine::ChessRules;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::token::Side;

/// A board position in the engine's canonical notation.
///
/// Equality is equality of the notation string; the core never looks
/// inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    /// Wraps a string already known to be canonical notation.
    ///
    /// Use [`Rules::parse`] for untrusted input.
    pub fn from_canonical(notation: String) -> Self {
        Self(notation)
    }

    /// Returns the canonical notation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Final result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum GameResult {
    /// White won.
    #[display("1-0")]
    #[serde(rename = "1-0")]
    WhiteWins,
    /// Black won.
    #[display("0-1")]
    #[serde(rename = "0-1")]
    BlackWins,
    /// Drawn, by rule or by accepted claim.
    #[display("1/2-1/2")]
    #[serde(rename = "1/2-1/2")]
    Draw,
}

/// External rules-engine contract consumed by the protocol core.
///
/// Implementations must be deterministic: two calls with the same
/// position always produce the same answers, and [`Rules::legal_moves`]
/// returns moves in a fixed lexicographic order by notation.
pub trait Rules: Send + Sync {
    /// The standard starting position.
    fn initial(&self) -> Position;

    /// Parses untrusted notation, returning the canonicalized position.
    ///
    /// Checks syntactic well-formedness against the canonical grammar
    /// only; it does not judge whether the position is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] on any string not
    /// matching the grammar.
    fn parse(&self, notation: &str) -> Result<Position, ProtocolError>;

    /// Which side the position says is to move.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] if the position does
    /// not parse.
    fn side_to_move(&self, position: &Position) -> Result<Side, ProtocolError>;

    /// Legal moves from the position, sorted lexicographically by their
    /// canonical notation.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] if the position does
    /// not parse.
    fn legal_moves(&self, position: &Position) -> Result<Vec<String>, ProtocolError>;

    /// Applies a legal move, producing the successor position.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::IllegalMove`] if the move is not in the
    /// legal set.
    fn apply(&self, position: &Position, notation: &str) -> Result<Position, ProtocolError>;

    /// Reports the result if the game is over, `None` while it runs.
    ///
    /// A claimed draw terminates any position that has not already been
    /// decided.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] if the position does
    /// not parse.
    fn outcome(
        &self,
        position: &Position,
        draw_claimed: bool,
    ) -> Result<Option<GameResult>, ProtocolError>;

    /// Whether a draw claim is currently available.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] if the position does
    /// not parse.
    fn can_claim_draw(&self, position: &Position) -> Result<bool, ProtocolError>;
}
