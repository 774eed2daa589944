//! Game identity and the authoritative per-game state value.

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

use crate::error::ProtocolError;
use crate::rules::Position;

/// Opaque, high-entropy identifier for one game instance.
///
/// 128 random bits rendered as 32 lowercase hex characters. Generated
/// once at game creation, never reused, not guessable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Generates a fresh random identity.
    #[instrument]
    pub fn fresh() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GameId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(ProtocolError::NotFound)
        }
    }
}

/// Complete state of one game.
///
/// Invariants, maintained by the move authorizer:
/// - `active` is false exactly when the rules engine reports the
///   position as over under `draw_claimed`;
/// - `move_count` increases by exactly 1 per accepted move and never on
///   a rejected request;
/// - the side to move is always derivable from `position`.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct GameState {
    /// Opaque game identity.
    id: GameId,
    /// Current position in canonical notation.
    position: Position,
    /// Accepted transitions so far.
    move_count: u32,
    /// Whether the game still accepts transitions.
    active: bool,
    /// Whether a draw has been claimed.
    draw_claimed: bool,
    /// Identity of the white player.
    white: String,
    /// Identity of the black player.
    black: String,
}

impl GameState {
    /// Creates the state of a freshly started game.
    #[instrument(skip(position), fields(id = %id))]
    pub fn initial(id: GameId, position: Position, white: String, black: String) -> Self {
        Self {
            id,
            position,
            move_count: 0,
            active: true,
            draw_claimed: false,
            white,
            black,
        }
    }

    /// Reassembles a state from claimed or stored fields.
    ///
    /// No validation happens here; callers verify the integrity stamp
    /// (stateless mode) or trust the record store (persisted mode).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: GameId,
        position: Position,
        move_count: u32,
        active: bool,
        draw_claimed: bool,
        white: String,
        black: String,
    ) -> Self {
        Self {
            id,
            position,
            move_count,
            active,
            draw_claimed,
            white,
            black,
        }
    }

    /// Produces the successor state after an accepted transition.
    pub(crate) fn advanced(&self, position: Position, active: bool, draw_claimed: bool) -> Self {
        Self {
            id: self.id.clone(),
            position,
            move_count: self.move_count + 1,
            active,
            draw_claimed,
            white: self.white.clone(),
            black: self.black.clone(),
        }
    }
}
