//! Capability tokens proving the right to act as a side.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use tracing::{info, instrument};

use crate::stamp::{SigningSecret, Stamper};
use crate::state::GameId;

/// A side in a game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// White, moves first.
    White,
    /// Black, moves second.
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

/// Proof of the right to submit moves as one side of one game.
///
/// Orthogonal to the integrity stamp: the stamp protects the state, the
/// token protects authorship. Tokens travel out-of-band and never
/// appear in links.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Issues and checks capability tokens.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    stamper: Stamper,
}

impl TokenIssuer {
    /// Domain label separating tokens from state stamps.
    const DOMAIN: &'static str = "capability";

    /// Creates an issuer keyed with the server secret.
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            stamper: Stamper::new(secret, Self::DOMAIN),
        }
    }

    /// Mints the token for a side of a game.
    #[instrument(skip(self), fields(game = %game, side = %side))]
    pub fn issue(&self, game: &GameId, side: Side) -> CapabilityToken {
        info!("Issuing capability token");
        CapabilityToken(self.stamper.stamp(&[game.as_str(), &side.to_string()]))
    }

    /// Checks a supplied token against the expected one, in constant time.
    #[instrument(skip(self, supplied), fields(game = %game, side = %side))]
    pub fn authorize(&self, game: &GameId, side: Side, supplied: &str) -> bool {
        self.stamper
            .verify(supplied, &[game.as_str(), &side.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SigningSecret::new(*b"an-adequately-long-secret-key!!!").unwrap())
    }

    #[test]
    fn issued_tokens_authorize_their_side_only() {
        let issuer = issuer();
        let game = GameId::fresh();
        let white = issuer.issue(&game, Side::White);
        assert!(issuer.authorize(&game, Side::White, white.as_str()));
        assert!(!issuer.authorize(&game, Side::Black, white.as_str()));
    }

    #[test]
    fn tokens_are_bound_to_the_game() {
        let issuer = issuer();
        let token = issuer.issue(&GameId::fresh(), Side::White);
        assert!(!issuer.authorize(&GameId::fresh(), Side::White, token.as_str()));
    }

    #[test]
    fn side_notation_round_trips() {
        assert_eq!(Side::White.to_string(), "white");
        assert_eq!("black".parse::<Side>().unwrap(), Side::Black);
        assert_eq!(Side::White.opponent(), Side::Black);
    }
}
