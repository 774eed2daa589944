//! Minting and parsing of tamper-evident game links.
//!
//! A stateless link is a frozen snapshot of a game plus its proof: the
//! full state travels in the URL path, stamped with the server secret.
//! A persisted link carries only a numeric record id.

use derive_getters::Getters;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ProtocolError;
use crate::rules::Rules;
use crate::stamp::{SigningSecret, Stamper};
use crate::state::GameState;

/// Escape everything outside the unreserved set; position notation
/// contains spaces and slashes.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path prefix of stateless links.
const PLAY_PREFIX: &str = "/play/";

/// A minted link: frozen snapshot plus its integrity stamp.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct GameLink {
    /// Full URL of the snapshot.
    url: String,
    /// Hex integrity stamp over the embedded fields.
    stamp: String,
}

/// Fields claimed by an inbound stateless link, exactly as transported.
///
/// Nothing here is trusted; the authorizer recomputes the stamp over
/// these raw strings before any of them is believed.
#[derive(Debug, Clone, Getters)]
pub struct ClaimedState {
    /// Claimed game identity.
    id: String,
    /// Claimed move count, still stringified.
    move_count: String,
    /// Claimed white identity.
    white: String,
    /// Claimed black identity.
    black: String,
    /// Claimed integrity stamp.
    stamp: String,
    /// Claimed position notation.
    position: String,
}

impl ClaimedState {
    /// Assembles a claim from already-unescaped path segments, in link
    /// field order.
    pub fn from_segments(
        id: String,
        move_count: String,
        white: String,
        black: String,
        stamp: String,
        position: String,
    ) -> Self {
        Self {
            id,
            move_count,
            white,
            black,
            stamp,
            position,
        }
    }
}

/// One successor of a position: the move, the state it produces, and
/// its freshly minted link.
#[derive(Debug, Clone, Getters)]
pub struct Successor {
    /// Move in canonical notation.
    notation: String,
    /// State after the move.
    state: GameState,
    /// Link to the successor state.
    link: GameLink,
}

/// Every successor link of a state, in enumeration order.
#[derive(Debug, Clone, Getters)]
pub struct Successors {
    /// Per-move successors, lexicographic by move notation.
    moves: Vec<Successor>,
    /// Whether a draw-claim pseudo-move is currently available.
    draw_claimable: bool,
}

/// Mints stateless links and enumerates successor links.
#[derive(Debug, Clone)]
pub struct LinkMinter {
    stamper: Stamper,
    base_url: String,
}

impl LinkMinter {
    /// Domain label separating state stamps from capability tokens.
    const DOMAIN: &'static str = "state";

    /// Creates a minter for the given public base URL.
    pub fn new(secret: SigningSecret, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            stamper: Stamper::new(secret, Self::DOMAIN),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Stamp field tuple for a state: identity, move count, identities,
    /// position, in fixed documented order.
    fn stamp_fields<'a>(
        id: &'a str,
        move_count: &'a str,
        white: &'a str,
        black: &'a str,
        position: &'a str,
    ) -> [&'a str; 5] {
        [id, move_count, white, black, position]
    }

    /// Mints the link for a state.
    #[instrument(skip(self, state), fields(id = %state.id(), move_count = state.move_count()))]
    pub fn mint(&self, state: &GameState) -> GameLink {
        let move_count = state.move_count().to_string();
        let stamp = self.stamper.stamp(&Self::stamp_fields(
            state.id().as_str(),
            &move_count,
            state.white(),
            state.black(),
            state.position().as_str(),
        ));
        let url = format!(
            "{}{}{}/{}/{}/{}/{}/{}",
            self.base_url,
            PLAY_PREFIX,
            utf8_percent_encode(state.id().as_str(), SEGMENT),
            utf8_percent_encode(&move_count, SEGMENT),
            utf8_percent_encode(state.white(), SEGMENT),
            utf8_percent_encode(state.black(), SEGMENT),
            utf8_percent_encode(&stamp, SEGMENT),
            utf8_percent_encode(state.position().as_str(), SEGMENT),
        );
        debug!(url = %url, "Minted stateless link");
        GameLink { url, stamp }
    }

    /// The URL of a persisted game record.
    pub fn record_url(&self, record_id: i32) -> String {
        format!("{}/games/{}", self.base_url, record_id)
    }

    /// Recomputes the expected stamp over a claim's raw fields and
    /// compares it, in constant time, against the claimed one.
    pub(crate) fn verify_claim(&self, claim: &ClaimedState) -> bool {
        self.stamper.verify(
            claim.stamp(),
            &Self::stamp_fields(
                claim.id(),
                claim.move_count(),
                claim.white(),
                claim.black(),
                claim.position(),
            ),
        )
    }

    /// Parses a stateless link URL back into its claimed fields.
    ///
    /// Purely structural: unescapes and splits, verifies nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPosition`] when the URL does not
    /// have the link shape.
    #[instrument(skip(self, url))]
    pub fn parse_url(&self, url: &str) -> Result<ClaimedState, ProtocolError> {
        let rest = url
            .split_once(PLAY_PREFIX)
            .map(|(_, rest)| rest)
            .ok_or(ProtocolError::MalformedPosition)?;
        let segments: Vec<&str> = rest.split('/').collect();
        let [id, move_count, white, black, stamp, position] = segments.as_slice() else {
            return Err(ProtocolError::MalformedPosition);
        };
        let unescape = |segment: &str| -> Result<String, ProtocolError> {
            percent_decode_str(segment)
                .decode_utf8()
                .map(|s| s.into_owned())
                .map_err(|_| ProtocolError::MalformedPosition)
        };
        Ok(ClaimedState {
            id: unescape(id)?,
            move_count: unescape(move_count)?,
            white: unescape(white)?,
            black: unescape(black)?,
            stamp: unescape(stamp)?,
            position: unescape(position)?,
        })
    }

    /// Enumerates the successor links of a state: one per legal move, in
    /// the engine's fixed order, plus whether a draw claim is available.
    ///
    /// Enumeration is a preview and commits nothing.
    ///
    /// # Errors
    ///
    /// Propagates rules-engine failures.
    #[instrument(skip(self, rules, state), fields(id = %state.id()))]
    pub fn enumerate(
        &self,
        rules: &dyn Rules,
        state: &GameState,
    ) -> Result<Successors, ProtocolError> {
        let mut moves = Vec::new();
        if *state.active() {
            for notation in rules.legal_moves(state.position())? {
                let position = rules.apply(state.position(), &notation)?;
                let active = rules
                    .outcome(&position, *state.draw_claimed())?
                    .is_none();
                let next = state.advanced(position, active, *state.draw_claimed());
                let link = self.mint(&next);
                moves.push(Successor {
                    notation,
                    state: next,
                    link,
                });
            }
        }
        let draw_claimable = *state.active() && rules.can_claim_draw(state.position())?;
        debug!(
            count = moves.len(),
            draw_claimable, "Enumerated successor links"
        );
        Ok(Successors {
            moves,
            draw_claimable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ChessRules, Position};
    use crate::state::{GameId, GameState};

    fn minter() -> LinkMinter {
        let secret = SigningSecret::new(*b"0123456789abcdef0123456789abcdef").unwrap();
        LinkMinter::new(secret, "http://localhost:3000/")
    }

    fn start_state() -> GameState {
        GameState::initial(
            GameId::fresh(),
            ChessRules::new().initial(),
            "alice@example.com".to_string(),
            "bob/with slashes%".to_string(),
        )
    }

    #[test]
    fn minted_links_parse_back_to_the_same_fields() {
        let minter = minter();
        let state = start_state();
        let link = minter.mint(&state);

        let claim = minter.parse_url(link.url()).unwrap();
        assert_eq!(claim.id(), state.id().as_str());
        assert_eq!(claim.move_count(), "0");
        assert_eq!(claim.white(), state.white());
        assert_eq!(claim.black(), state.black());
        assert_eq!(claim.stamp(), link.stamp());
        assert_eq!(claim.position(), state.position().as_str());
        assert!(minter.verify_claim(&claim));
    }

    #[test]
    fn altered_claims_fail_verification() {
        let minter = minter();
        let link = minter.mint(&start_state());
        let claim = minter.parse_url(link.url()).unwrap();

        let tampered = ClaimedState {
            move_count: "7".to_string(),
            ..claim.clone()
        };
        assert!(!minter.verify_claim(&tampered));
    }

    #[test]
    fn link_urls_never_contain_raw_reserved_characters() {
        let minter = minter();
        let link = minter.mint(&start_state());
        let path = link.url().strip_prefix("http://localhost:3000/play/").unwrap();
        assert!(!path.contains(' '));
        assert_eq!(path.matches('/').count(), 5);
    }

    #[test]
    fn short_or_foreign_urls_are_rejected() {
        let minter = minter();
        assert!(minter.parse_url("http://localhost:3000/games/7").is_err());
        assert!(minter.parse_url("http://localhost:3000/play/a/b").is_err());
    }

    #[test]
    fn enumeration_is_ordered_and_reproducible() {
        let minter = minter();
        let rules = ChessRules::new();
        let state = start_state();

        let first = minter.enumerate(&rules, &state).unwrap();
        let second = minter.enumerate(&rules, &state).unwrap();

        assert_eq!(first.moves().len(), 20);
        assert!(!first.draw_claimable());
        let notations: Vec<_> = first.moves().iter().map(|s| s.notation().clone()).collect();
        let mut sorted = notations.clone();
        sorted.sort_unstable();
        assert_eq!(notations, sorted);
        assert_eq!(
            notations,
            second
                .moves()
                .iter()
                .map(|s| s.notation().clone())
                .collect::<Vec<_>>()
        );
        for successor in first.moves() {
            assert_eq!(*successor.state().move_count(), 1);
            assert!(successor.state().active());
        }
    }

    #[test]
    fn terminal_states_enumerate_nothing() {
        let minter = minter();
        let rules = ChessRules::new();
        let state = start_state();
        let over = GameState::from_parts(
            state.id().clone(),
            Position::from_canonical(state.position().as_str().to_string()),
            4,
            false,
            false,
            state.white().clone(),
            state.black().clone(),
        );
        let successors = minter.enumerate(&rules, &over).unwrap();
        assert!(successors.moves().is_empty());
        assert!(!successors.draw_claimable());
    }
}
