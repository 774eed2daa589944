//! Move authorization state machine.
//!
//! One transition contract, two backing strategies: stateless requests
//! prove their claimed state with an integrity stamp, persisted
//! requests resolve it from the record store. Steps shared by both
//! modes live in [`MoveAuthorizer::transition`].

use derive_getters::Getters;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::ServerConfig;
use crate::db::{GameRecord, GameStore};
use crate::error::ProtocolError;
use crate::link::{ClaimedState, GameLink, LinkMinter, Successors};
use crate::notify::{Notification, NotificationQueue};
use crate::rules::{GameResult, Rules};
use crate::state::{GameId, GameState};
use crate::token::{CapabilityToken, Side, TokenIssuer};

/// A requested mutation: a move in canonical notation, or a draw claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRequest {
    /// Play the move with this notation.
    Move(String),
    /// Claim the currently available draw.
    ClaimDraw,
}

/// Result of an accepted transition.
#[derive(Debug, Clone, Getters)]
pub struct MoveOutcome {
    /// The authoritative successor state.
    state: GameState,
    /// Freshly minted link to the successor (stateless mode).
    link: Option<GameLink>,
    /// Final result, present exactly when this transition ended the game.
    result: Option<GameResult>,
}

/// Authorizes and applies game transitions.
pub struct MoveAuthorizer {
    rules: Arc<dyn Rules>,
    tokens: TokenIssuer,
    links: LinkMinter,
    notifications: NotificationQueue,
}

impl MoveAuthorizer {
    /// Wires the authorizer from explicit configuration.
    pub fn new(
        config: &ServerConfig,
        rules: Arc<dyn Rules>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            rules,
            tokens: TokenIssuer::new(config.secret().clone()),
            links: LinkMinter::new(config.secret().clone(), config.base_url().clone()),
            notifications,
        }
    }

    /// The link minter, for read-only enumeration by handlers.
    pub fn links(&self) -> &LinkMinter {
        &self.links
    }

    /// Enumerates successor links of a resolved state.
    ///
    /// # Errors
    ///
    /// Propagates rules-engine failures.
    pub fn successors(&self, state: &GameState) -> Result<Successors, ProtocolError> {
        self.links.enumerate(self.rules.as_ref(), state)
    }

    /// Legal move notations plus draw-claim availability, without
    /// minting links. Terminal states offer nothing.
    ///
    /// # Errors
    ///
    /// Propagates rules-engine failures.
    pub fn available_moves(
        &self,
        state: &GameState,
    ) -> Result<(Vec<String>, bool), ProtocolError> {
        if !state.active() {
            return Ok((Vec::new(), false));
        }
        Ok((
            self.rules.legal_moves(state.position())?,
            self.rules.can_claim_draw(state.position())?,
        ))
    }

    /// Reports the result of a resolved state, `None` while it runs.
    ///
    /// # Errors
    ///
    /// Propagates rules-engine failures.
    pub fn result(&self, state: &GameState) -> Result<Option<GameResult>, ProtocolError> {
        self.rules.outcome(state.position(), *state.draw_claimed())
    }

    /// Starts a stateless game: initial state, its link, white's token.
    ///
    /// White is notified with the link and token; black's token is not
    /// issued until white's first move is accepted.
    #[instrument(skip(self), fields(white = %white, black = %black))]
    pub fn create_stateless(
        &self,
        white: String,
        black: String,
    ) -> (GameState, GameLink, CapabilityToken) {
        let state = GameState::initial(GameId::fresh(), self.rules.initial(), white, black);
        let link = self.links.mint(&state);
        let token = self.tokens.issue(state.id(), Side::White);
        info!(game = %state.id(), "Stateless game created");
        self.notifications.enqueue(Notification::new(
            state.white().clone(),
            format!("Game {} started, your move", state.id()),
            format!(
                "You play white against {}.\nBoard: {}\nYour capability token: {}",
                state.black(),
                link.url(),
                token
            ),
        ));
        (state, link, token)
    }

    /// Starts a persisted game: stored record plus white's token.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Storage`] on database failure.
    #[instrument(skip(self, store), fields(white = %white, black = %black))]
    pub fn create_persisted(
        &self,
        store: &GameStore,
        white: String,
        black: String,
    ) -> Result<(GameRecord, CapabilityToken), ProtocolError> {
        let state = GameState::initial(GameId::fresh(), self.rules.initial(), white, black);
        let record = store.create(&state).map_err(ProtocolError::Storage)?;
        let token = self.tokens.issue(state.id(), Side::White);
        info!(game = %state.id(), record_id = record.id(), "Persisted game created");
        self.notifications.enqueue(Notification::new(
            state.white().clone(),
            format!("Game {} started, your move", state.id()),
            format!(
                "You play white against {}.\nBoard: {}\nYour capability token: {}",
                state.black(),
                self.links.record_url(*record.id()),
                token
            ),
        ));
        Ok((record, token))
    }

    /// Resolves a claimed stateless link into a trusted state.
    ///
    /// Decodes the position, recomputes the stamp over the claimed
    /// fields, and reconstructs the state. `active` is re-derived from
    /// the position; the link grammar carries no draw-claim flag, so an
    /// accepted claim terminates only through the submission response.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedPosition`] for notation outside the
    /// canonical grammar, [`ProtocolError::TamperedLink`] when the stamp
    /// does not verify.
    #[instrument(skip(self, claim))]
    pub fn resolve_stateless(&self, claim: &ClaimedState) -> Result<GameState, ProtocolError> {
        let position = self.rules.parse(claim.position())?;
        if !self.links.verify_claim(claim) {
            warn!("Stamp verification failed for claimed link");
            return Err(ProtocolError::TamperedLink);
        }
        // Stamp verified: these fields were minted by us, so parse
        // failures below only happen for forgeries that somehow kept a
        // valid stamp. Fail closed the same way.
        let id: GameId = claim.id().parse().map_err(|_| ProtocolError::TamperedLink)?;
        let move_count: u32 = claim
            .move_count()
            .parse()
            .map_err(|_| ProtocolError::TamperedLink)?;
        let active = self.rules.outcome(&position, false)?.is_none();
        Ok(GameState::from_parts(
            id,
            position,
            move_count,
            active,
            false,
            claim.white().clone(),
            claim.black().clone(),
        ))
    }

    /// Submits a move or draw claim against a stateless link.
    ///
    /// # Errors
    ///
    /// Any rejection from resolution or [`MoveAuthorizer::transition`].
    #[instrument(skip_all)]
    pub fn submit_stateless(
        &self,
        claim: &ClaimedState,
        token: Option<&str>,
        request: &MoveRequest,
    ) -> Result<MoveOutcome, ProtocolError> {
        let current = self.resolve_stateless(claim)?;
        let next = self.transition(&current, token, request)?;
        let link = self.links.mint(&next);
        let result = self.result(&next)?;
        self.post_accept(&next, link.url(), result);
        Ok(MoveOutcome {
            state: next,
            link: Some(link),
            result,
        })
    }

    /// Submits a move or draw claim against a persisted record.
    ///
    /// The token check and transition run inside the store's atomic
    /// read-modify-write; a concurrent winner surfaces as
    /// [`ProtocolError::ConcurrencyConflict`], never retried here.
    ///
    /// # Errors
    ///
    /// Any rejection from the store or [`MoveAuthorizer::transition`].
    #[instrument(skip(self, store, token, request))]
    pub fn submit_persisted(
        &self,
        store: &GameStore,
        record_id: i32,
        token: Option<&str>,
        request: &MoveRequest,
    ) -> Result<MoveOutcome, ProtocolError> {
        let committed =
            store.apply_transition(record_id, |state| self.transition(state, token, request))?;
        let next = committed.to_state()?;
        let result = self.result(&next)?;
        self.post_accept(&next, &self.links.record_url(record_id), result);
        Ok(MoveOutcome {
            state: next,
            link: None,
            result,
        })
    }

    /// The shared transition: checks and applies one request against a
    /// resolved current state.
    ///
    /// Order of rejection: terminated game, missing token, unauthorized
    /// token, then the request itself.
    ///
    /// # Errors
    ///
    /// One of [`ProtocolError::GameOver`], [`ProtocolError::MissingToken`],
    /// [`ProtocolError::UnauthorizedToken`], [`ProtocolError::IllegalMove`],
    /// [`ProtocolError::DrawNotClaimable`], or a rules-engine failure.
    fn transition(
        &self,
        state: &GameState,
        token: Option<&str>,
        request: &MoveRequest,
    ) -> Result<GameState, ProtocolError> {
        if !state.active() {
            return Err(ProtocolError::GameOver);
        }

        let side = self.rules.side_to_move(state.position())?;
        let token = token.ok_or(ProtocolError::MissingToken)?;
        if !self.tokens.authorize(state.id(), side, token) {
            warn!(game = %state.id(), side = %side, "Capability token rejected");
            return Err(ProtocolError::UnauthorizedToken);
        }

        let (position, draw_claimed) = match request {
            MoveRequest::Move(notation) => {
                let legal = self.rules.legal_moves(state.position())?;
                if !legal.iter().any(|m| m == notation) {
                    return Err(ProtocolError::IllegalMove);
                }
                (
                    self.rules.apply(state.position(), notation)?,
                    *state.draw_claimed(),
                )
            }
            MoveRequest::ClaimDraw => {
                if !self.rules.can_claim_draw(state.position())? {
                    return Err(ProtocolError::DrawNotClaimable);
                }
                (state.position().clone(), true)
            }
        };

        let active = self.rules.outcome(&position, draw_claimed)?.is_none();
        let next = state.advanced(position, active, draw_claimed);
        info!(
            game = %next.id(),
            move_count = next.move_count(),
            active = next.active(),
            "Transition accepted"
        );
        Ok(next)
    }

    /// Post-commit notifications: black's token after the first accepted
    /// move, the result to both parties on the terminal transition.
    /// Fire-and-forget; never awaited, never rolled back.
    fn post_accept(&self, state: &GameState, url: &str, result: Option<GameResult>) {
        if *state.move_count() == 1 {
            let token = self.tokens.issue(state.id(), Side::Black);
            self.notifications.enqueue(Notification::new(
                state.black().clone(),
                format!("Game {}: white has moved, your turn", state.id()),
                format!(
                    "You play black against {}.\nBoard: {}\nYour capability token: {}",
                    state.white(),
                    url,
                    token
                ),
            ));
        }
        if let Some(result) = result {
            for party in [state.white(), state.black()] {
                self.notifications.enqueue(Notification::new(
                    party.clone(),
                    format!("Game {} is over", state.id()),
                    format!("Final result: {}\nFinal board: {}", result, url),
                ));
            }
        }
    }
}
