use std::time::Duration;

use santa_core::{DrawTicket, RandomSource, SessionError, SessionEvent};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{to_view, ApiError, AppState};

#[derive(Debug, Clone, Copy, Default)]
pub struct DrawSettings {
    /// Pause before the result lands. Purely for show.
    pub delay: Duration,
    pub source: RandomSource,
    /// Lets `?seed=` replace `source` for a single draw.
    pub allow_seed_override: bool,
}

impl DrawSettings {
    /// The source for one draw. A requested seed is honoured only when seeding
    /// is already the configured policy or overrides are switched on.
    pub fn source_for(&self, seed: Option<u64>) -> Result<RandomSource, ApiError> {
        match seed {
            None => Ok(self.source),
            Some(seed) if self.allow_seed_override
                || matches!(self.source, RandomSource::Seeded(_)) => {
                Ok(RandomSource::Seeded(seed))
            }
            Some(_) => Err(ApiError::SeedNotAllowed),
        }
    }
}

/// Runs one draw off the request path and reports back through the session's
/// broadcast channel. Exactly one of `draw_completed` or `draw_failed` is sent.
pub(crate) fn spawn_draw(
    state: AppState,
    session_id: String,
    ticket: DrawTicket,
    source: RandomSource,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let delay = state.draw.delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let drawn = source.draw(&ticket.participants);

        let mut sessions = state.sessions.write().await;
        let Some(session) = sessions.get_mut(&session_id) else {
            warn!(%session_id, "session vanished before draw completed");
            return;
        };

        let outcome = drawn
            .map_err(SessionError::from)
            .and_then(|set| session.complete_draw(ticket.id, set));
        let event = match outcome {
            Ok(()) => {
                info!(
                    %session_id,
                    ticket = ticket.id,
                    participants = ticket.participants.len(),
                    %source,
                    "draw completed"
                );
                SessionEvent::DrawCompleted { ticket: ticket.id }
            }
            Err(err) => {
                warn!(%session_id, ticket = ticket.id, %err, "draw failed");
                if session.fail_draw(ticket.id).is_err() {
                    return;
                }
                SessionEvent::DrawFailed { ticket: ticket.id }
            }
        };

        let view = to_view(&session_id, session);
        drop(sessions);
        state.broadcast(&session_id, view, vec![event]).await;
        state.persist().await;
    })
}
