use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assignment::{Assignment, AssignmentSet};
use crate::error::{SessionError, ValidationError};
use crate::generator::RandomSource;
use crate::participant::{Participant, ParticipantId, Roster};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    Setup,
    Generating,
    Listing,
    Revealed,
}

impl RevealState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevealState::Setup => "setup",
            RevealState::Generating => "generating",
            RevealState::Listing => "listing",
            RevealState::Revealed => "revealed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
enum Stage {
    Setup,
    Generating {
        ticket: u64,
    },
    Listing {
        assignments: AssignmentSet,
    },
    Revealed {
        assignments: AssignmentSet,
        giver: ParticipantId,
    },
}

/// The frozen roster handed to whoever runs the draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawTicket {
    pub id: u64,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Action {
    AddParticipant { name: String },
    RemoveParticipant { id: ParticipantId },
    ClearRoster,
    Generate,
    Select { giver: ParticipantId },
    Toggle { giver: ParticipantId },
    Dismiss,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    ParticipantAdded { participant: Participant },
    ParticipantRemoved { id: ParticipantId },
    RosterCleared,
    DrawStarted { ticket: u64 },
    DrawCompleted { ticket: u64 },
    DrawFailed { ticket: u64 },
    Revealed { giver: ParticipantId },
    Dismissed,
    Reset,
}

/// One round of a gift exchange: the roster being edited, or the drawn
/// assignments and which of them (if any) is on screen.
///
/// The roster can only change in `Setup`. From the moment a draw starts until
/// `reset`, the participants of that round are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    roster: Roster,
    stage: Stage,
    draws: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            roster: Roster::new(),
            stage: Stage::Setup,
            draws: 0,
        }
    }

    /// Opens an already drawn set, e.g. from a share link or a stored room.
    pub fn from_assignments(assignments: AssignmentSet) -> Self {
        Self {
            roster: Roster::new(),
            stage: Stage::Listing { assignments },
            draws: 0,
        }
    }

    pub fn state(&self) -> RevealState {
        match self.stage {
            Stage::Setup => RevealState::Setup,
            Stage::Generating { .. } => RevealState::Generating,
            Stage::Listing { .. } => RevealState::Listing,
            Stage::Revealed { .. } => RevealState::Revealed,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn assignments(&self) -> Option<&AssignmentSet> {
        match &self.stage {
            Stage::Listing { assignments } | Stage::Revealed { assignments, .. } => {
                Some(assignments)
            }
            _ => None,
        }
    }

    /// Givers that can be picked, in display order. Receivers stay hidden.
    pub fn listing(&self) -> Vec<&Participant> {
        self.assignments()
            .map(|set| set.givers().collect())
            .unwrap_or_default()
    }

    pub fn revealed(&self) -> Option<&Assignment> {
        match &self.stage {
            Stage::Revealed { assignments, giver } => assignments.find(*giver),
            _ => None,
        }
    }

    pub fn pending_draw(&self) -> Option<DrawTicket> {
        match self.stage {
            Stage::Generating { ticket } => Some(DrawTicket {
                id: ticket,
                participants: self.roster.participants().to_vec(),
            }),
            _ => None,
        }
    }

    pub fn add_participant(&mut self, name: &str) -> Result<Participant, SessionError> {
        self.ensure_setup("add_participant")?;
        Ok(self.roster.add(name)?)
    }

    pub fn remove_participant(
        &mut self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, SessionError> {
        self.ensure_setup("remove_participant")?;
        Ok(self.roster.remove(id))
    }

    pub fn clear_roster(&mut self) -> Result<(), SessionError> {
        self.ensure_setup("clear_roster")?;
        self.roster.clear();
        Ok(())
    }

    /// Freezes the roster and moves to `Generating`. The returned ticket must be
    /// passed back to [`Session::complete_draw`] or [`Session::fail_draw`].
    pub fn begin_draw(&mut self) -> Result<DrawTicket, SessionError> {
        self.ensure_setup("generate")?;
        if self.roster.len() < 2 {
            return Err(ValidationError::TooFewParticipants {
                count: self.roster.len(),
            }
            .into());
        }

        self.draws += 1;
        self.stage = Stage::Generating { ticket: self.draws };
        Ok(DrawTicket {
            id: self.draws,
            participants: self.roster.participants().to_vec(),
        })
    }

    pub fn complete_draw(
        &mut self,
        ticket: u64,
        assignments: AssignmentSet,
    ) -> Result<(), SessionError> {
        self.ensure_ticket(ticket)?;

        let mut drawn: Vec<ParticipantId> = assignments.givers().map(|p| p.id).collect();
        let mut frozen: Vec<ParticipantId> =
            self.roster.participants().iter().map(|p| p.id).collect();
        drawn.sort();
        frozen.sort();
        if drawn != frozen {
            return Err(SessionError::RoundMismatch);
        }

        self.stage = Stage::Listing { assignments };
        Ok(())
    }

    /// Abandons a draw that could not produce a result; the roster is editable again.
    pub fn fail_draw(&mut self, ticket: u64) -> Result<(), SessionError> {
        self.ensure_ticket(ticket)?;
        self.stage = Stage::Setup;
        Ok(())
    }

    /// Runs a whole draw in place with `source`.
    pub fn draw_now(&mut self, source: &RandomSource) -> Result<(), SessionError> {
        let ticket = self.begin_draw()?;
        match source.draw(&ticket.participants) {
            Ok(set) => self.complete_draw(ticket.id, set),
            Err(err) => {
                self.fail_draw(ticket.id)?;
                Err(err.into())
            }
        }
    }

    pub fn select(&mut self, giver: ParticipantId) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let Stage::Listing { assignments } = &self.stage else {
            return Err(self.illegal("select"));
        };
        if assignments.find(giver).is_none() {
            return Err(SessionError::UnknownGiver(giver));
        }

        self.stage = match std::mem::replace(&mut self.stage, Stage::Setup) {
            Stage::Listing { assignments } => Stage::Revealed { assignments, giver },
            other => other,
        };
        Ok(())
    }

    pub fn dismiss(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if !matches!(self.stage, Stage::Revealed { .. }) {
            return Err(self.illegal("dismiss"));
        }

        self.stage = match std::mem::replace(&mut self.stage, Stage::Setup) {
            Stage::Revealed { assignments, .. } => Stage::Listing { assignments },
            other => other,
        };
        Ok(())
    }

    /// Click behaviour of a giver card: reveal it, or hide it again if it is
    /// the one showing. Returns whether the card is now revealed.
    pub fn toggle(&mut self, giver: ParticipantId) -> Result<bool, SessionError> {
        self.ensure_idle()?;
        let showing = match &self.stage {
            Stage::Listing { .. } => None,
            Stage::Revealed { giver: shown, .. } => Some(*shown),
            _ => return Err(self.illegal("toggle")),
        };
        match showing {
            None => self.select(giver).map(|_| true),
            Some(shown) if shown == giver => self.dismiss().map(|_| false),
            Some(_) => Err(self.illegal("toggle")),
        }
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if !matches!(self.stage, Stage::Listing { .. } | Stage::Revealed { .. }) {
            return Err(self.illegal("reset"));
        }
        self.roster.clear();
        self.stage = Stage::Setup;
        Ok(())
    }

    /// A session reloaded while a draw was pending has nobody left to finish
    /// it, so it goes back to `Setup` with the same roster.
    pub fn recover(&mut self) -> bool {
        if matches!(self.stage, Stage::Generating { .. }) {
            self.stage = Stage::Setup;
            return true;
        }
        false
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if matches!(self.stage, Stage::Generating { .. }) {
            return Err(SessionError::DrawInProgress);
        }
        Ok(())
    }

    fn ensure_setup(&self, action: &'static str) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if !matches!(self.stage, Stage::Setup) {
            return Err(self.illegal(action));
        }
        Ok(())
    }

    fn ensure_ticket(&self, ticket: u64) -> Result<(), SessionError> {
        match self.stage {
            Stage::Generating { ticket: pending } if pending == ticket => Ok(()),
            _ => Err(SessionError::StaleTicket(ticket)),
        }
    }

    fn illegal(&self, action: &'static str) -> SessionError {
        SessionError::IllegalTransition {
            action,
            state: self.state().as_str(),
        }
    }
}

/// Applies one user action atomically. On error the session is unchanged.
pub fn apply_action(
    session: &mut Session,
    action: Action,
) -> Result<Vec<SessionEvent>, SessionError> {
    let result = match action.clone() {
        Action::AddParticipant { name } => session
            .add_participant(&name)
            .map(|participant| vec![SessionEvent::ParticipantAdded { participant }]),
        Action::RemoveParticipant { id } => session.remove_participant(id).map(|removed| {
            removed
                .map(|p| vec![SessionEvent::ParticipantRemoved { id: p.id }])
                .unwrap_or_default()
        }),
        Action::ClearRoster => session
            .clear_roster()
            .map(|_| vec![SessionEvent::RosterCleared]),
        Action::Generate => session
            .begin_draw()
            .map(|ticket| vec![SessionEvent::DrawStarted { ticket: ticket.id }]),
        Action::Select { giver } => session
            .select(giver)
            .map(|_| vec![SessionEvent::Revealed { giver }]),
        Action::Toggle { giver } => session.toggle(giver).map(|revealed| {
            if revealed {
                vec![SessionEvent::Revealed { giver }]
            } else {
                vec![SessionEvent::Dismissed]
            }
        }),
        Action::Dismiss => session.dismiss().map(|_| vec![SessionEvent::Dismissed]),
        Action::Reset => session.reset().map(|_| vec![SessionEvent::Reset]),
    };

    if let Err(err) = &result {
        debug!(?action, %err, "action rejected");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(names: &[&str]) -> Session {
        let mut session = Session::new();
        for name in names {
            session.add_participant(name).unwrap();
        }
        session
    }

    fn listed(names: &[&str]) -> Session {
        let mut session = setup(names);
        session.draw_now(&RandomSource::Seeded(3)).unwrap();
        session
    }

    fn id_of(session: &Session, name: &str) -> ParticipantId {
        session
            .listing()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .unwrap()
    }

    #[test]
    fn generate_below_two_stays_in_setup() {
        let mut session = setup(&["Alice"]);
        let err = apply_action(&mut session, Action::Generate).unwrap_err();

        assert_eq!(
            err,
            SessionError::Validation(ValidationError::TooFewParticipants { count: 1 })
        );
        assert_eq!(session.state(), RevealState::Setup);
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn draw_lifecycle_through_ticket() {
        let mut session = setup(&["Alice", "Bob", "Carol"]);
        let events = apply_action(&mut session, Action::Generate).unwrap();
        assert_eq!(events, vec![SessionEvent::DrawStarted { ticket: 1 }]);
        assert_eq!(session.state(), RevealState::Generating);

        let ticket = session.pending_draw().unwrap();
        assert_eq!(ticket.participants.len(), 3);
        let set = RandomSource::Seeded(1).draw(&ticket.participants).unwrap();
        session.complete_draw(ticket.id, set.clone()).unwrap();

        assert_eq!(session.state(), RevealState::Listing);
        assert_eq!(session.assignments(), Some(&set));
        assert!(session.pending_draw().is_none());
    }

    #[test]
    fn actions_ignored_while_generating() {
        let mut session = setup(&["Alice", "Bob"]);
        session.begin_draw().unwrap();
        let before = session.clone();

        for action in [
            Action::AddParticipant { name: "Carol".into() },
            Action::RemoveParticipant { id: ParticipantId(1) },
            Action::ClearRoster,
            Action::Generate,
            Action::Select { giver: ParticipantId(1) },
            Action::Dismiss,
            Action::Reset,
        ] {
            assert_eq!(
                apply_action(&mut session, action).unwrap_err(),
                SessionError::DrawInProgress
            );
        }
        assert_eq!(session, before);
    }

    #[test]
    fn stale_or_mismatched_draw_rejected() {
        let mut session = setup(&["Alice", "Bob", "Carol"]);
        let ticket = session.begin_draw().unwrap();

        let other = vec![
            Participant { id: ParticipantId(10), name: "X".into() },
            Participant { id: ParticipantId(11), name: "Y".into() },
        ];
        let foreign = RandomSource::Seeded(1).draw(&other).unwrap();
        assert_eq!(
            session.complete_draw(ticket.id, foreign).unwrap_err(),
            SessionError::RoundMismatch
        );

        let set = RandomSource::Seeded(1).draw(&ticket.participants).unwrap();
        assert_eq!(
            session.complete_draw(ticket.id + 1, set).unwrap_err(),
            SessionError::StaleTicket(ticket.id + 1)
        );
        assert_eq!(session.state(), RevealState::Generating);
    }

    #[test]
    fn failed_draw_returns_to_setup_with_roster() {
        let mut session = setup(&["Alice", "Bob"]);
        let ticket = session.begin_draw().unwrap();
        session.fail_draw(ticket.id).unwrap();

        assert_eq!(session.state(), RevealState::Setup);
        assert_eq!(session.roster().len(), 2);
        assert!(session.add_participant("Carol").is_ok());
    }

    #[test]
    fn roster_frozen_after_draw() {
        let mut session = listed(&["Alice", "Bob"]);
        let err = session.add_participant("Carol").unwrap_err();
        assert_eq!(
            err,
            SessionError::IllegalTransition {
                action: "add_participant",
                state: "listing"
            }
        );
        assert!(session.remove_participant(ParticipantId(1)).is_err());
    }

    #[test]
    fn select_reveals_only_that_giver_and_dismiss_keeps_set() {
        let mut session = listed(&["Alice", "Bob", "Carol"]);
        let before = session.assignments().cloned().unwrap();
        let alice = id_of(&session, "Alice");

        let events = apply_action(&mut session, Action::Select { giver: alice }).unwrap();
        assert_eq!(events, vec![SessionEvent::Revealed { giver: alice }]);
        assert_eq!(session.state(), RevealState::Revealed);
        let shown = session.revealed().unwrap();
        assert_eq!(shown.giver.id, alice);
        assert_eq!(Some(&shown.receiver), before.receiver_for(alice));

        apply_action(&mut session, Action::Dismiss).unwrap();
        assert_eq!(session.state(), RevealState::Listing);
        assert!(session.revealed().is_none());
        assert_eq!(session.assignments(), Some(&before));
    }

    #[test]
    fn select_from_revealed_is_illegal() {
        let mut session = listed(&["Alice", "Bob", "Carol"]);
        let alice = id_of(&session, "Alice");
        let bob = id_of(&session, "Bob");
        session.select(alice).unwrap();

        assert!(matches!(
            session.select(bob),
            Err(SessionError::IllegalTransition { action: "select", .. })
        ));
        assert_eq!(session.revealed().unwrap().giver.id, alice);
    }

    #[test]
    fn select_unknown_giver() {
        let mut session = listed(&["Alice", "Bob"]);
        assert_eq!(
            session.select(ParticipantId(77)).unwrap_err(),
            SessionError::UnknownGiver(ParticipantId(77))
        );
        assert_eq!(session.state(), RevealState::Listing);
    }

    #[test]
    fn toggle_reveals_then_hides() {
        let mut session = listed(&["Alice", "Bob", "Carol"]);
        let bob = id_of(&session, "Bob");
        let carol = id_of(&session, "Carol");

        assert_eq!(session.toggle(bob), Ok(true));
        assert!(session.toggle(carol).is_err());
        assert_eq!(session.toggle(bob), Ok(false));
        assert_eq!(session.state(), RevealState::Listing);
    }

    #[test]
    fn reset_from_listing_or_revealed_clears_everything() {
        let mut session = listed(&["Alice", "Bob"]);
        session.reset().unwrap();
        assert_eq!(session.state(), RevealState::Setup);
        assert!(session.roster().is_empty());
        assert!(session.assignments().is_none());

        let mut session = listed(&["Alice", "Bob"]);
        let alice = id_of(&session, "Alice");
        session.select(alice).unwrap();
        let events = apply_action(&mut session, Action::Reset).unwrap();
        assert_eq!(events, vec![SessionEvent::Reset]);
        assert!(session.roster().is_empty());
    }

    #[test]
    fn reset_and_dismiss_illegal_in_setup() {
        let mut session = setup(&["Alice"]);
        assert!(matches!(
            session.reset(),
            Err(SessionError::IllegalTransition { action: "reset", state: "setup" })
        ));
        assert!(session.dismiss().is_err());
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn remove_missing_emits_nothing() {
        let mut session = setup(&["Alice"]);
        let events =
            apply_action(&mut session, Action::RemoveParticipant { id: ParticipantId(5) }).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn recover_unsticks_pending_draw() {
        let mut session = setup(&["Alice", "Bob"]);
        session.begin_draw().unwrap();
        let json = serde_json::to_string(&session).unwrap();

        let mut restored: Session = serde_json::from_str(&json).unwrap();
        assert!(restored.recover());
        assert_eq!(restored.state(), RevealState::Setup);
        assert_eq!(restored.roster().len(), 2);
        assert!(!restored.recover());
    }

    #[test]
    fn four_person_round_end_to_end() {
        let mut session = Session::new();
        for name in ["Alice", "Bob", "Carol", "Dave"] {
            apply_action(&mut session, Action::AddParticipant { name: name.into() }).unwrap();
        }
        session.draw_now(&RandomSource::Thread).unwrap();

        let set = session.assignments().unwrap();
        let order = set.cycle_order();
        assert_eq!(order.len(), 4);
        for (i, giver) in order.iter().enumerate() {
            assert_eq!(set.receiver_for(giver.id), Some(&order[(i + 1) % 4]));
            assert_ne!(set.receiver_for(giver.id).map(|r| r.id), Some(giver.id));
        }
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: Action =
            serde_json::from_str(r#"{"type":"select","giver":3}"#).unwrap();
        assert_eq!(action, Action::Select { giver: ParticipantId(3) });
    }
}
