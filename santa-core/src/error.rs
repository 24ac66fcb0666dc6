use thiserror::Error;

use crate::participant::ParticipantId;

/// Input problems surfaced to the user as a message. Never changes state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name already taken: {0}")]
    DuplicateName(String),
    #[error("at least two participants are needed, got {count}")]
    TooFewParticipants { count: usize },
    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(ParticipantId),
    #[error("next id {next_id} is behind participant {highest}")]
    IdCounterBehind {
        next_id: u64,
        highest: ParticipantId,
    },
}

/// Structural problems in a list of giver/receiver pairs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("at least two assignments are needed, got {count}")]
    TooFew { count: usize },
    #[error("participant {0} gives more than once")]
    DuplicateGiver(ParticipantId),
    #[error("participant {0} receives more than once")]
    DuplicateReceiver(ParticipantId),
    #[error("participant {0} is assigned to themself")]
    SelfAssignment(ParticipantId),
    #[error("participant {0} receives but never gives")]
    UnmatchedReceiver(ParticipantId),
    #[error("participant {0} appears under more than one name")]
    InconsistentName(ParticipantId),
    #[error("assignments do not form a single cycle")]
    NotSingleCycle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a draw is in progress")]
    DrawInProgress,
    #[error("{action} is not allowed while {state}")]
    IllegalTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("no assignment for giver {0}")]
    UnknownGiver(ParticipantId),
    #[error("draw ticket {0} is not pending")]
    StaleTicket(u64),
    #[error("draw result does not match the frozen roster")]
    RoundMismatch,
}

/// Why a share link could not be opened. Every variant renders as a broken link
/// to the user; the variant only matters for logs.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("share link is broken: not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("share link is broken: truncated")]
    Truncated,
    #[error("share link is broken: integrity check failed")]
    Integrity,
    #[error("share link is broken: malformed payload")]
    Payload(#[from] serde_json::Error),
    #[error("share link is broken: unsupported version {0}")]
    UnsupportedVersion(u8),
    #[error("share link is broken: {0}")]
    Invalid(#[from] AssignmentError),
}
