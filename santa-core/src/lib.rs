//! Gift-exchange draws: a roster of participants becomes one gifting cycle,
//! revealed to each giver privately.

pub mod assignment;
pub mod error;
pub mod generator;
pub mod participant;
pub mod session;
pub mod share;

pub use assignment::{Assignment, AssignmentSet};
pub use error::{AssignmentError, DecodeError, SessionError, ValidationError};
pub use generator::{generate, ParseRandomSourceError, RandomSource};
pub use participant::{Participant, ParticipantId, Roster};
pub use session::{apply_action, Action, DrawTicket, RevealState, Session, SessionEvent};
