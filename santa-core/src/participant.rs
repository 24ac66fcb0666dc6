use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

/// Participants collected during setup, in insertion order.
///
/// Ids come from a counter that only moves forward, so an id removed or cleared
/// from the roster is never handed out again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RosterRecord", into = "RosterRecord")]
pub struct Roster {
    participants: Vec<Participant>,
    next_id: u64,
}

/// Stored form of a [`Roster`], checked before it becomes one.
#[derive(Serialize, Deserialize)]
struct RosterRecord {
    participants: Vec<Participant>,
    next_id: u64,
}

impl TryFrom<RosterRecord> for Roster {
    type Error = ValidationError;

    fn try_from(record: RosterRecord) -> Result<Self, Self::Error> {
        let mut ids = HashSet::with_capacity(record.participants.len());
        let mut names = HashSet::with_capacity(record.participants.len());
        for p in &record.participants {
            if p.name.trim().is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if !ids.insert(p.id) {
                return Err(ValidationError::DuplicateParticipant(p.id));
            }
            if !names.insert(p.name.as_str()) {
                return Err(ValidationError::DuplicateName(p.name.clone()));
            }
            if p.id.0 > record.next_id {
                return Err(ValidationError::IdCounterBehind {
                    next_id: record.next_id,
                    highest: p.id,
                });
            }
        }
        Ok(Self {
            participants: record.participants,
            next_id: record.next_id,
        })
    }
}

impl From<Roster> for RosterRecord {
    fn from(roster: Roster) -> Self {
        Self {
            participants: roster.participants,
            next_id: roster.next_id,
        }
    }
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str) -> Result<Participant, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.participants.iter().any(|p| p.name == name) {
            return Err(ValidationError::DuplicateName(name.to_string()));
        }

        self.next_id += 1;
        let participant = Participant {
            id: ParticipantId(self.next_id),
            name: name.to_string(),
        };
        self.participants.push(participant.clone());
        Ok(participant)
    }

    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(index))
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_trims_and_assigns_increasing_ids() {
        let mut roster = Roster::new();
        let alice = roster.add("  Alice ").unwrap();
        let bob = roster.add("Bob").unwrap();

        assert_eq!(alice.name, "Alice");
        assert!(bob.id > alice.id);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn duplicate_name_rejected_and_roster_unchanged() {
        let mut roster = Roster::new();
        roster.add("Alice").unwrap();
        let before = roster.clone();

        let err = roster.add("Alice").unwrap_err();

        assert_eq!(err, ValidationError::DuplicateName("Alice".into()));
        assert_eq!(roster, before);
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut roster = Roster::new();
        roster.add("Alice").unwrap();
        assert!(roster.add("alice").is_ok());
        assert_eq!(
            roster.add(" Alice  ").unwrap_err(),
            ValidationError::DuplicateName("Alice".into())
        );
    }

    #[test]
    fn blank_name_rejected() {
        let mut roster = Roster::new();
        assert_eq!(roster.add("   ").unwrap_err(), ValidationError::EmptyName);
        assert!(roster.is_empty());
    }

    #[test]
    fn remove_missing_is_silent() {
        let mut roster = Roster::new();
        let alice = roster.add("Alice").unwrap();

        assert_eq!(roster.remove(ParticipantId(99)), None);
        assert_eq!(roster.remove(alice.id), Some(alice));
        assert!(roster.is_empty());
    }

    #[test]
    fn ids_not_reused_after_clear() {
        let mut roster = Roster::new();
        let first = roster.add("Alice").unwrap();
        roster.clear();
        let second = roster.add("Alice").unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn reloaded_roster_keeps_counting_from_saved_id() {
        let mut roster = Roster::new();
        roster.add("Alice").unwrap();
        let bob = roster.add("Bob").unwrap();
        roster.remove(bob.id);

        let json = serde_json::to_string(&roster).unwrap();
        let mut reloaded: Roster = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, roster);
        assert!(reloaded.add("Carol").unwrap().id > bob.id);
    }

    fn stored(participants: &[(u64, &str)], next_id: u64) -> serde_json::Value {
        let participants: Vec<_> = participants
            .iter()
            .map(|(id, name)| serde_json::json!({ "id": id, "name": name }))
            .collect();
        serde_json::json!({ "participants": participants, "next_id": next_id })
    }

    #[test]
    fn stored_roster_with_lagging_counter_rejected() {
        let err = serde_json::from_value::<Roster>(stored(&[(1, "Alice"), (5, "Bob")], 2))
            .unwrap_err();
        assert!(err.to_string().contains("next id 2"), "{err}");
    }

    #[test]
    fn stored_roster_with_repeated_entries_rejected() {
        let same_id = stored(&[(1, "Alice"), (1, "Bob")], 3);
        assert!(serde_json::from_value::<Roster>(same_id).is_err());
        let same_name = stored(&[(1, "Ann"), (2, "Ann")], 3);
        assert!(serde_json::from_value::<Roster>(same_name).is_err());
        let blank = stored(&[(1, "  ")], 1);
        assert!(serde_json::from_value::<Roster>(blank).is_err());
    }
}
