use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::AssignmentError;
use crate::participant::{Participant, ParticipantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub giver: Participant,
    pub receiver: Participant,
}

/// A complete draw: every participant gives once and receives once, and
/// following receivers from any giver visits everyone before coming back.
///
/// Kept sorted by giver name so listings are stable. The only ways to build one
/// are the generator and [`AssignmentSet::from_assignments`], which validates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Assignment>", into = "Vec<Assignment>")]
pub struct AssignmentSet {
    assignments: Vec<Assignment>,
}

impl AssignmentSet {
    /// Links each participant to the next one in `order`, wrapping around.
    /// Callers guarantee at least two participants with distinct ids.
    pub(crate) fn from_cycle(order: &[Participant]) -> Self {
        let n = order.len();
        let assignments = order
            .iter()
            .enumerate()
            .map(|(i, giver)| Assignment {
                giver: giver.clone(),
                receiver: order[(i + 1) % n].clone(),
            })
            .collect();
        Self::sorted(assignments)
    }

    pub fn from_assignments(assignments: Vec<Assignment>) -> Result<Self, AssignmentError> {
        validate(&assignments)?;
        Ok(Self::sorted(assignments))
    }

    fn sorted(mut assignments: Vec<Assignment>) -> Self {
        assignments.sort_by(|a, b| compare_participants(&a.giver, &b.giver));
        Self { assignments }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    pub fn find(&self, giver: ParticipantId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.giver.id == giver)
    }

    pub fn receiver_for(&self, giver: ParticipantId) -> Option<&Participant> {
        self.find(giver).map(|a| &a.receiver)
    }

    pub fn givers(&self) -> impl Iterator<Item = &Participant> {
        self.assignments.iter().map(|a| &a.giver)
    }

    /// Participants in gifting order, starting from the first listed giver.
    pub fn cycle_order(&self) -> Vec<Participant> {
        let Some(first) = self.assignments.first() else {
            return Vec::new();
        };
        let mut order = Vec::with_capacity(self.assignments.len());
        let mut current = &first.giver;
        for _ in 0..self.assignments.len() {
            order.push(current.clone());
            match self.receiver_for(current.id) {
                Some(next) => current = next,
                None => break,
            }
        }
        order
    }
}

impl TryFrom<Vec<Assignment>> for AssignmentSet {
    type Error = AssignmentError;

    fn try_from(assignments: Vec<Assignment>) -> Result<Self, Self::Error> {
        Self::from_assignments(assignments)
    }
}

impl From<AssignmentSet> for Vec<Assignment> {
    fn from(set: AssignmentSet) -> Self {
        set.assignments
    }
}

impl<'a> IntoIterator for &'a AssignmentSet {
    type Item = &'a Assignment;
    type IntoIter = std::slice::Iter<'a, Assignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.assignments.iter()
    }
}

/// Display order for names: case-insensitive first so "bob" sits next to
/// "Bob", then exact text, then id.
pub fn compare_participants(a: &Participant, b: &Participant) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

fn validate(assignments: &[Assignment]) -> Result<(), AssignmentError> {
    if assignments.len() < 2 {
        return Err(AssignmentError::TooFew {
            count: assignments.len(),
        });
    }

    let mut names: HashMap<ParticipantId, &str> = HashMap::new();
    let mut next: HashMap<ParticipantId, ParticipantId> = HashMap::new();
    let mut receivers: HashSet<ParticipantId> = HashSet::new();

    for assignment in assignments {
        for p in [&assignment.giver, &assignment.receiver] {
            let known = names.entry(p.id).or_insert(p.name.as_str());
            if *known != p.name {
                return Err(AssignmentError::InconsistentName(p.id));
            }
        }

        let giver = assignment.giver.id;
        let receiver = assignment.receiver.id;
        if giver == receiver {
            return Err(AssignmentError::SelfAssignment(giver));
        }
        if next.insert(giver, receiver).is_some() {
            return Err(AssignmentError::DuplicateGiver(giver));
        }
        if !receivers.insert(receiver) {
            return Err(AssignmentError::DuplicateReceiver(receiver));
        }
    }

    if let Some(orphan) = receivers.iter().find(|id| !next.contains_key(id)) {
        return Err(AssignmentError::UnmatchedReceiver(*orphan));
    }

    let start = assignments[0].giver.id;
    let mut current = start;
    let mut steps = 0;
    loop {
        current = *next.get(&current).ok_or(AssignmentError::NotSingleCycle)?;
        steps += 1;
        if current == start {
            break;
        }
    }
    if steps != assignments.len() {
        return Err(AssignmentError::NotSingleCycle);
    }

    Ok(())
}
