use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::assignment::AssignmentSet;
use crate::error::ValidationError;
use crate::participant::{Participant, ParticipantId};

/// Draws a single gifting cycle over `participants`.
///
/// The input is shuffled uniformly (Fisher-Yates via [`SliceRandom::shuffle`]),
/// then each participant gives to the one after them in the shuffled order and
/// the last gives to the first. A single n-cycle has no fixed points, so for
/// two people this is a plain swap.
pub fn generate<R>(
    participants: &[Participant],
    rng: &mut R,
) -> Result<AssignmentSet, ValidationError>
where
    R: Rng + ?Sized,
{
    if participants.len() < 2 {
        return Err(ValidationError::TooFewParticipants {
            count: participants.len(),
        });
    }

    let mut seen: HashSet<ParticipantId> = HashSet::with_capacity(participants.len());
    if let Some(dup) = participants.iter().find(|p| !seen.insert(p.id)) {
        return Err(ValidationError::DuplicateParticipant(dup.id));
    }

    let mut shuffled = participants.to_vec();
    shuffled.shuffle(rng);
    Ok(AssignmentSet::from_cycle(&shuffled))
}

/// Where draw randomness comes from.
///
/// `Thread` is fast but predictable to someone who can observe the process;
/// pick `Os` when participants must not be able to guess or steer the cycle.
/// `Seeded` replays the same draw for the same roster order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomSource {
    #[default]
    Thread,
    Os,
    Seeded(u64),
}

impl RandomSource {
    pub fn draw(&self, participants: &[Participant]) -> Result<AssignmentSet, ValidationError> {
        match *self {
            RandomSource::Thread => generate(participants, &mut thread_rng()),
            RandomSource::Os => generate(participants, &mut OsRng),
            RandomSource::Seeded(seed) => {
                generate(participants, &mut ChaCha8Rng::seed_from_u64(seed))
            }
        }
    }
}

impl fmt::Display for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomSource::Thread => f.write_str("thread"),
            RandomSource::Os => f.write_str("os"),
            RandomSource::Seeded(seed) => write!(f, "seeded:{seed}"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown random source {0:?}, expected thread, os or seeded:<n>")]
pub struct ParseRandomSourceError(pub String);

impl FromStr for RandomSource {
    type Err = ParseRandomSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value {
            "thread" => Ok(RandomSource::Thread),
            "os" => Ok(RandomSource::Os),
            _ => value
                .strip_prefix("seeded:")
                .and_then(|seed| seed.parse().ok())
                .map(RandomSource::Seeded)
                .ok_or_else(|| ParseRandomSourceError(s.to_string())),
        }
    }
}
