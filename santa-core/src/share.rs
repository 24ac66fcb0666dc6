//! Share links: a finished draw packed into a URL-safe token.
//!
//! Layout before base64: the JSON payload followed by the first eight bytes of
//! its BLAKE3 hash. The payload stores participants in gifting order, which is
//! all that is needed to rebuild the cycle.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::assignment::{Assignment, AssignmentSet};
use crate::error::DecodeError;
use crate::participant::Participant;

const VERSION: u8 = 1;
const TAG_LEN: usize = 8;

#[derive(Deserialize)]
struct SharePayload {
    v: u8,
    order: Vec<Participant>,
}

pub fn encode(set: &AssignmentSet) -> String {
    let mut bytes = json!({ "v": VERSION, "order": set.cycle_order() })
        .to_string()
        .into_bytes();
    let tag = blake3::hash(&bytes);
    bytes.extend_from_slice(&tag.as_bytes()[..TAG_LEN]);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(token: &str) -> Result<AssignmentSet, DecodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;
    if bytes.len() <= TAG_LEN {
        return Err(DecodeError::Truncated);
    }

    let (body, tag) = bytes.split_at(bytes.len() - TAG_LEN);
    if blake3::hash(body).as_bytes()[..TAG_LEN] != *tag {
        return Err(DecodeError::Integrity);
    }

    let payload: SharePayload = serde_json::from_slice(body)?;
    if payload.v != VERSION {
        return Err(DecodeError::UnsupportedVersion(payload.v));
    }

    let order = payload.order;
    let n = order.len();
    let assignments = order
        .iter()
        .enumerate()
        .map(|(i, giver)| Assignment {
            giver: giver.clone(),
            receiver: order[(i + 1) % n].clone(),
        })
        .collect();
    Ok(AssignmentSet::from_assignments(assignments)?)
}
