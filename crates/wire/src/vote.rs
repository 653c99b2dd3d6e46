//! Quorum vote serialization.
//!
//! Keys: `v` version, `t` quorum kind, `h` height, `g` voter group, `i`
//! index within group, `s` signature, plus `bh` (block hash) for
//! checkpointing votes or `wi`/`sc` (worker index, target state) for the
//! rest.

use crate::bt::{req_hash, req_signature, req_u16, req_u64, req_u8, BtDict, BtValue, WireError};
use blink_types::{BlockHeight, QuorumKind, QuorumVote, VotePayload, VoterGroup, WorkerState};

pub fn encode_vote(vote: &QuorumVote) -> BtValue {
    let mut dict = BtDict::new();
    dict.insert("v".into(), (vote.version as u64).into());
    dict.insert("t".into(), (vote.kind.as_u8() as u64).into());
    dict.insert("h".into(), vote.height.0.into());
    dict.insert("g".into(), (vote.group.as_u8() as u64).into());
    dict.insert("i".into(), (vote.index_in_group as u64).into());
    dict.insert("s".into(), (&vote.signature).into());
    match &vote.payload {
        VotePayload::Checkpoint { block_hash } => {
            dict.insert("bh".into(), block_hash.into());
        }
        VotePayload::StateChange {
            worker_index,
            state,
        } => {
            dict.insert("wi".into(), (*worker_index as u64).into());
            dict.insert("sc".into(), (state.as_u8() as u64).into());
        }
    }
    BtValue::Dict(dict)
}

/// Strict decode: unknown keys, an `invalid` voter group, and a payload that
/// does not match the vote kind all reject the vote.
pub fn decode_vote(value: &BtValue) -> Result<QuorumVote, WireError> {
    let dict = value.as_dict().ok_or(WireError::Invalid("expected dict"))?;

    let kind = QuorumKind::from_u8(req_u8(dict, "t")?)
        .ok_or(WireError::InvalidField("t", "unknown quorum kind"))?;

    for key in dict.keys() {
        let known = match key.as_str() {
            "v" | "t" | "h" | "g" | "i" | "s" => true,
            "bh" => kind == QuorumKind::Checkpointing,
            "wi" | "sc" => kind != QuorumKind::Checkpointing,
            _ => false,
        };
        if !known {
            return Err(WireError::UnknownKey(key.clone()));
        }
    }

    let payload = if kind == QuorumKind::Checkpointing {
        VotePayload::Checkpoint {
            block_hash: req_hash(dict, "bh")?,
        }
    } else {
        VotePayload::StateChange {
            worker_index: req_u16(dict, "wi")?,
            state: WorkerState::from_u8(req_u8(dict, "sc")?)
                .ok_or(WireError::InvalidField("sc", "unknown worker state"))?,
        }
    };

    Ok(QuorumVote {
        version: req_u8(dict, "v")?,
        kind,
        height: BlockHeight(req_u64(dict, "h")?),
        group: VoterGroup::from_u8(req_u8(dict, "g")?)
            .ok_or(WireError::InvalidField("g", "invalid voter group"))?,
        index_in_group: req_u16(dict, "i")?,
        signature: req_signature(dict, "s")?,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bt::{decode, encode};
    use blink_types::{Hash, Signature, VOTE_VERSION};

    fn checkpoint_vote() -> QuorumVote {
        QuorumVote {
            version: VOTE_VERSION,
            kind: QuorumKind::Checkpointing,
            height: BlockHeight(4321),
            group: VoterGroup::Validator,
            index_in_group: 5,
            signature: Signature::from_bytes([9; 64]),
            payload: VotePayload::Checkpoint {
                block_hash: Hash::from_bytes(b"block"),
            },
        }
    }

    fn state_change_vote() -> QuorumVote {
        QuorumVote {
            version: VOTE_VERSION,
            kind: QuorumKind::Obligations,
            height: BlockHeight(77),
            group: VoterGroup::Validator,
            index_in_group: 2,
            signature: Signature::from_bytes([4; 64]),
            payload: VotePayload::StateChange {
                worker_index: 3,
                state: WorkerState::Decommission,
            },
        }
    }

    #[test]
    fn test_vote_round_trip() {
        for vote in [checkpoint_vote(), state_change_vote()] {
            let bytes = encode(&encode_vote(&vote));
            assert_eq!(decode_vote(&decode(&bytes).unwrap()).unwrap(), vote);
        }
    }

    #[test]
    fn test_rejects_invalid_group() {
        let mut value = encode_vote(&checkpoint_vote());
        if let BtValue::Dict(dict) = &mut value {
            dict.insert("g".into(), 0u64.into());
        }
        assert_eq!(
            decode_vote(&value),
            Err(WireError::InvalidField("g", "invalid voter group"))
        );
    }

    #[test]
    fn test_rejects_short_signature() {
        let mut value = encode_vote(&checkpoint_vote());
        if let BtValue::Dict(dict) = &mut value {
            dict.insert("s".into(), vec![0u8; 63].into());
        }
        assert!(decode_vote(&value).is_err());
    }

    #[test]
    fn test_rejects_payload_kind_mismatch() {
        // A checkpointing vote must not carry worker fields.
        let mut value = encode_vote(&checkpoint_vote());
        if let BtValue::Dict(dict) = &mut value {
            dict.insert("wi".into(), 1u64.into());
        }
        assert_eq!(decode_vote(&value), Err(WireError::UnknownKey("wi".into())));
    }

    #[test]
    fn test_rejects_missing_block_hash() {
        let mut value = encode_vote(&checkpoint_vote());
        if let BtValue::Dict(dict) = &mut value {
            dict.remove("bh");
        }
        assert_eq!(decode_vote(&value), Err(WireError::MissingField("bh")));
    }
}
