//! Blink command payloads.
//!
//! Key names are the single ASCII characters fixed by the protocol; both
//! ends must agree on them exactly.

use crate::bt::{
    opt_u64, req_bytes, req_hash, req_list, req_u64, BtDict, BtValue, WireError,
};
use blink_types::{
    BlockHeight, Hash, Signature, BLINK_SUBQUORUM_SIZE, NUM_BLINK_SUBQUORUMS,
};

/// Submit or forward a blink tx. Public: any remote may send it.
pub const CMD_BLINK: &str = "blink";

/// Relay blink signatures between quorum members.
pub const CMD_BLINK_SIGN: &str = "blink_sign";

/// Entry point tells the submitter the tx never reached the quorum.
pub const CMD_BLINK_NOSTART: &str = "bl_nostart";

/// Entry point tells the submitter the quorum rejected the tx.
pub const CMD_BLINK_BAD: &str = "bl_bad";

/// Entry point tells the submitter the quorum approved the tx.
pub const CMD_BLINK_GOOD: &str = "bl_good";

/// Relay a quorum vote.
pub const CMD_VOTE: &str = "vote";

/// A `blink` message: tx submission from a client or forward between quorum
/// members.
///
/// - `!` — submitter tag; non-zero only on client submission, where the
///   sender expects a verdict back.
/// - `h` — blink authorization height.
/// - `q` — quorum membership checksum.
/// - `t` — serialized transaction.
/// - `#` — precomputed tx hash (32 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkSubmission {
    pub tag: u64,
    pub height: BlockHeight,
    pub checksum: u64,
    pub tx_blob: Vec<u8>,
    pub tx_hash: Hash,
}

impl BlinkSubmission {
    pub fn to_bt(&self) -> BtValue {
        let mut dict = BtDict::new();
        if self.tag != 0 {
            dict.insert("!".into(), self.tag.into());
        }
        dict.insert("h".into(), self.height.0.into());
        dict.insert("q".into(), self.checksum.into());
        dict.insert("t".into(), self.tx_blob.clone().into());
        dict.insert("#".into(), (&self.tx_hash).into());
        BtValue::Dict(dict)
    }

    pub fn from_bt(value: &BtValue) -> Result<Self, WireError> {
        let dict = value.as_dict().ok_or(WireError::Invalid("expected dict"))?;
        Ok(BlinkSubmission {
            tag: opt_u64(dict, "!")?.unwrap_or(0),
            height: BlockHeight(req_u64(dict, "h")?),
            checksum: req_u64(dict, "q")?,
            tx_blob: req_bytes(dict, "t")?.to_vec(),
            tx_hash: req_hash(dict, "#")?,
        })
    }
}

/// One signature slot assignment: who signed, in which subquorum, and
/// whether they approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingSignature {
    pub approval: bool,
    pub subquorum: u8,
    pub position: i32,
    pub signature: Signature,
}

/// A `blink_sign` message: one or more signatures for a single blink tx.
///
/// The four per-signature fields travel as parallel lists `i` (subquorum
/// indices), `p` (positions), `r` (approvals), `s` (signatures); all four
/// must have the same non-zero length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkSignatures {
    pub height: BlockHeight,
    pub tx_hash: Hash,
    pub checksum: u64,
    pub signatures: Vec<PendingSignature>,
}

impl BlinkSignatures {
    pub fn to_bt(&self) -> BtValue {
        let mut i_list = Vec::with_capacity(self.signatures.len());
        let mut p_list = Vec::with_capacity(self.signatures.len());
        let mut r_list: Vec<BtValue> = Vec::with_capacity(self.signatures.len());
        let mut s_list: Vec<BtValue> = Vec::with_capacity(self.signatures.len());
        for sig in &self.signatures {
            i_list.push(BtValue::Int(sig.subquorum as i128));
            p_list.push(BtValue::Int(sig.position as i128));
            r_list.push(sig.approval.into());
            s_list.push((&sig.signature).into());
        }

        let mut dict = BtDict::new();
        dict.insert("h".into(), self.height.0.into());
        dict.insert("#".into(), (&self.tx_hash).into());
        dict.insert("q".into(), self.checksum.into());
        dict.insert("i".into(), i_list.into());
        dict.insert("p".into(), p_list.into());
        dict.insert("r".into(), r_list.into());
        dict.insert("s".into(), s_list.into());
        BtValue::Dict(dict)
    }

    /// Strict decode: unknown keys, diverging list lengths, out-of-range
    /// indices/positions, and null signatures all reject the whole message.
    pub fn from_bt(value: &BtValue) -> Result<Self, WireError> {
        let dict = value.as_dict().ok_or(WireError::Invalid("expected dict"))?;
        for key in dict.keys() {
            if !matches!(key.as_str(), "h" | "#" | "q" | "i" | "p" | "r" | "s") {
                return Err(WireError::UnknownKey(key.clone()));
            }
        }

        let height = BlockHeight(req_u64(dict, "h")?);
        let tx_hash = req_hash(dict, "#")?;
        let checksum = req_u64(dict, "q")?;
        let i_list = req_list(dict, "i")?;
        let p_list = req_list(dict, "p")?;
        let r_list = req_list(dict, "r")?;
        let s_list = req_list(dict, "s")?;

        if i_list.is_empty() {
            return Err(WireError::InvalidField("i", "no signatures sent"));
        }
        if i_list.len() != p_list.len()
            || i_list.len() != r_list.len()
            || i_list.len() != s_list.len()
        {
            return Err(WireError::InvalidField(
                "i",
                "i, p, r, s lengths must be identical",
            ));
        }

        let mut signatures = Vec::with_capacity(i_list.len());
        for (((i, p), r), s) in i_list.iter().zip(p_list).zip(r_list).zip(s_list) {
            let subquorum = i.as_int().ok_or(WireError::WrongType("i"))?;
            if subquorum < 0 || subquorum >= NUM_BLINK_SUBQUORUMS as i128 {
                return Err(WireError::InvalidField("i", "invalid subquorum index"));
            }
            let position = p.as_int().ok_or(WireError::WrongType("p"))?;
            if position < 0 || position >= BLINK_SUBQUORUM_SIZE as i128 {
                return Err(WireError::InvalidField("p", "invalid quorum position"));
            }
            let approval = match r.as_int().ok_or(WireError::WrongType("r"))? {
                0 => false,
                1 => true,
                _ => return Err(WireError::InvalidField("r", "approval must be 0 or 1")),
            };
            let sig_bytes = s.as_bytes().ok_or(WireError::WrongType("s"))?;
            let signature = Signature::from_slice(sig_bytes)
                .ok_or(WireError::InvalidField("s", "expected 64 bytes"))?;
            if signature.is_zero() {
                return Err(WireError::InvalidField("s", "null signature"));
            }
            signatures.push(PendingSignature {
                approval,
                subquorum: subquorum as u8,
                position: position as i32,
                signature,
            });
        }

        Ok(BlinkSignatures {
            height,
            tx_hash,
            checksum,
            signatures,
        })
    }
}

/// A verdict or refusal sent back to the submitter: `bl_good`, `bl_bad`, or
/// `bl_nostart` (which also carries a reason under `e`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkReply {
    pub tag: u64,
    pub error: Option<String>,
}

impl BlinkReply {
    /// Reply for `bl_good` / `bl_bad`.
    pub fn verdict(tag: u64) -> Self {
        BlinkReply { tag, error: None }
    }

    /// Reply for `bl_nostart`.
    pub fn nostart(tag: u64, error: impl Into<String>) -> Self {
        BlinkReply {
            tag,
            error: Some(error.into()),
        }
    }

    pub fn to_bt(&self) -> BtValue {
        let mut dict = BtDict::new();
        dict.insert("!".into(), self.tag.into());
        if let Some(error) = &self.error {
            dict.insert("e".into(), error.as_str().into());
        }
        BtValue::Dict(dict)
    }

    pub fn from_bt(value: &BtValue) -> Result<Self, WireError> {
        let dict = value.as_dict().ok_or(WireError::Invalid("expected dict"))?;
        let tag = req_u64(dict, "!")?;
        let error = match dict.get("e") {
            None => None,
            Some(v) => {
                let bytes = v.as_bytes().ok_or(WireError::WrongType("e"))?;
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        Ok(BlinkReply { tag, error })
    }
}
