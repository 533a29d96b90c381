use crate::markers::NotATransplant;
use crate::matcher::FuseMismatch;
use graftt_classfile::{ClassIdentity, DecodeError, EncodeError, MemberRef};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraftError>;

/// Why a single grafting attempt failed. Never crosses attempt boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraftError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not a transplant: {0}")]
    NotATransplant(#[from] NotATransplant),

    #[error("Malformed donor: {0}")]
    MalformedDonor(DecodeError),

    #[error("Malformed recipient {recipient}: {error}")]
    MalformedRecipient {
        recipient: ClassIdentity,
        error: DecodeError,
    },

    #[error("Recipient {0} unavailable: {1}")]
    RecipientUnavailable(ClassIdentity, String),

    #[error("Expected recipient {expected} but the supplied class is {found}")]
    RecipientMismatch {
        expected: ClassIdentity,
        found: ClassIdentity,
    },

    #[error("{} fuse request(s) without a target: {}", .0.len(), join_mismatches(.0))]
    UnmatchedFuseMembers(Vec<FuseMismatch>),

    #[error("{member} cannot be fused onto recipient member #{index}")]
    FusionTarget { member: MemberRef, index: usize },

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Rewritten {recipient} failed verification: {reason}")]
    Verification {
        recipient: ClassIdentity,
        reason: String,
    },
}

fn join_mismatches(mismatches: &[FuseMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
