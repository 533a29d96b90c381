//! # Graftt Core
//!
//! Fuses annotations from donor ("transplant") classes onto the compiled
//! classes they name, without touching bytecode.
//!
//! A donor declares its recipient with `@Graft.Recipient(Foo.class)`. Each
//! donor field or method marked `@Graft.Fuse` must have a counterpart in the
//! recipient with the same kind, name and descriptor; its other annotations
//! are copied onto that counterpart, replacing annotations of the same type.
//!
//! ## Architecture
//!
//! ```text
//! donor bytes ──> decode ──> MarkerResolver ──┬─> not a transplant: Skipped
//!                                             │
//!                            recipient bytes ─┴─> decode ──> Matcher
//!                                                               │
//!                                 unmatched members: Failed <───┤
//!                                                               │
//!                                                  FusionEngine ┴─> encode ──> verify ──> Encoded
//! ```
//!
//! A batch collects one [`AttemptReport`] per donor, in input order, and only
//! `Encoded` attempts are handed to an [`ArtifactSink`]. Donors naming the same
//! recipient are applied in turn, each on top of the previous output.

mod config;
mod error;
mod fusion;
mod markers;
mod matcher;
mod orchestrator;
mod report;

pub use config::{GraftConfig, FUSE_MARKER, RECIPIENT_MARKER};
pub use error::{GraftError, Result};
pub use fusion::{
    merge_annotations, transplantable, FusedAnnotation, FusionEngine, FusionReport, FusionTarget,
};
pub use markers::{GraftRequest, MarkerResolver, NotATransplant};
pub use matcher::{match_all, match_member, FuseMismatch, MatchedMember};
pub use orchestrator::{DonorInput, Grafter, RecipientSource};
pub use report::{
    ArtifactSink, AttemptReport, AttemptState, BatchReport, BatchSummary, Diagnostic, Outcome,
};
