//! # Graftt Class File
//!
//! Structural model of a compiled JVM class and a codec that rewrites it
//! without disturbing what it does not understand.
//!
//! ## Architecture
//!
//! ```text
//! class file bytes
//!     │
//!     ├──> decode
//!     │      ├─ constant pool (indices preserved, Utf8 kept as raw bytes)
//!     │      ├─ class header, fields, methods
//!     │      ├─ Runtime(In)VisibleAnnotations → AnnotationSet
//!     │      └─ every other attribute (Code, Signature, ...) kept verbatim
//!     │
//!     ├──> Artifact (mutate annotations in memory)
//!     │
//!     └──> encode
//!            ├─ intern new constants at the end of the pool
//!            └─ annotation attributes written back into their original slot
//! ```
//!
//! ## Example
//!
//! ```rust
//! use graftt_classfile::{decode, encode, Annotation, Artifact, Member, Retention};
//!
//! let mut foo = Artifact::new("com/example/Foo");
//! foo.push_member(Member::field(0x0001, "hmm", "Ljava/lang/String;"));
//! let bytes = encode(&foo).unwrap();
//!
//! let mut decoded = decode(&bytes).unwrap();
//! decoded.members[0]
//!     .annotations
//!     .insert(Annotation::new("Ljavax/annotation/Nonnull;", Retention::Visible));
//! let rewritten = encode(&decoded).unwrap();
//! assert!(decode(&rewritten).unwrap().members[0]
//!     .annotations
//!     .contains("Ljavax/annotation/Nonnull;"));
//! ```

mod annotation;
pub mod descriptor;
mod error;
pub mod mutf8;
mod pool;
mod reader;
mod types;
mod writer;

pub use annotation::{Annotation, AnnotationSet, ElementValue, Retention};
pub use error::{DecodeError, EncodeError, Result};
pub use pool::{Constant, ConstantPool};
pub use reader::decode;
pub use types::{
    Artifact, AttributeSlot, ClassIdentity, ClassVersion, Member, MemberKind, MemberRef,
    RawAttribute, DEFAULT_CLASS_ACCESS,
};
pub use writer::encode;
