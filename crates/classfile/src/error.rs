use thiserror::Error;

/// Result type for decoding class files
pub type Result<T> = std::result::Result<T, DecodeError>;

/// A class file that cannot be decoded. Every variant means the artifact is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// File does not start with `0xCAFEBABE`
    #[error("Bad magic: 0x{0:08X}")]
    BadMagic(u32),

    /// Class file version outside the supported range
    #[error("Unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// Input ended before a table or value was complete
    #[error("Truncated class file: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// Unknown constant pool tag
    #[error("Invalid constant tag {tag} at pool index {index}")]
    InvalidConstantTag { index: u16, tag: u8 },

    /// Pool reference that is out of range or points at the wrong kind of entry
    #[error("Invalid constant pool reference #{index}: {reason}")]
    InvalidConstant { index: u16, reason: String },

    /// Utf8 constant that is not valid modified UTF-8
    #[error("Invalid modified UTF-8 in constant #{index}")]
    InvalidUtf8 { index: u16 },

    /// Field, method or annotation descriptor with invalid syntax
    #[error("Invalid descriptor: {0:?}")]
    InvalidDescriptor(String),

    /// Unknown annotation element tag
    #[error("Invalid annotation element tag '{0}'")]
    InvalidElementTag(char),

    /// Attribute body did not consume exactly its declared length
    #[error("Attribute {name} declares {declared} bytes but {actual} were read")]
    AttributeLength {
        name: String,
        declared: usize,
        actual: usize,
    },

    /// One element annotated twice with the same type, across or within retentions
    #[error("Annotation {0} appears more than once on one element")]
    DuplicateAnnotation(String),

    /// Nested annotation values deeper than the decoder accepts
    #[error("Annotation values nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Bytes left over after the class structure
    #[error("{0} trailing bytes after class structure")]
    TrailingBytes(usize),
}

impl DecodeError {
    /// Create an invalid constant error
    pub fn constant(index: u16, reason: impl Into<String>) -> Self {
        Self::InvalidConstant {
            index,
            reason: reason.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn descriptor(descriptor: impl Into<String>) -> Self {
        Self::InvalidDescriptor(descriptor.into())
    }
}

/// An artifact that cannot be written back as a class file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Interning new constants pushed the pool past 65535 slots
    #[error("Constant pool overflow: {0} slots required")]
    ConstantPoolOverflow(usize),

    /// A table has more entries than its u2 count can hold
    #[error("Too many entries in {table}: {count}")]
    TableTooLarge { table: &'static str, count: usize },

    /// An attribute body is longer than its u4 length can hold
    #[error("Attribute {0} is too large")]
    AttributeTooLarge(String),

    /// A string is longer than a Utf8 constant can hold
    #[error("String constant too long: {0} bytes")]
    StringTooLong(usize),
}
