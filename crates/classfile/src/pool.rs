use crate::error::{DecodeError, EncodeError, Result};
use crate::mutf8;
use serde::{Deserialize, Serialize};

/// Largest slot index a class file can address (`constant_pool_count` is a u2).
const MAX_POOL_SLOTS: usize = u16::MAX as usize;

/// One constant pool entry. References are pool indices.
///
/// Utf8 entries keep their raw modified UTF-8 bytes so that strings which
/// have no exact `String` form are written back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(i32),
    /// IEEE 754 bits
    Float(u32),
    Long(i64),
    /// IEEE 754 bits
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl Constant {
    /// Long and Double occupy two slots
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Utf8(_) => 1,
            Self::Integer(_) => 3,
            Self::Float(_) => 4,
            Self::Long(_) => 5,
            Self::Double(_) => 6,
            Self::Class(_) => 7,
            Self::String(_) => 8,
            Self::FieldRef { .. } => 9,
            Self::MethodRef { .. } => 10,
            Self::InterfaceMethodRef { .. } => 11,
            Self::NameAndType { .. } => 12,
            Self::MethodHandle { .. } => 15,
            Self::MethodType(_) => 16,
            Self::Dynamic { .. } => 17,
            Self::InvokeDynamic { .. } => 18,
            Self::Module(_) => 19,
            Self::Package(_) => 20,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Utf8(_) => "Utf8",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Long(_) => "Long",
            Self::Double(_) => "Double",
            Self::Class(_) => "Class",
            Self::String(_) => "String",
            Self::FieldRef { .. } => "Fieldref",
            Self::MethodRef { .. } => "Methodref",
            Self::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Self::NameAndType { .. } => "NameAndType",
            Self::MethodHandle { .. } => "MethodHandle",
            Self::MethodType(_) => "MethodType",
            Self::Dynamic { .. } => "Dynamic",
            Self::InvokeDynamic { .. } => "InvokeDynamic",
            Self::Module(_) => "Module",
            Self::Package(_) => "Package",
        }
    }
}

/// The constant pool, indexed from 1.
///
/// Slot 0 and the slot following every Long/Double are unusable and hold
/// `None`. Existing entries are never moved or removed; interning only
/// appends, so raw attributes referencing the pool stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantPool {
    slots: Vec<Option<Constant>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self { slots: vec![None] }
    }

    /// Value of `constant_pool_count`: number of slots including slot 0
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate populated entries with their indices
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|c| (index as u16, c)))
    }

    pub(crate) fn push_decoded(&mut self, constant: Constant) {
        let wide = constant.is_wide();
        self.slots.push(Some(constant));
        if wide {
            self.slots.push(None);
        }
    }

    /// Entry at `index`, failing on unusable slots
    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.slots
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or_else(|| DecodeError::constant(index, "unusable or out of range slot"))
    }

    /// Raw bytes of a Utf8 entry
    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(bytes),
            other => Err(mistyped(index, "Utf8", other)),
        }
    }

    /// Decoded string of a Utf8 entry
    pub fn utf8(&self, index: u16) -> Result<String> {
        mutf8::decode(self.utf8_bytes(index)?).ok_or(DecodeError::InvalidUtf8 { index })
    }

    /// Internal name referenced by a Class entry
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(mistyped(index, "Class", other)),
        }
    }

    pub fn integer(&self, index: u16) -> Result<i32> {
        match self.get(index)? {
            Constant::Integer(value) => Ok(*value),
            other => Err(mistyped(index, "Integer", other)),
        }
    }

    pub fn long(&self, index: u16) -> Result<i64> {
        match self.get(index)? {
            Constant::Long(value) => Ok(*value),
            other => Err(mistyped(index, "Long", other)),
        }
    }

    pub fn float_bits(&self, index: u16) -> Result<u32> {
        match self.get(index)? {
            Constant::Float(bits) => Ok(*bits),
            other => Err(mistyped(index, "Float", other)),
        }
    }

    pub fn double_bits(&self, index: u16) -> Result<u64> {
        match self.get(index)? {
            Constant::Double(bits) => Ok(*bits),
            other => Err(mistyped(index, "Double", other)),
        }
    }

    /// Check that every reference between entries points at an entry of the right kind
    pub(crate) fn validate_references(&self) -> Result<()> {
        for (index, constant) in self.iter() {
            let check = |target: u16, expected: &'static str| -> Result<()> {
                let entry = self.get(target).map_err(|_| {
                    DecodeError::constant(index, format!("dangling reference to #{target}"))
                })?;
                if entry.kind_name() == expected {
                    Ok(())
                } else {
                    Err(DecodeError::constant(
                        index,
                        format!("#{target} is {} but {expected} was expected", entry.kind_name()),
                    ))
                }
            };

            match constant {
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_) => {}
                Constant::Class(name)
                | Constant::String(name)
                | Constant::MethodType(name)
                | Constant::Module(name)
                | Constant::Package(name) => check(*name, "Utf8")?,
                Constant::FieldRef {
                    class,
                    name_and_type,
                }
                | Constant::MethodRef {
                    class,
                    name_and_type,
                }
                | Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    check(*class, "Class")?;
                    check(*name_and_type, "NameAndType")?;
                }
                Constant::NameAndType { name, descriptor } => {
                    check(*name, "Utf8")?;
                    check(*descriptor, "Utf8")?;
                }
                Constant::MethodHandle { kind, reference } => {
                    if !(1..=9).contains(kind) {
                        return Err(DecodeError::constant(
                            index,
                            format!("invalid method handle kind {kind}"),
                        ));
                    }
                    self.get(*reference).map_err(|_| {
                        DecodeError::constant(index, format!("dangling reference to #{reference}"))
                    })?;
                }
                Constant::Dynamic { name_and_type, .. }
                | Constant::InvokeDynamic { name_and_type, .. } => {
                    check(*name_and_type, "NameAndType")?;
                }
            }
        }
        Ok(())
    }

    /// Index of an existing equal entry, or append a new one.
    ///
    /// The first equal entry wins so interning is deterministic.
    pub fn intern(&mut self, constant: Constant) -> std::result::Result<u16, EncodeError> {
        if let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.as_ref() == Some(&constant))
        {
            return Ok(index as u16);
        }

        let needed = self.slots.len() + if constant.is_wide() { 2 } else { 1 };
        if needed > MAX_POOL_SLOTS {
            return Err(EncodeError::ConstantPoolOverflow(needed));
        }

        let index = self.slots.len() as u16;
        log::trace!("Interning constant #{index}: {constant:?}");
        self.push_decoded(constant);
        Ok(index)
    }

    pub fn intern_utf8(&mut self, value: &str) -> std::result::Result<u16, EncodeError> {
        let bytes = mutf8::encode(value);
        if bytes.len() > usize::from(u16::MAX) {
            return Err(EncodeError::StringTooLong(bytes.len()));
        }
        self.intern(Constant::Utf8(bytes))
    }

    pub fn intern_class(&mut self, internal_name: &str) -> std::result::Result<u16, EncodeError> {
        let name = self.intern_utf8(internal_name)?;
        self.intern(Constant::Class(name))
    }
}

fn mistyped(index: u16, expected: &str, found: &Constant) -> DecodeError {
    DecodeError::constant(
        index,
        format!("expected {expected}, found {}", found.kind_name()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_reuses_existing_entries() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_utf8("hmm").unwrap();
        let b = pool.intern_utf8("hmm").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.intern(Constant::Long(42)).unwrap();
        let next = pool.intern_utf8("after").unwrap();
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert!(pool.get(2).is_err());
        assert_eq!(pool.long(1).unwrap(), 42);
    }

    #[test]
    fn test_class_entries_resolve_names() {
        let mut pool = ConstantPool::new();
        let class = pool.intern_class("com/example/Foo").unwrap();
        assert_eq!(pool.class_name(class).unwrap(), "com/example/Foo");
        assert!(pool.utf8(class).is_err());
    }

    #[test]
    fn test_validate_references_rejects_mistyped_entries() {
        let mut pool = ConstantPool::new();
        pool.push_decoded(Constant::Integer(7));
        pool.push_decoded(Constant::Class(1));
        let err = pool.validate_references().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidConstant { index: 2, .. }));
    }
}
