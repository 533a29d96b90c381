use crate::annotation::{Annotation, AnnotationSet, ElementValue, Retention};
use crate::descriptor;
use crate::error::{DecodeError, Result};
use crate::pool::{Constant, ConstantPool};
use crate::types::{
    Artifact, AttributeSlot, ClassIdentity, ClassVersion, Member, MemberKind, RawAttribute,
};
use bytes::Buf;

const MAGIC: u32 = 0xCAFE_BABE;

/// Annotations nested deeper than this are rejected instead of recursing further
const MAX_ELEMENT_DEPTH: usize = 64;

/// Bounds-checked big-endian cursor that tracks its offset for error reporting
struct Cursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            Err(DecodeError::Truncated {
                offset: self.offset,
                needed,
            })
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        self.offset += 1;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        self.offset += 2;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.offset += 4;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        self.offset += 8;
        Ok(self.buf.get_u64())
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.offset += len;
        Ok(head)
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}

/// Decode a class file into an [`Artifact`].
///
/// Fails with a [`DecodeError`] on anything structurally invalid: bad magic
/// or version, truncated tables, bad pool references or descriptors.
pub fn decode(bytes: &[u8]) -> Result<Artifact> {
    let mut cur = Cursor::new(bytes, 0);

    let magic = cur.u32()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let minor = cur.u16()?;
    let major = cur.u16()?;
    let version = ClassVersion { major, minor };
    if !version.is_supported() {
        return Err(DecodeError::UnsupportedVersion { major, minor });
    }

    let pool = read_constant_pool(&mut cur)?;
    pool.validate_references()?;

    let access_flags = cur.u16()?;
    let this_class = cur.u16()?;
    let name = pool.class_name(this_class)?;
    descriptor::validate_internal_name(&name)?;

    let super_class = cur.u16()?;
    let super_name = match super_class {
        0 => None,
        index => Some(pool.class_name(index)?),
    };

    let interface_count = cur.u16()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(cur.u16()?)?);
    }

    let mut members = Vec::new();
    for kind in [MemberKind::Field, MemberKind::Method] {
        let count = cur.u16()?;
        for _ in 0..count {
            members.push(read_member(&mut cur, &pool, kind)?);
        }
    }

    let (annotations, attributes) = read_attributes(&mut cur, &pool)?;

    if cur.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(cur.remaining()));
    }

    log::debug!(
        "Decoded {name}: {} pool slots, {} members",
        pool.count(),
        members.len()
    );

    Ok(Artifact {
        version,
        constant_pool: pool,
        access_flags,
        name: ClassIdentity::new(name),
        super_name,
        interfaces,
        members,
        annotations,
        attributes,
    })
}

fn read_constant_pool(cur: &mut Cursor<'_>) -> Result<ConstantPool> {
    let count = cur.u16()?;
    let mut pool = ConstantPool::new();

    while pool.count() < usize::from(count) {
        let index = pool.count() as u16;
        let tag = cur.u8()?;
        let constant = match tag {
            1 => {
                let len = cur.u16()?;
                Constant::Utf8(cur.bytes(usize::from(len))?.to_vec())
            }
            3 => Constant::Integer(cur.u32()? as i32),
            4 => Constant::Float(cur.u32()?),
            5 => Constant::Long(cur.u64()? as i64),
            6 => Constant::Double(cur.u64()?),
            7 => Constant::Class(cur.u16()?),
            8 => Constant::String(cur.u16()?),
            9 => Constant::FieldRef {
                class: cur.u16()?,
                name_and_type: cur.u16()?,
            },
            10 => Constant::MethodRef {
                class: cur.u16()?,
                name_and_type: cur.u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: cur.u16()?,
                name_and_type: cur.u16()?,
            },
            12 => Constant::NameAndType {
                name: cur.u16()?,
                descriptor: cur.u16()?,
            },
            15 => Constant::MethodHandle {
                kind: cur.u8()?,
                reference: cur.u16()?,
            },
            16 => Constant::MethodType(cur.u16()?),
            17 => Constant::Dynamic {
                bootstrap: cur.u16()?,
                name_and_type: cur.u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: cur.u16()?,
                name_and_type: cur.u16()?,
            },
            19 => Constant::Module(cur.u16()?),
            20 => Constant::Package(cur.u16()?),
            tag => return Err(DecodeError::InvalidConstantTag { index, tag }),
        };

        if constant.is_wide() && pool.count() + 2 > usize::from(count) {
            return Err(DecodeError::constant(index, "wide constant in last slot"));
        }
        pool.push_decoded(constant);
    }

    Ok(pool)
}

fn read_member(cur: &mut Cursor<'_>, pool: &ConstantPool, kind: MemberKind) -> Result<Member> {
    let access_flags = cur.u16()?;
    let name = pool.utf8(cur.u16()?)?;
    let descriptor = pool.utf8(cur.u16()?)?;
    match kind {
        MemberKind::Field => descriptor::validate_field(&descriptor)?,
        MemberKind::Method => descriptor::validate_method(&descriptor)?,
    }
    if name.is_empty() {
        return Err(DecodeError::descriptor(format!("empty {} name", kind.as_str())));
    }

    let (annotations, attributes) = read_attributes(cur, pool)?;
    Ok(Member {
        kind,
        access_flags,
        name,
        descriptor,
        annotations,
        attributes,
    })
}

fn read_attributes(
    cur: &mut Cursor<'_>,
    pool: &ConstantPool,
) -> Result<(AnnotationSet, Vec<AttributeSlot>)> {
    let count = cur.u16()?;
    let mut annotations = AnnotationSet::new();
    let mut slots = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let name = pool.utf8(cur.u16()?)?;
        let len = cur.u32()? as usize;
        let start = cur.offset;
        let info = cur.bytes(len)?;

        match Retention::from_attribute_name(&name) {
            Some(retention) if !slots.contains(&AttributeSlot::Annotations(retention)) => {
                let mut body = Cursor::new(info, start);
                let num = body.u16()?;
                for _ in 0..num {
                    let annotation = read_annotation(&mut body, pool, retention, 0)?;
                    if annotations.contains(&annotation.kind) {
                        log::debug!("Duplicate {} in {name} at offset {start}", annotation.kind);
                        return Err(DecodeError::DuplicateAnnotation(annotation.kind));
                    }
                    annotations.insert(annotation);
                }
                if body.remaining() > 0 {
                    return Err(DecodeError::AttributeLength {
                        name,
                        declared: len,
                        actual: len - body.remaining(),
                    });
                }
                slots.push(AttributeSlot::Annotations(retention));
            }
            _ => slots.push(AttributeSlot::Raw(RawAttribute {
                name,
                info: info.to_vec(),
            })),
        }
    }

    Ok((annotations, slots))
}

fn read_annotation(
    cur: &mut Cursor<'_>,
    pool: &ConstantPool,
    retention: Retention,
    depth: usize,
) -> Result<Annotation> {
    let kind = pool.utf8(cur.u16()?)?;
    descriptor::validate_object(&kind)?;

    let pairs = cur.u16()?;
    let mut elements = Vec::with_capacity(usize::from(pairs));
    for _ in 0..pairs {
        let name = pool.utf8(cur.u16()?)?;
        let value = read_element_value(cur, pool, retention, depth)?;
        elements.push((name, value));
    }

    Ok(Annotation {
        kind,
        retention,
        elements,
    })
}

fn read_element_value(
    cur: &mut Cursor<'_>,
    pool: &ConstantPool,
    retention: Retention,
    depth: usize,
) -> Result<ElementValue> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(DecodeError::NestingTooDeep(MAX_ELEMENT_DEPTH));
    }

    let tag = cur.u8()?;
    let value = match tag {
        b'B' => ElementValue::Byte(pool.integer(cur.u16()?)?),
        b'C' => ElementValue::Char(pool.integer(cur.u16()?)?),
        b'I' => ElementValue::Int(pool.integer(cur.u16()?)?),
        b'S' => ElementValue::Short(pool.integer(cur.u16()?)?),
        b'Z' => ElementValue::Boolean(pool.integer(cur.u16()?)?),
        b'J' => ElementValue::Long(pool.long(cur.u16()?)?),
        b'F' => ElementValue::Float(pool.float_bits(cur.u16()?)?),
        b'D' => ElementValue::Double(pool.double_bits(cur.u16()?)?),
        b's' => ElementValue::String(pool.utf8(cur.u16()?)?),
        b'e' => {
            let type_descriptor = pool.utf8(cur.u16()?)?;
            descriptor::validate_object(&type_descriptor)?;
            let constant = pool.utf8(cur.u16()?)?;
            ElementValue::Enum {
                type_descriptor,
                constant,
            }
        }
        b'c' => {
            let class = pool.utf8(cur.u16()?)?;
            descriptor::validate_return(&class)?;
            ElementValue::Class(class)
        }
        b'@' => ElementValue::Annotation(read_annotation(cur, pool, retention, depth + 1)?),
        b'[' => {
            let len = cur.u16()?;
            let mut values = Vec::with_capacity(usize::from(len));
            for _ in 0..len {
                values.push(read_element_value(cur, pool, retention, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => return Err(DecodeError::InvalidElementTag(char::from(other))),
    };
    Ok(value)
}
