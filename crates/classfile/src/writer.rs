use crate::annotation::{Annotation, AnnotationSet, ElementValue, Retention};
use crate::error::EncodeError;
use crate::pool::{Constant, ConstantPool};
use crate::types::{Artifact, AttributeSlot, Member, MemberKind};
use bytes::BufMut;

type Result<T> = std::result::Result<T, EncodeError>;

const MAGIC: u32 = 0xCAFE_BABE;

/// Encode an [`Artifact`] back into class file bytes.
///
/// The artifact's constant pool is copied and only ever appended to, so
/// existing indices (and every verbatim attribute referencing them) stay
/// valid. An unmodified artifact encodes to the bytes it was decoded from.
pub fn encode(artifact: &Artifact) -> Result<Vec<u8>> {
    let mut pool = artifact.constant_pool.clone();
    let mut body = Vec::new();

    body.put_u16(artifact.access_flags);
    body.put_u16(pool.intern_class(artifact.name.internal_name())?);
    let super_index = match &artifact.super_name {
        Some(super_name) => pool.intern_class(super_name)?,
        None => 0,
    };
    body.put_u16(super_index);

    body.put_u16(table_len("interfaces", artifact.interfaces.len())?);
    for interface in &artifact.interfaces {
        body.put_u16(pool.intern_class(interface)?);
    }

    for (kind, table) in [(MemberKind::Field, "fields"), (MemberKind::Method, "methods")] {
        let members: Vec<&Member> = artifact.members.iter().filter(|m| m.kind == kind).collect();
        body.put_u16(table_len(table, members.len())?);
        for member in members {
            write_member(&mut body, &mut pool, member)?;
        }
    }

    write_attributes(&mut body, &mut pool, &artifact.annotations, &artifact.attributes)?;

    let mut out = Vec::with_capacity(body.len() + 10 + pool.count() * 8);
    out.put_u32(MAGIC);
    out.put_u16(artifact.version.minor);
    out.put_u16(artifact.version.major);
    write_constant_pool(&mut out, &pool)?;
    out.extend_from_slice(&body);

    log::debug!(
        "Encoded {}: {} bytes, {} pool slots ({} added)",
        artifact.name.internal_name(),
        out.len(),
        pool.count(),
        pool.count() - artifact.constant_pool.count()
    );
    Ok(out)
}

fn table_len(table: &'static str, count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| EncodeError::TableTooLarge { table, count })
}

fn write_constant_pool(out: &mut Vec<u8>, pool: &ConstantPool) -> Result<()> {
    out.put_u16(table_len("constant_pool", pool.count())?);
    for (_, constant) in pool.iter() {
        out.put_u8(constant.tag());
        match constant {
            Constant::Utf8(bytes) => {
                out.put_u16(
                    u16::try_from(bytes.len())
                        .map_err(|_| EncodeError::StringTooLong(bytes.len()))?,
                );
                out.extend_from_slice(bytes);
            }
            Constant::Integer(value) => out.put_i32(*value),
            Constant::Float(bits) => out.put_u32(*bits),
            Constant::Long(value) => out.put_i64(*value),
            Constant::Double(bits) => out.put_u64(*bits),
            Constant::Class(index)
            | Constant::String(index)
            | Constant::MethodType(index)
            | Constant::Module(index)
            | Constant::Package(index) => out.put_u16(*index),
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
                out.put_u16(*class);
                out.put_u16(*name_and_type);
            }
            Constant::NameAndType { name, descriptor } => {
                out.put_u16(*name);
                out.put_u16(*descriptor);
            }
            Constant::MethodHandle { kind, reference } => {
                out.put_u8(*kind);
                out.put_u16(*reference);
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                out.put_u16(*bootstrap);
                out.put_u16(*name_and_type);
            }
        }
    }
    Ok(())
}

fn write_member(out: &mut Vec<u8>, pool: &mut ConstantPool, member: &Member) -> Result<()> {
    out.put_u16(member.access_flags);
    out.put_u16(pool.intern_utf8(&member.name)?);
    out.put_u16(pool.intern_utf8(&member.descriptor)?);
    write_attributes(out, pool, &member.annotations, &member.attributes)
}

/// Write an attribute table. Annotation attributes go back to their original
/// slot; annotations without a slot get a new attribute at the end of the table.
fn write_attributes(
    out: &mut Vec<u8>,
    pool: &mut ConstantPool,
    annotations: &AnnotationSet,
    slots: &[AttributeSlot],
) -> Result<()> {
    let mut encoded: Vec<(u16, Vec<u8>)> = Vec::with_capacity(slots.len() + 1);
    let mut placed = Vec::with_capacity(2);

    for slot in slots {
        match slot {
            AttributeSlot::Raw(raw) => {
                encoded.push((pool.intern_utf8(&raw.name)?, raw.info.clone()));
            }
            AttributeSlot::Annotations(retention) => {
                placed.push(*retention);
                if let Some(attribute) = annotation_attribute(pool, annotations, *retention)? {
                    encoded.push(attribute);
                }
            }
        }
    }

    for retention in [Retention::Visible, Retention::Invisible] {
        if !placed.contains(&retention) {
            if let Some(attribute) = annotation_attribute(pool, annotations, retention)? {
                encoded.push(attribute);
            }
        }
    }

    out.put_u16(table_len("attributes", encoded.len())?);
    for (name, info) in encoded {
        out.put_u16(name);
        let len = u32::try_from(info.len()).map_err(|_| {
            EncodeError::AttributeTooLarge(format!("#{name} ({} bytes)", info.len()))
        })?;
        out.put_u32(len);
        out.extend_from_slice(&info);
    }
    Ok(())
}

/// Encode the annotations of one retention; `None` when there are none
fn annotation_attribute(
    pool: &mut ConstantPool,
    annotations: &AnnotationSet,
    retention: Retention,
) -> Result<Option<(u16, Vec<u8>)>> {
    let selected: Vec<&Annotation> = annotations.with_retention(retention).collect();
    if selected.is_empty() {
        return Ok(None);
    }

    let name = pool.intern_utf8(retention.attribute_name())?;
    let mut info = Vec::new();
    info.put_u16(table_len("annotations", selected.len())?);
    for annotation in selected {
        write_annotation(&mut info, pool, annotation)?;
    }
    Ok(Some((name, info)))
}

fn write_annotation(out: &mut Vec<u8>, pool: &mut ConstantPool, annotation: &Annotation) -> Result<()> {
    out.put_u16(pool.intern_utf8(&annotation.kind)?);
    out.put_u16(table_len("element_value_pairs", annotation.elements.len())?);
    for (name, value) in &annotation.elements {
        out.put_u16(pool.intern_utf8(name)?);
        write_element_value(out, pool, value)?;
    }
    Ok(())
}

fn write_element_value(out: &mut Vec<u8>, pool: &mut ConstantPool, value: &ElementValue) -> Result<()> {
    out.put_u8(value.tag());
    match value {
        ElementValue::Byte(v)
        | ElementValue::Char(v)
        | ElementValue::Int(v)
        | ElementValue::Short(v)
        | ElementValue::Boolean(v) => out.put_u16(pool.intern(Constant::Integer(*v))?),
        ElementValue::Long(v) => out.put_u16(pool.intern(Constant::Long(*v))?),
        ElementValue::Float(bits) => out.put_u16(pool.intern(Constant::Float(*bits))?),
        ElementValue::Double(bits) => out.put_u16(pool.intern(Constant::Double(*bits))?),
        ElementValue::String(s) => out.put_u16(pool.intern_utf8(s)?),
        ElementValue::Enum {
            type_descriptor,
            constant,
        } => {
            out.put_u16(pool.intern_utf8(type_descriptor)?);
            out.put_u16(pool.intern_utf8(constant)?);
        }
        ElementValue::Class(descriptor) => out.put_u16(pool.intern_utf8(descriptor)?),
        ElementValue::Annotation(nested) => write_annotation(out, pool, nested)?,
        ElementValue::Array(values) => {
            out.put_u16(table_len("array_value", values.len())?);
            for value in values {
                write_element_value(out, pool, value)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::decode;

    #[test]
    fn test_minimal_class_roundtrip() {
        let artifact = Artifact::new("com/example/Empty");
        let bytes = encode(&artifact).unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.name, artifact.name);
        assert_eq!(decoded.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_new_annotations_are_appended_after_raw_attributes() {
        let mut artifact = Artifact::new("com/example/Foo");
        let mut field = Member::field(0x0001, "hmm", "Ljava/lang/String;");
        field.attributes.push(AttributeSlot::Raw(crate::types::RawAttribute {
            name: "Synthetic".to_string(),
            info: Vec::new(),
        }));
        field
            .annotations
            .insert(Annotation::new("Ljavax/annotation/Nonnull;", Retention::Visible));
        artifact.push_member(field);

        let decoded = decode(&encode(&artifact).unwrap()).unwrap();
        let names: Vec<_> = decoded.members[0].attributes.iter().map(AttributeSlot::name).collect();
        assert_eq!(names, vec!["Synthetic", "RuntimeVisibleAnnotations"]);
    }

    #[test]
    fn test_emptied_annotation_attribute_is_dropped() {
        let mut artifact = Artifact::new("com/example/Foo");
        artifact
            .annotations
            .insert(Annotation::new("Ljava/lang/Deprecated;", Retention::Visible));
        let mut decoded = decode(&encode(&artifact).unwrap()).unwrap();
        decoded.annotations.remove("Ljava/lang/Deprecated;");

        let again = decode(&encode(&decoded).unwrap()).unwrap();
        assert!(again.attributes.is_empty());
        assert!(again.annotations.is_empty());
    }
}
