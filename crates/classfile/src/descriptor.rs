//! Field and method descriptor syntax (JVMS §4.3).

use crate::error::{DecodeError, Result};

const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Validate a field descriptor such as `I`, `[J` or `Ljava/lang/String;`.
pub fn validate_field(descriptor: &str) -> Result<()> {
    match parse_field_type(descriptor.as_bytes(), 0) {
        Some(end) if end == descriptor.len() => Ok(()),
        _ => Err(DecodeError::descriptor(descriptor)),
    }
}

/// Validate a method descriptor such as `(ILjava/lang/String;)V`.
pub fn validate_method(descriptor: &str) -> Result<()> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(DecodeError::descriptor(descriptor));
    }

    let mut at = 1;
    while bytes.get(at).is_some_and(|&b| b != b')') {
        at = parse_field_type(bytes, at).ok_or_else(|| DecodeError::descriptor(descriptor))?;
    }
    if bytes.get(at) != Some(&b')') {
        return Err(DecodeError::descriptor(descriptor));
    }
    at += 1;

    let end = if bytes.get(at) == Some(&b'V') {
        Some(at + 1)
    } else {
        parse_field_type(bytes, at)
    };
    match end {
        Some(end) if end == bytes.len() => Ok(()),
        _ => Err(DecodeError::descriptor(descriptor)),
    }
}

/// Validate an object type descriptor (`Lpkg/Name;`), the form used for annotation kinds.
pub fn validate_object(descriptor: &str) -> Result<()> {
    if descriptor.starts_with('L') {
        validate_field(descriptor)
    } else {
        Err(DecodeError::descriptor(descriptor))
    }
}

/// Validate a class literal descriptor: any field type or `V`.
pub fn validate_return(descriptor: &str) -> Result<()> {
    if descriptor == "V" {
        Ok(())
    } else {
        validate_field(descriptor)
    }
}

/// Validate an internal class name such as `java/lang/Object`.
///
/// Array classes are named by their descriptor (`[Ljava/lang/String;`).
pub fn validate_internal_name(name: &str) -> Result<()> {
    if name.starts_with('[') {
        return validate_field(name);
    }
    if is_valid_class_name(name.as_bytes()) {
        Ok(())
    } else {
        Err(DecodeError::descriptor(name))
    }
}

/// Internal name of an object type descriptor, `Lcom/Foo;` -> `com/Foo`.
pub fn object_internal_name(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('L')?.strip_suffix(';')
}

/// Human readable source form of a descriptor, `[Ljava/lang/String;` -> `java.lang.String[]`.
pub fn to_java_name(descriptor: &str) -> String {
    let dims = descriptor.bytes().take_while(|&b| b == b'[').count();
    let element = &descriptor[dims..];
    let base = match element {
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "D" => "double".to_string(),
        "F" => "float".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "S" => "short".to_string(),
        "Z" => "boolean".to_string(),
        "V" => "void".to_string(),
        other => object_internal_name(other)
            .unwrap_or(other)
            .replace('/', "."),
    };
    format!("{base}{}", "[]".repeat(dims))
}

/// Parse one field type starting at `at`, returning the index just past it.
fn parse_field_type(bytes: &[u8], mut at: usize) -> Option<usize> {
    let start = at;
    while bytes.get(at) == Some(&b'[') {
        at += 1;
    }
    if at - start > MAX_ARRAY_DIMENSIONS {
        return None;
    }

    match bytes.get(at)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(at + 1),
        b'L' => {
            let name_start = at + 1;
            let len = bytes[name_start..].iter().position(|&b| b == b';')?;
            let name = &bytes[name_start..name_start + len];
            is_valid_class_name(name).then_some(name_start + len + 1)
        }
        _ => None,
    }
}

fn is_valid_class_name(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .split(|&b| b == b'/')
            .all(|segment| !segment.is_empty() && !segment.iter().any(|b| b".;[".contains(b)))
}
