use crate::annotation::{AnnotationSet, Retention};
use crate::descriptor;
use crate::pool::ConstantPool;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// `ACC_SUPER | ACC_PUBLIC`, the flags javac sets on a plain public class
pub const DEFAULT_CLASS_ACCESS: u16 = 0x0021;

/// Internal name (`com/example/Foo`) of a class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIdentity(pub String);

impl ClassIdentity {
    pub fn new(internal_name: impl Into<String>) -> Self {
        Self(internal_name.into())
    }

    #[must_use]
    pub fn internal_name(&self) -> &str {
        &self.0
    }

    /// Source form, `com/example/Foo$Bar` -> `com.example.Foo$Bar`
    #[must_use]
    pub fn java_name(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Relative path of the class file, `com/example/Foo.class`
    #[must_use]
    pub fn class_file_path(&self) -> String {
        format!("{}.class", self.0)
    }
}

impl Display for ClassIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.java_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

impl ClassVersion {
    /// Oldest version the codec accepts (JDK 1.1)
    pub const MIN_MAJOR: u16 = 45;
    /// Newest version the codec accepts (Java 25)
    pub const MAX_MAJOR: u16 = 69;

    #[must_use]
    pub const fn is_supported(self) -> bool {
        self.major >= Self::MIN_MAJOR && self.major <= Self::MAX_MAJOR
    }
}

impl Default for ClassVersion {
    /// Java 8
    fn default() -> Self {
        Self { major: 52, minor: 0 }
    }
}

/// An attribute kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttribute {
    pub name: String,
    pub info: Vec<u8>,
}

/// Position of an attribute in an attribute table.
///
/// Annotation attributes are decoded into the owner's [`AnnotationSet`]; their
/// slot remembers where to write them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeSlot {
    Annotations(Retention),
    Raw(RawAttribute),
}

impl AttributeSlot {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Annotations(retention) => retention.attribute_name(),
            Self::Raw(raw) => &raw.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Method,
}

impl MemberKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Method => "method",
        }
    }
}

/// Identity of a member: the matching key for grafting
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub kind: MemberKind,
    pub name: String,
    pub descriptor: String,
}

impl Display for MemberRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{}", self.kind.as_str(), self.name, self.descriptor)
    }
}

/// A field or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub kind: MemberKind,
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub annotations: AnnotationSet,
    /// Attribute table in file order; `Code` and friends are kept raw
    pub attributes: Vec<AttributeSlot>,
}

impl Member {
    fn new(kind: MemberKind, access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self {
            kind,
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            annotations: AnnotationSet::new(),
            attributes: Vec::new(),
        }
    }

    /// Create a field without attributes
    pub fn field(access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self::new(MemberKind::Field, access_flags, name, descriptor)
    }

    /// Create a method without attributes (abstract or native unless a `Code` attribute is added)
    pub fn method(access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self::new(MemberKind::Method, access_flags, name, descriptor)
    }

    #[must_use]
    pub fn member_ref(&self) -> MemberRef {
        MemberRef {
            kind: self.kind,
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Same kind, name and descriptor
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.descriptor == other.descriptor
    }

    /// Raw attribute by name, e.g. `Code`
    #[must_use]
    pub fn raw_attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.iter().find_map(|slot| match slot {
            AttributeSlot::Raw(raw) if raw.name == name => Some(raw),
            _ => None,
        })
    }

    /// Java-like rendering, `java.lang.String hmm` or `void run(int)`
    #[must_use]
    pub fn display_signature(&self) -> String {
        match self.kind {
            MemberKind::Field => format!("{} {}", descriptor::to_java_name(&self.descriptor), self.name),
            MemberKind::Method => {
                let (params, ret) = split_method_descriptor(&self.descriptor);
                let params: Vec<String> = params.iter().map(|p| descriptor::to_java_name(p)).collect();
                format!(
                    "{} {}({})",
                    descriptor::to_java_name(ret),
                    self.name,
                    params.join(", ")
                )
            }
        }
    }
}

/// Split an already validated method descriptor into parameter and return descriptors.
fn split_method_descriptor(desc: &str) -> (Vec<&str>, &str) {
    let Some(close) = desc.find(')') else {
        return (Vec::new(), desc);
    };
    let inner = &desc[1.min(close)..close];
    let bytes = inner.as_bytes();
    let mut params = Vec::new();
    let mut start = 0;
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'[' => {
                at += 1;
                continue;
            }
            b'L' => {
                at += inner[at..].find(';').map_or(bytes.len() - at, |end| end + 1);
            }
            _ => at += 1,
        }
        params.push(&inner[start..at]);
        start = at;
    }
    (params, &desc[close + 1..])
}

/// In-memory form of a compiled class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub version: ClassVersion,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub name: ClassIdentity,
    /// `None` only for `java/lang/Object` and module descriptors
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    /// Fields in declaration order, then methods in declaration order
    pub members: Vec<Member>,
    pub annotations: AnnotationSet,
    pub attributes: Vec<AttributeSlot>,
}

impl Artifact {
    /// Create an empty class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: ClassVersion::default(),
            constant_pool: ConstantPool::new(),
            access_flags: DEFAULT_CLASS_ACCESS,
            name: ClassIdentity::new(name),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            members: Vec::new(),
            annotations: AnnotationSet::new(),
            attributes: Vec::new(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.kind == MemberKind::Field)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.kind == MemberKind::Method)
    }

    /// Member with the given identity
    #[must_use]
    pub fn find_member(&self, kind: MemberKind, name: &str, descriptor: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.kind == kind && m.name == name && m.descriptor == descriptor)
    }

    /// Add a member, keeping fields ahead of methods
    pub fn push_member(&mut self, member: Member) {
        match member.kind {
            MemberKind::Method => self.members.push(member),
            MemberKind::Field => {
                let at = self
                    .members
                    .iter()
                    .position(|m| m.kind == MemberKind::Method)
                    .unwrap_or(self.members.len());
                self.members.insert(at, member);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_member_keeps_fields_first() {
        let mut artifact = Artifact::new("com/example/Foo");
        artifact.push_member(Member::method(0x0001, "run", "()V"));
        artifact.push_member(Member::field(0x0001, "hmm", "Ljava/lang/String;"));

        let kinds: Vec<_> = artifact.members.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MemberKind::Field, MemberKind::Method]);
    }

    #[test]
    fn test_display_signature() {
        let field = Member::field(0, "hmm", "Ljava/lang/String;");
        assert_eq!(field.display_signature(), "java.lang.String hmm");

        let method = Member::method(0, "put", "(I[Ljava/lang/String;J)Z");
        assert_eq!(method.display_signature(), "boolean put(int, java.lang.String[], long)");
    }

    #[test]
    fn test_identity_display() {
        let id = ClassIdentity::new("net/onedaybeard/graftt/FusedField$Foo");
        assert_eq!(id.to_string(), "net.onedaybeard.graftt.FusedField$Foo");
        assert_eq!(id.class_file_path(), "net/onedaybeard/graftt/FusedField$Foo.class");
    }
}
