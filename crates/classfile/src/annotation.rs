use serde::{Deserialize, Serialize};

/// Which annotation attribute an annotation is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// `RuntimeVisibleAnnotations` (`RetentionPolicy.RUNTIME`)
    Visible,
    /// `RuntimeInvisibleAnnotations` (`RetentionPolicy.CLASS`)
    Invisible,
}

impl Retention {
    #[must_use]
    pub const fn attribute_name(self) -> &'static str {
        match self {
            Self::Visible => "RuntimeVisibleAnnotations",
            Self::Invisible => "RuntimeInvisibleAnnotations",
        }
    }

    #[must_use]
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        match name {
            "RuntimeVisibleAnnotations" => Some(Self::Visible),
            "RuntimeInvisibleAnnotations" => Some(Self::Invisible),
            _ => None,
        }
    }
}

/// Literal value of an annotation element.
///
/// Byte, char, short and boolean values are stored as the `int` constant the
/// class file holds; floating point values are stored as their bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ElementValue {
    Byte(i32),
    Char(i32),
    Int(i32),
    Short(i32),
    Boolean(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    Enum {
        type_descriptor: String,
        constant: String,
    },
    /// Class literal, as a return descriptor (`Ljava/lang/String;`, `I`, `V`)
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Byte(_) => b'B',
            Self::Char(_) => b'C',
            Self::Int(_) => b'I',
            Self::Short(_) => b'S',
            Self::Boolean(_) => b'Z',
            Self::Long(_) => b'J',
            Self::Float(_) => b'F',
            Self::Double(_) => b'D',
            Self::String(_) => b's',
            Self::Enum { .. } => b'e',
            Self::Class(_) => b'c',
            Self::Annotation(_) => b'@',
            Self::Array(_) => b'[',
        }
    }

    #[must_use]
    pub fn float(value: f32) -> Self {
        Self::Float(value.to_bits())
    }

    #[must_use]
    pub fn double(value: f64) -> Self {
        Self::Double(value.to_bits())
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Boolean(i32::from(value))
    }

    fn set_retention(&mut self, retention: Retention) {
        match self {
            Self::Annotation(nested) => {
                nested.retention = retention;
                nested.normalize_nested();
            }
            Self::Array(values) => {
                for value in values {
                    value.set_retention(retention);
                }
            }
            _ => {}
        }
    }
}

/// A single annotation: its kind (type descriptor), retention and ordered elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation type descriptor, e.g. `Ljavax/annotation/Nonnull;`
    pub kind: String,
    /// Nested annotations share the retention of the annotation that holds them;
    /// [`AnnotationSet::insert`] rewrites theirs to match.
    pub retention: Retention,
    /// Element name/value pairs in declaration order
    #[serde(default)]
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    /// Create an annotation without elements
    pub fn new(kind: impl Into<String>, retention: Retention) -> Self {
        Self {
            kind: kind.into(),
            retention,
            elements: Vec::new(),
        }
    }

    /// Builder: append an element
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.elements.push((name.into(), value));
        self
    }

    /// Give every nested annotation this annotation's retention
    fn normalize_nested(&mut self) {
        let retention = self.retention;
        for (_, value) in &mut self.elements {
            value.set_retention(retention);
        }
    }

    /// Value of the element called `name`
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(element, _)| element == name)
            .map(|(_, value)| value)
    }
}

/// Ordered annotations keyed by kind; a kind appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet {
    entries: Vec<Annotation>,
}

impl AnnotationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.entries.iter()
    }

    /// Annotations stored with the given retention, in order
    pub fn with_retention(&self, retention: Retention) -> impl Iterator<Item = &Annotation> {
        self.entries
            .iter()
            .filter(move |annotation| annotation.retention == retention)
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Annotation> {
        self.entries.iter().find(|annotation| annotation.kind == kind)
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    /// Insert an annotation, replacing an existing one of the same kind in place.
    ///
    /// Returns the replaced annotation.
    pub fn insert(&mut self, mut annotation: Annotation) -> Option<Annotation> {
        annotation.normalize_nested();
        match self
            .entries
            .iter()
            .position(|existing| existing.kind == annotation.kind)
        {
            Some(index) => Some(std::mem::replace(&mut self.entries[index], annotation)),
            None => {
                self.entries.push(annotation);
                None
            }
        }
    }

    pub fn remove(&mut self, kind: &str) -> Option<Annotation> {
        let index = self.entries.iter().position(|a| a.kind == kind)?;
        Some(self.entries.remove(index))
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONNULL: &str = "Ljavax/annotation/Nonnull;";
    const NAMED: &str = "Lcom/example/Named;";

    #[test]
    fn test_insert_replaces_same_kind_in_place() {
        let mut set = AnnotationSet::new();
        set.insert(Annotation::new(NONNULL, Retention::Visible));
        set.insert(Annotation::new(NAMED, Retention::Visible).with("value", ElementValue::String("a".into())));

        let replaced = set.insert(
            Annotation::new(NAMED, Retention::Visible).with("value", ElementValue::String("b".into())),
        );

        assert_eq!(
            replaced.and_then(|a| a.element("value").cloned()),
            Some(ElementValue::String("a".into()))
        );
        let kinds: Vec<_> = set.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec![NONNULL, NAMED]);
        assert_eq!(
            set.get(NAMED).and_then(|a| a.element("value")),
            Some(&ElementValue::String("b".into()))
        );
    }

    #[test]
    fn test_with_retention_filters() {
        let mut set = AnnotationSet::new();
        set.insert(Annotation::new(NONNULL, Retention::Invisible));
        set.insert(Annotation::new(NAMED, Retention::Visible));

        let visible: Vec<_> = set.with_retention(Retention::Visible).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].kind, NAMED);
    }

    #[test]
    fn test_insert_gives_nested_annotations_outer_retention() {
        let inner = Annotation::new(NAMED, Retention::Visible);
        let outer = Annotation::new(NONNULL, Retention::Invisible)
            .with("one", ElementValue::Annotation(inner.clone()))
            .with("many", ElementValue::Array(vec![ElementValue::Annotation(inner)]));

        let mut set = AnnotationSet::new();
        set.insert(outer);

        let stored = set.get(NONNULL).unwrap();
        let Some(ElementValue::Annotation(one)) = stored.element("one") else {
            panic!("nested annotation expected");
        };
        assert_eq!(one.retention, Retention::Invisible);
        let Some(ElementValue::Array(many)) = stored.element("many") else {
            panic!("array expected");
        };
        assert_eq!(many, &vec![ElementValue::Annotation(Annotation::new(NAMED, Retention::Invisible))]);
    }
}
