#![allow(dead_code)]

use graftt_classfile::{
    encode, Annotation, Artifact, AttributeSlot, ClassIdentity, Constant, ElementValue, Member,
    RawAttribute, Retention,
};
use graftt_core::{FUSE_MARKER, RECIPIENT_MARKER};

pub const FOO: &str = "net/onedaybeard/graftt/FusedField$Foo";
pub const NONNULL: &str = "Ljavax/annotation/Nonnull;";
pub const JSON: &str = "Lcom/example/Json;";
pub const STRING: &str = "Ljava/lang/String;";

pub fn json(name: &str) -> Annotation {
    Annotation::new(JSON, Retention::Visible).with("name", ElementValue::String(name.into()))
}

pub fn fuse() -> Annotation {
    Annotation::new(FUSE_MARKER, Retention::Invisible)
}

pub fn recipient_marker(target: &str) -> Annotation {
    Annotation::new(RECIPIENT_MARKER, Retention::Invisible)
        .with("value", ElementValue::Class(format!("L{target};")))
}

/// `Code` of `public Foo() { super(); }` against the given Methodref index
pub fn init_code(methodref: u16) -> Vec<u8> {
    let [hi, lo] = methodref.to_be_bytes();
    vec![
        0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x2a, 0xb7, hi, lo, 0xb1, 0x00, 0x00,
        0x00, 0x00,
    ]
}

/// ```java
/// class Foo {
///     public String hmm;
///     public String greet(int times) { ... }
/// }
/// ```
pub fn foo(hmm_annotations: Vec<Annotation>) -> Artifact {
    let mut foo = Artifact::new(FOO);
    let pool = &mut foo.constant_pool;
    let object = pool.intern_class("java/lang/Object").unwrap();
    let init = pool.intern_utf8("<init>").unwrap();
    let void = pool.intern_utf8("()V").unwrap();
    let nat = pool
        .intern(Constant::NameAndType {
            name: init,
            descriptor: void,
        })
        .unwrap();
    let methodref = pool
        .intern(Constant::MethodRef {
            class: object,
            name_and_type: nat,
        })
        .unwrap();

    let mut hmm = Member::field(0x0001, "hmm", STRING);
    for annotation in hmm_annotations {
        hmm.annotations.insert(annotation);
    }
    foo.push_member(hmm);

    let mut ctor = Member::method(0x0001, "<init>", "()V");
    ctor.attributes.push(AttributeSlot::Raw(RawAttribute {
        name: "Code".to_string(),
        info: init_code(methodref),
    }));
    foo.push_member(ctor);
    foo.push_member(Member::method(0x0001, "greet", "(I)Ljava/lang/String;"));
    foo
}

/// A donor named `name` targeting Foo with one fuse-marked field per entry
pub fn transplant(name: &str, fields: Vec<(&str, Vec<Annotation>)>) -> Artifact {
    let mut donor = Artifact::new(format!("net/onedaybeard/graftt/FusedField${name}"));
    donor.annotations.insert(recipient_marker(FOO));
    for (field, annotations) in fields {
        let mut member = Member::field(0x0001, field, STRING);
        member.annotations.insert(fuse());
        for annotation in annotations {
            member.annotations.insert(annotation);
        }
        donor.push_member(member);
    }
    donor
}

pub fn bytes(artifact: &Artifact) -> Vec<u8> {
    encode(artifact).expect("encode fixture")
}

pub fn foo_identity() -> ClassIdentity {
    ClassIdentity::new(FOO)
}
