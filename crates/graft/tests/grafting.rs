mod common;

use common::*;
use graftt_classfile::{decode, Annotation, ClassIdentity, ElementValue, Member, MemberKind, Retention};
use graftt_core::{
    ArtifactSink, AttemptState, Diagnostic, DonorInput, FuseMismatch, GraftConfig, GraftError,
    Grafter, Outcome, FUSE_MARKER,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Mutex;

fn grafter() -> Grafter {
    Grafter::new(GraftConfig::sequential()).expect("valid config")
}

fn source(recipient: &graftt_classfile::Artifact) -> HashMap<ClassIdentity, Vec<u8>> {
    HashMap::from([(foo_identity(), bytes(recipient))])
}

#[derive(Default)]
struct MemorySink(Mutex<Vec<(ClassIdentity, Vec<u8>)>>);

impl ArtifactSink for MemorySink {
    fn accept(&self, recipient: &ClassIdentity, bytes: &[u8]) -> anyhow::Result<()> {
        self.0
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push((recipient.clone(), bytes.to_vec()));
        Ok(())
    }
}

#[test]
fn fuse_marked_field_gains_other_annotations() {
    let original = foo(vec![]);
    let donor = transplant(
        "FooTransplant",
        vec![(
            "hmm",
            vec![Annotation::new(NONNULL, Retention::Visible), json("HMM")],
        )],
    );

    let report = grafter().graft(&bytes(&donor), &bytes(&original));
    let (recipient, rewritten) = report.encoded().expect("encoded");
    assert_eq!(recipient, &foo_identity());

    let rewritten = decode(rewritten).expect("valid output");
    let hmm = rewritten
        .find_member(MemberKind::Field, "hmm", STRING)
        .expect("hmm survives");
    let kinds: Vec<_> = hmm.annotations.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, vec![NONNULL, JSON]);
    assert_eq!(hmm.annotations.get(JSON), Some(&json("HMM")));
    assert!(!hmm.annotations.contains(FUSE_MARKER));

    // executable content and member layout are untouched
    let identities: Vec<_> = rewritten.members.iter().map(Member::member_ref).collect();
    let before: Vec<_> = original.members.iter().map(Member::member_ref).collect();
    assert_eq!(identities, before);
    assert_eq!(
        rewritten.members[1].raw_attribute("Code"),
        original.members[1].raw_attribute("Code")
    );
    assert!(rewritten.members[2].annotations.is_empty());

    assert!(matches!(
        report.diagnostics.as_slice(),
        [Diagnostic::Fused { fused_members: 1, .. }, Diagnostic::Encoded { .. }]
    ));
}

#[test]
fn unmatched_fuse_member_fails_and_emits_nothing() {
    let donor = transplant("FooWrongTransplant", vec![("ohNo", vec![json("x")])]);
    let batch = grafter().run_batch(
        &[DonorInput::new("FooWrongTransplant.class", bytes(&donor))],
        &source(&foo(vec![])),
    );

    let attempt = &batch.attempts[0];
    assert_eq!(
        attempt.states,
        vec![AttemptState::Pending, AttemptState::Resolved, AttemptState::Failed]
    );
    let expected = vec![FuseMismatch::Unmatched {
        member: Member::field(0x0001, "ohNo", STRING).member_ref(),
    }];
    assert_eq!(
        attempt.outcome,
        Outcome::Failed(GraftError::UnmatchedFuseMembers(expected.clone()))
    );
    assert_eq!(attempt.diagnostics, vec![Diagnostic::Unmatched { members: expected }]);

    let sink = MemorySink::default();
    assert_eq!(batch.emit(&sink).unwrap(), 0);
    assert!(sink.0.lock().unwrap().is_empty());
}

#[test]
fn every_unmatched_member_is_reported_at_once() {
    let donor = transplant(
        "FooTransplant",
        vec![
            ("ohNo", vec![json("a")]),
            ("hmm", vec![json("b")]),
            ("stillNo", vec![json("c")]),
        ],
    );
    let report = grafter().graft(&bytes(&donor), &bytes(&foo(vec![])));

    let Some(GraftError::UnmatchedFuseMembers(mismatches)) = report.error() else {
        panic!("expected unmatched members, got {:?}", report.outcome);
    };
    let names: Vec<_> = mismatches.iter().map(|m| m.member().name.as_str()).collect();
    assert_eq!(names, vec!["ohNo", "stillNo"]);
    assert!(report.encoded().is_none());
}

#[test]
fn method_fusion_requires_identical_descriptor() {
    let mut donor = transplant("FooTransplant", vec![]);
    let mut greet = Member::method(0x0001, "greet", "(J)Ljava/lang/String;");
    greet.annotations.insert(fuse());
    greet.annotations.insert(json("greeting"));
    donor.push_member(greet);

    let report = grafter().graft(&bytes(&donor), &bytes(&foo(vec![])));
    assert!(report.is_failed(), "long overload does not exist on Foo");

    donor.members[0].descriptor = "(I)Ljava/lang/String;".to_string();
    let report = grafter().graft(&bytes(&donor), &bytes(&foo(vec![])));
    let rewritten = decode(report.encoded().expect("encoded").1).unwrap();
    let greet = rewritten
        .find_member(MemberKind::Method, "greet", "(I)Ljava/lang/String;")
        .unwrap();
    assert_eq!(greet.annotations.get(JSON), Some(&json("greeting")));
}

#[test]
fn donor_wins_conflicts_and_output_is_deterministic() {
    let original = foo(vec![
        json("old"),
        Annotation::new("Lcom/example/Keep;", Retention::Invisible),
    ]);
    let donor = transplant("FooTransplant", vec![("hmm", vec![json("new")])]);

    let first = grafter().graft(&bytes(&donor), &bytes(&original));
    let second = grafter().graft(&bytes(&donor), &bytes(&original));
    let first_bytes = first.encoded().expect("encoded").1.to_vec();
    assert_eq!(first_bytes, second.encoded().expect("encoded").1);

    match &first.diagnostics[0] {
        Diagnostic::Fused {
            added, overwritten, ..
        } => {
            assert!(added.is_empty());
            assert_eq!(overwritten, &vec![JSON.to_string()]);
        }
        other => panic!("unexpected diagnostic {other:?}"),
    }

    let hmm = decode(&first_bytes).unwrap().members[0].clone();
    let kinds: Vec<_> = hmm.annotations.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, vec![JSON, "Lcom/example/Keep;"]);
    assert_eq!(hmm.annotations.get(JSON), Some(&json("new")));

    // grafting onto the already grafted class changes nothing
    let again = grafter().graft(&bytes(&donor), &first_bytes);
    assert_eq!(again.encoded().expect("encoded").1, first_bytes.as_slice());
}

#[test]
fn batch_skips_non_transplants_and_keeps_order() {
    let plain = foo(vec![]);
    let donor = transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]);
    let donors = vec![
        DonorInput::new("Foo.class", bytes(&plain)),
        DonorInput::new("garbage.class", vec![0xCA, 0xFE]),
        DonorInput::new("FooTransplant.class", bytes(&donor)),
    ];

    let parallel = Grafter::new(GraftConfig::default()).unwrap();
    let batch = parallel.run_batch(&donors, &source(&plain));

    let states: Vec<_> = batch.attempts.iter().map(|a| (a.donor.as_str(), a.state())).collect();
    assert_eq!(
        states,
        vec![
            ("Foo.class", AttemptState::Skipped),
            ("garbage.class", AttemptState::Failed),
            ("FooTransplant.class", AttemptState::Encoded),
        ]
    );
    assert!(matches!(batch.attempts[0].diagnostics[0], Diagnostic::Skipped { .. }));

    let summary = batch.summary();
    assert_eq!((summary.encoded, summary.skipped, summary.failed), (1, 1, 1));
    assert!(batch.has_failures());

    let sink = MemorySink::default();
    assert_eq!(batch.emit(&sink).unwrap(), 1);
    assert_eq!(sink.0.lock().unwrap()[0].0, foo_identity());
}

#[test]
fn missing_recipient_fails_after_resolution() {
    let donor = transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]);
    let batch = grafter().run_batch(&[DonorInput::new("d", bytes(&donor))], &HashMap::<ClassIdentity, Vec<u8>>::new());

    let attempt = &batch.attempts[0];
    assert_eq!(attempt.recipient, Some(foo_identity()));
    assert!(matches!(
        attempt.error(),
        Some(GraftError::RecipientUnavailable(identity, _)) if identity == &foo_identity()
    ));
}

#[test]
fn class_level_fuse_marker_fuses_class_annotations() {
    let mut donor = transplant("FooTransplant", vec![]);
    donor.annotations.insert(fuse());
    donor.annotations.insert(
        Annotation::new("Lcom/example/Table;", Retention::Visible)
            .with("names", ElementValue::Array(vec![
                ElementValue::String("foo".into()),
                ElementValue::String("bar".into()),
            ])),
    );

    let report = grafter().graft(&bytes(&donor), &bytes(&foo(vec![])));
    let rewritten = decode(report.encoded().expect("encoded").1).unwrap();
    let kinds: Vec<_> = rewritten.annotations.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, vec!["Lcom/example/Table;"]);
}

#[test]
fn class_annotations_are_ignored_without_class_level_marker() {
    let mut donor = transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]);
    donor.annotations.insert(json("class"));

    let report = grafter().graft(&bytes(&donor), &bytes(&foo(vec![])));
    let rewritten = decode(report.encoded().expect("encoded").1).unwrap();
    assert!(rewritten.annotations.is_empty());
}

#[test]
fn batch_until_stops_after_first_failure() {
    let wrong = transplant("FooWrongTransplant", vec![("ohNo", vec![json("x")])]);
    let good = transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]);
    let donors = vec![
        DonorInput::new("wrong", bytes(&wrong)),
        DonorInput::new("good", bytes(&good)),
    ];

    let batch = grafter().run_batch_until(&donors, &source(&foo(vec![])), |a| a.is_failed());
    assert_eq!(batch.attempts.len(), 1);
    assert_eq!(batch.attempts[0].donor, "wrong");
}

#[test]
fn mismatched_recipient_bytes_fail() {
    let donor = transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]);
    let mut other = foo(vec![]);
    other.name = ClassIdentity::new("com/example/Other");

    let report = grafter().graft(&bytes(&donor), &bytes(&other));
    assert!(matches!(report.error(), Some(GraftError::RecipientMismatch { .. })));
}

fn greet_transplant() -> graftt_classfile::Artifact {
    let mut donor = transplant("FooGreetTransplant", vec![]);
    let mut greet = Member::method(0x0001, "greet", "(I)Ljava/lang/String;");
    greet.annotations.insert(fuse());
    greet.annotations.insert(Annotation::new(NONNULL, Retention::Visible));
    donor.push_member(greet);
    donor
}

#[test]
fn transplants_sharing_a_recipient_accumulate() {
    let plain = foo(vec![]);
    let donors = vec![
        DonorInput::new("FooTransplant.class", bytes(&transplant("FooTransplant", vec![("hmm", vec![json("HMM")])]))),
        DonorInput::new("Foo.class", bytes(&plain)),
        DonorInput::new("FooGreetTransplant.class", bytes(&greet_transplant())),
    ];

    for config in [GraftConfig::default(), GraftConfig::sequential()] {
        let batch = Grafter::new(config).unwrap().run_batch(&donors, &source(&plain));
        let states: Vec<_> = batch.attempts.iter().map(|a| a.state()).collect();
        assert_eq!(
            states,
            vec![AttemptState::Encoded, AttemptState::Skipped, AttemptState::Encoded]
        );
        match &batch.attempts[2].diagnostics[0] {
            Diagnostic::Fused { added, overwritten, .. } => {
                assert_eq!(added, &vec![NONNULL.to_string()]);
                assert!(overwritten.is_empty());
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }

        let sink = MemorySink::default();
        assert_eq!(batch.emit(&sink).unwrap(), 2);
        let stored = sink.0.lock().unwrap();
        let (recipient, last) = stored.last().expect("written");
        assert_eq!(recipient, &foo_identity());

        let stored = decode(last).unwrap();
        let hmm = stored.find_member(MemberKind::Field, "hmm", STRING).unwrap();
        assert_eq!(hmm.annotations.get(JSON), Some(&json("HMM")));
        let greet = stored
            .find_member(MemberKind::Method, "greet", "(I)Ljava/lang/String;")
            .unwrap();
        assert!(greet.annotations.contains(NONNULL));
    }
}

#[test]
fn later_transplant_overwrites_earlier_one_visibly() {
    let plain = foo(vec![]);
    let donors = vec![
        DonorInput::new("first", bytes(&transplant("FooTransplant", vec![("hmm", vec![json("first")])]))),
        DonorInput::new("second", bytes(&transplant("FooOtherTransplant", vec![("hmm", vec![json("second")])]))),
    ];

    let batch = Grafter::new(GraftConfig::default()).unwrap().run_batch(&donors, &source(&plain));
    assert_eq!(batch.summary().overwritten, 1);
    match &batch.attempts[1].diagnostics[0] {
        Diagnostic::Fused { overwritten, .. } => assert_eq!(overwritten, &vec![JSON.to_string()]),
        other => panic!("unexpected diagnostic {other:?}"),
    }

    let (_, last) = batch.encoded().last().expect("encoded");
    let hmm = decode(last).unwrap().members[0].clone();
    assert_eq!(hmm.annotations.get(JSON), Some(&json("second")));
}
