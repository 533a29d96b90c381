use crate::config::GraftConfig;
use crate::error::{GraftError, Result};
use crate::matcher::MatchedMember;
use graftt_classfile::{Annotation, AnnotationSet, Artifact, Member, MemberRef};
use serde::Serialize;

/// Where an annotation was fused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "target", content = "member")]
pub enum FusionTarget {
    Class,
    Member(MemberRef),
}

impl std::fmt::Display for FusionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Member(member) => write!(f, "{member}"),
        }
    }
}

/// One annotation kind written onto the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FusedAnnotation {
    pub target: FusionTarget,
    pub kind: String,
}

/// What a fusion pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FusionReport {
    /// Kinds the recipient did not have before
    pub added: Vec<FusedAnnotation>,
    /// Kinds the recipient had with different values; the donor's replaced them
    pub overwritten: Vec<FusedAnnotation>,
    /// Kinds the recipient already had with identical values
    pub unchanged: Vec<FusedAnnotation>,
}

impl FusionReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.overwritten.is_empty()
    }

    #[must_use]
    pub fn overwritten_kinds(&self) -> Vec<String> {
        self.overwritten.iter().map(|o| o.kind.clone()).collect()
    }

    fn extend(&mut self, other: Self) {
        self.added.extend(other.added);
        self.overwritten.extend(other.overwritten);
        self.unchanged.extend(other.unchanged);
    }
}

/// Merge `donor` annotations into a snapshot of `before`, skipping `excluded` kinds.
///
/// Pure: returns the merged set and the changes; a donor annotation replaces
/// a recipient annotation of the same kind wholesale and keeps its position.
pub fn merge_annotations(
    before: &AnnotationSet,
    donor: &AnnotationSet,
    excluded: &[&str],
    target: &FusionTarget,
) -> (AnnotationSet, FusionReport) {
    let mut merged = before.clone();
    let mut report = FusionReport::default();

    for annotation in donor.iter().filter(|a| !excluded.contains(&a.kind.as_str())) {
        let fused = FusedAnnotation {
            target: target.clone(),
            kind: annotation.kind.clone(),
        };
        match merged.insert(annotation.clone()) {
            None => report.added.push(fused),
            Some(previous) if previous == *annotation => report.unchanged.push(fused),
            Some(previous) => {
                log::info!(
                    "Overwriting {} on {target}: {:?} -> {:?}",
                    annotation.kind,
                    previous.elements,
                    annotation.elements
                );
                report.overwritten.push(fused);
            }
        }
    }

    (merged, report)
}

/// Applies matched fuse requests to a recipient
pub struct FusionEngine<'c> {
    config: &'c GraftConfig,
}

impl<'c> FusionEngine<'c> {
    #[must_use]
    pub const fn new(config: &'c GraftConfig) -> Self {
        Self { config }
    }

    /// Fuse one donor member's annotations (minus the fuse marker) onto `recipient.members[recipient_index]`.
    ///
    /// The target must exist and share the donor member's kind, name and descriptor.
    pub fn fuse(
        &self,
        recipient: &mut Artifact,
        donor_member: &Member,
        recipient_index: usize,
    ) -> Result<FusionReport> {
        let target_member = recipient
            .members
            .get_mut(recipient_index)
            .filter(|target| target.same_identity(donor_member))
            .ok_or_else(|| GraftError::FusionTarget {
                member: donor_member.member_ref(),
                index: recipient_index,
            })?;

        let target = FusionTarget::Member(target_member.member_ref());
        let (merged, report) = merge_annotations(
            &target_member.annotations,
            &donor_member.annotations,
            &[self.config.fuse_marker.as_str()],
            &target,
        );
        target_member.annotations = merged;
        Ok(report)
    }

    /// Fuse the donor's class annotations, minus both markers, onto the recipient class
    pub fn fuse_class(&self, recipient: &mut Artifact, donor: &Artifact) -> FusionReport {
        let (merged, report) = merge_annotations(
            &recipient.annotations,
            &donor.annotations,
            &[
                self.config.fuse_marker.as_str(),
                self.config.recipient_marker.as_str(),
            ],
            &FusionTarget::Class,
        );
        recipient.annotations = merged;
        report
    }

    /// Apply every matched member and, if requested, the class-level fusion.
    ///
    /// Stops at the first bad target; `recipient` is then partially fused and should be discarded.
    pub fn apply(
        &self,
        recipient: &mut Artifact,
        donor: &Artifact,
        matched: &[MatchedMember<'_>],
        class_level: bool,
    ) -> Result<FusionReport> {
        let mut report = FusionReport::default();
        if class_level {
            report.extend(self.fuse_class(recipient, donor));
        }
        for pair in matched {
            report.extend(self.fuse(recipient, pair.donor, pair.recipient_index)?);
        }
        Ok(report)
    }
}

/// Annotations that would be copied for a fuse-marked member
pub fn transplantable<'a>(member: &'a Member, config: &GraftConfig) -> Vec<&'a Annotation> {
    member
        .annotations
        .iter()
        .filter(|a| a.kind != config.fuse_marker)
        .collect()
}
