use graftt_classfile::{Artifact, Member, MemberRef};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A fuse request that does not resolve to exactly one recipient member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mismatch")]
pub enum FuseMismatch {
    /// No recipient member with the same kind, name and descriptor
    Unmatched { member: MemberRef },
    /// More than one candidate; only possible for hand-built or corrupt recipients
    Ambiguous { member: MemberRef, candidates: usize },
}

impl FuseMismatch {
    #[must_use]
    pub fn member(&self) -> &MemberRef {
        match self {
            Self::Unmatched { member } | Self::Ambiguous { member, .. } => member,
        }
    }
}

impl Display for FuseMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmatched { member } => write!(f, "{member} has no match"),
            Self::Ambiguous { member, candidates } => {
                write!(f, "{member} matches {candidates} members")
            }
        }
    }
}

/// A donor member paired with its recipient counterpart
#[derive(Debug, Clone, Copy)]
pub struct MatchedMember<'a> {
    pub donor: &'a Member,
    /// Index into the recipient's `members`
    pub recipient_index: usize,
}

/// Index of the single recipient member sharing kind, name and descriptor with `member`
pub fn match_member(recipient: &Artifact, member: &Member) -> Result<usize, FuseMismatch> {
    let mut candidates = recipient
        .members
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.same_identity(member))
        .map(|(index, _)| index);

    match (candidates.next(), candidates.count()) {
        (Some(index), 0) => Ok(index),
        (None, _) => Err(FuseMismatch::Unmatched {
            member: member.member_ref(),
        }),
        (Some(_), extra) => Err(FuseMismatch::Ambiguous {
            member: member.member_ref(),
            candidates: extra + 1,
        }),
    }
}

/// Match every request, collecting all failures instead of stopping at the first
pub fn match_all<'a>(
    recipient: &Artifact,
    requests: &[&'a Member],
) -> Result<Vec<MatchedMember<'a>>, Vec<FuseMismatch>> {
    let mut matched = Vec::with_capacity(requests.len());
    let mut mismatches = Vec::new();

    for &donor in requests {
        match match_member(recipient, donor) {
            Ok(recipient_index) => {
                log::debug!(
                    "Matched {} to {}",
                    donor.member_ref(),
                    recipient.name.internal_name()
                );
                matched.push(MatchedMember {
                    donor,
                    recipient_index,
                });
            }
            Err(mismatch) => mismatches.push(mismatch),
        }
    }

    if mismatches.is_empty() {
        Ok(matched)
    } else {
        Err(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graftt_classfile::MemberKind;

    fn foo() -> Artifact {
        let mut foo = Artifact::new("com/example/Foo");
        foo.push_member(Member::field(0x0001, "hmm", "Ljava/lang/String;"));
        foo.push_member(Member::method(0x0001, "hmm", "()Ljava/lang/String;"));
        foo
    }

    #[test]
    fn test_match_uses_kind_name_and_descriptor() {
        let recipient = foo();
        let field = Member::field(0x0002, "hmm", "Ljava/lang/String;");
        let method = Member::method(0x0001, "hmm", "()Ljava/lang/String;");
        assert_eq!(match_member(&recipient, &field), Ok(0));
        assert_eq!(match_member(&recipient, &method), Ok(1));

        let wrong_descriptor = Member::field(0x0001, "hmm", "Ljava/lang/Object;");
        assert!(matches!(
            match_member(&recipient, &wrong_descriptor),
            Err(FuseMismatch::Unmatched { .. })
        ));
    }

    #[test]
    fn test_match_all_reports_every_mismatch() {
        let recipient = foo();
        let oh_no = Member::field(0x0001, "ohNo", "Ljava/lang/String;");
        let hmm = Member::field(0x0001, "hmm", "Ljava/lang/String;");
        let nope = Member::method(0x0001, "nope", "()V");

        let mismatches = match_all(&recipient, &[&oh_no, &hmm, &nope]).unwrap_err();
        let names: Vec<_> = mismatches.iter().map(|m| m.member().name.as_str()).collect();
        assert_eq!(names, vec!["ohNo", "nope"]);
        assert_eq!(mismatches[1].member().kind, MemberKind::Method);
    }

    #[test]
    fn test_duplicate_recipient_members_are_ambiguous() {
        let mut recipient = foo();
        recipient.push_member(Member::field(0x0001, "hmm", "Ljava/lang/String;"));
        let hmm = Member::field(0x0001, "hmm", "Ljava/lang/String;");
        assert_eq!(
            match_member(&recipient, &hmm),
            Err(FuseMismatch::Ambiguous {
                member: hmm.member_ref(),
                candidates: 2
            })
        );
    }
}
