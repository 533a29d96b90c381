use crate::config::GraftConfig;
use graftt_classfile::{descriptor, Artifact, ClassIdentity, ElementValue, Member};
use serde::Serialize;
use thiserror::Error;

/// Why a class is not a grafting donor. Not an error: such classes are skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum NotATransplant {
    #[error("no {0} annotation")]
    MissingRecipientMarker(String),

    #[error("recipient marker value is not a class literal: {0}")]
    InvalidRecipientValue(String),
}

/// A donor together with everything it asks to have fused
#[derive(Debug, Clone)]
pub struct GraftRequest<'a> {
    pub donor: &'a Artifact,
    pub recipient: ClassIdentity,
    /// Fuse-marked members in declaration order
    pub members: Vec<&'a Member>,
    /// Donor class itself carries the fuse marker
    pub class_level: bool,
}

/// Looks up the grafting markers on donor artifacts
pub struct MarkerResolver<'c> {
    config: &'c GraftConfig,
}

impl<'c> MarkerResolver<'c> {
    #[must_use]
    pub const fn new(config: &'c GraftConfig) -> Self {
        Self { config }
    }

    /// Recipient named by the donor's recipient marker
    pub fn resolve_recipient(&self, donor: &Artifact) -> Result<ClassIdentity, NotATransplant> {
        let marker = donor
            .annotations
            .get(&self.config.recipient_marker)
            .ok_or_else(|| NotATransplant::MissingRecipientMarker(self.config.recipient_marker.clone()))?;

        match marker.element("value") {
            Some(ElementValue::Class(class)) => descriptor::object_internal_name(class)
                .filter(|name| descriptor::validate_internal_name(name).is_ok())
                .map(ClassIdentity::new)
                .ok_or_else(|| NotATransplant::InvalidRecipientValue(class.clone())),
            Some(other) => Err(NotATransplant::InvalidRecipientValue(format!("{other:?}"))),
            None => Err(NotATransplant::InvalidRecipientValue("missing value".to_string())),
        }
    }

    #[must_use]
    pub fn is_transplant(&self, donor: &Artifact) -> bool {
        self.resolve_recipient(donor).is_ok()
    }

    /// Members carrying the fuse marker, in declaration order
    pub fn collect_fuse_requests<'a>(&self, donor: &'a Artifact) -> Vec<&'a Member> {
        donor
            .members
            .iter()
            .filter(|member| member.annotations.contains(&self.config.fuse_marker))
            .collect()
    }

    /// Whether the donor class asks for its own annotations to be fused onto the recipient class
    #[must_use]
    pub fn class_fuse_requested(&self, donor: &Artifact) -> bool {
        donor.annotations.contains(&self.config.fuse_marker)
    }

    pub fn graft_request<'a>(&self, donor: &'a Artifact) -> Result<GraftRequest<'a>, NotATransplant> {
        let recipient = self.resolve_recipient(donor)?;
        let members = self.collect_fuse_requests(donor);
        let class_level = self.class_fuse_requested(donor);
        log::debug!(
            "{} targets {recipient}: {} fuse member(s){}",
            donor.name,
            members.len(),
            if class_level { " + class annotations" } else { "" }
        );
        Ok(GraftRequest {
            donor,
            recipient,
            members,
            class_level,
        })
    }
}
