use crate::config::GraftConfig;
use crate::error::{GraftError, Result};
use crate::fusion::{FusionEngine, FusionReport};
use crate::markers::{MarkerResolver, NotATransplant};
use crate::matcher;
use crate::report::{AttemptReport, AttemptState, BatchReport, Diagnostic, Outcome};
use graftt_classfile::{decode, encode, Artifact, AttributeSlot, ClassIdentity};
use rayon::prelude::*;
use std::collections::HashMap;

/// Supplies recipient bytes for a resolved identity
pub trait RecipientSource: Sync {
    fn load(&self, recipient: &ClassIdentity) -> anyhow::Result<Vec<u8>>;
}

impl RecipientSource for HashMap<ClassIdentity, Vec<u8>> {
    fn load(&self, recipient: &ClassIdentity) -> anyhow::Result<Vec<u8>> {
        self.get(recipient)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no class file for {recipient}"))
    }
}

/// One donor class file in a batch
#[derive(Debug, Clone)]
pub struct DonorInput {
    /// Shown in reports, usually the path the bytes came from
    pub label: String,
    pub bytes: Vec<u8>,
}

impl DonorInput {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

/// Records the state path and diagnostics of one attempt
struct Attempt {
    donor: String,
    donor_class: Option<ClassIdentity>,
    recipient: Option<ClassIdentity>,
    states: Vec<AttemptState>,
    diagnostics: Vec<Diagnostic>,
}

impl Attempt {
    fn new(label: &str) -> Self {
        Self {
            donor: label.to_string(),
            donor_class: None,
            recipient: None,
            states: vec![AttemptState::Pending],
            diagnostics: Vec::new(),
        }
    }

    fn state(&self) -> AttemptState {
        self.states.last().copied().unwrap_or(AttemptState::Pending)
    }

    fn advance(&mut self, next: AttemptState) {
        let current = self.state();
        debug_assert!(
            current.can_advance_to(next),
            "illegal transition {current:?} -> {next:?}"
        );
        log::debug!("{}: {current:?} -> {next:?}", self.donor);
        self.states.push(next);
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn finish(self, outcome: Outcome) -> AttemptReport {
        debug_assert!(self.state().is_terminal());
        AttemptReport {
            donor: self.donor,
            donor_class: self.donor_class,
            recipient: self.recipient,
            states: self.states,
            diagnostics: self.diagnostics,
            outcome,
        }
    }

    fn skip(mut self, reason: NotATransplant) -> AttemptReport {
        log::debug!("{}: skipped, {reason}", self.donor);
        self.emit(Diagnostic::Skipped {
            reason: reason.clone(),
        });
        self.advance(AttemptState::Skipped);
        self.finish(Outcome::Skipped(reason))
    }

    fn fail(mut self, error: GraftError) -> AttemptReport {
        log::warn!("{}: {error}", self.donor);
        if let GraftError::UnmatchedFuseMembers(members) = &error {
            self.emit(Diagnostic::Unmatched {
                members: members.clone(),
            });
        } else {
            self.emit(Diagnostic::Failed {
                error: error.to_string(),
            });
        }
        self.advance(AttemptState::Failed);
        self.finish(Outcome::Failed(error))
    }
}

/// Runs grafting attempts: decode, resolve, match, fuse, encode
pub struct Grafter {
    config: GraftConfig,
}

impl Grafter {
    /// Create a grafter, rejecting invalid marker configuration
    pub fn new(config: GraftConfig) -> Result<Self> {
        config.validate().map_err(GraftError::InvalidConfig)?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    /// Graft one donor onto an already loaded recipient
    pub fn graft(&self, donor: &[u8], recipient: &[u8]) -> AttemptReport {
        self.attempt("donor", donor, |_| Ok(recipient.to_vec()))
    }

    /// Fuse a decoded donor onto a decoded recipient, returning the rewritten recipient.
    ///
    /// All fuse requests are matched before anything is changed; a single
    /// mismatch fails the whole donor.
    pub fn fuse_artifacts(&self, donor: &Artifact, mut recipient: Artifact) -> Result<(Artifact, FusionReport)> {
        let resolver = MarkerResolver::new(&self.config);
        let request = resolver.graft_request(donor)?;
        if request.recipient != recipient.name {
            return Err(GraftError::RecipientMismatch {
                expected: request.recipient,
                found: recipient.name.clone(),
            });
        }
        let matched = matcher::match_all(&recipient, &request.members)
            .map_err(GraftError::UnmatchedFuseMembers)?;
        let report = FusionEngine::new(&self.config).apply(
            &mut recipient,
            donor,
            &matched,
            request.class_level,
        )?;
        Ok((recipient, report))
    }

    /// Run the attempt state machine for one donor.
    ///
    /// `load` is only called once the donor has resolved to a recipient.
    fn attempt<F>(&self, label: &str, donor_bytes: &[u8], load: F) -> AttemptReport
    where
        F: FnOnce(&ClassIdentity) -> anyhow::Result<Vec<u8>>,
    {
        let mut attempt = Attempt::new(label);

        let donor = match decode(donor_bytes) {
            Ok(donor) => donor,
            Err(error) => return attempt.fail(GraftError::MalformedDonor(error)),
        };
        attempt.donor_class = Some(donor.name.clone());

        let resolver = MarkerResolver::new(&self.config);
        let request = match resolver.graft_request(&donor) {
            Ok(request) => request,
            Err(reason) => return attempt.skip(reason),
        };
        attempt.recipient = Some(request.recipient.clone());
        attempt.advance(AttemptState::Resolved);

        let recipient_bytes = match load(&request.recipient) {
            Ok(bytes) => bytes,
            Err(error) => {
                return attempt.fail(GraftError::RecipientUnavailable(
                    request.recipient.clone(),
                    format!("{error:#}"),
                ))
            }
        };
        let original = match decode(&recipient_bytes) {
            Ok(recipient) => recipient,
            Err(error) => {
                return attempt.fail(GraftError::MalformedRecipient {
                    recipient: request.recipient.clone(),
                    error,
                })
            }
        };
        if original.name != request.recipient {
            return attempt.fail(GraftError::RecipientMismatch {
                expected: request.recipient.clone(),
                found: original.name.clone(),
            });
        }

        let matched = match matcher::match_all(&original, &request.members) {
            Ok(matched) => matched,
            Err(mismatches) => return attempt.fail(GraftError::UnmatchedFuseMembers(mismatches)),
        };
        attempt.advance(AttemptState::Matched);

        let mut rewritten = original.clone();
        let fusion = match FusionEngine::new(&self.config).apply(
            &mut rewritten,
            &donor,
            &matched,
            request.class_level,
        ) {
            Ok(fusion) => fusion,
            Err(error) => return attempt.fail(error),
        };
        let bytes = match encode(&rewritten) {
            Ok(bytes) => bytes,
            Err(error) => return attempt.fail(GraftError::Encode(error)),
        };
        attempt.emit(Diagnostic::Fused {
            fused_members: matched.len(),
            added: fusion.added.iter().map(|a| a.kind.clone()).collect(),
            overwritten: fusion.overwritten_kinds(),
        });
        attempt.advance(AttemptState::Fused);

        if self.config.verify_output {
            if let Err(reason) = verify(&original, &bytes) {
                return attempt.fail(GraftError::Verification {
                    recipient: request.recipient.clone(),
                    reason,
                });
            }
        }

        log::info!(
            "Grafted {} onto {}: {} member(s), {} added, {} overwritten",
            donor.name,
            request.recipient,
            matched.len(),
            fusion.added.len(),
            fusion.overwritten.len()
        );
        attempt.emit(Diagnostic::Encoded {
            recipient: request.recipient.clone(),
            bytes: bytes.len(),
        });
        attempt.advance(AttemptState::Encoded);
        attempt.finish(Outcome::Encoded {
            recipient: request.recipient,
            bytes,
            fusion,
        })
    }

    /// Graft every donor; outcomes keep the donors' order.
    ///
    /// Donors naming the same recipient are applied one after another, each
    /// on top of the previous donor's output, so the last `Encoded` output of
    /// a recipient carries every donor's annotations. Distinct recipients run
    /// in parallel when the config allows it.
    pub fn run_batch(&self, donors: &[DonorInput], source: &dyn RecipientSource) -> BatchReport {
        let attempts: Vec<AttemptReport> = if self.config.parallel {
            let recipients: Vec<Option<ClassIdentity>> = donors
                .par_iter()
                .map(|donor| self.recipient_of(&donor.bytes))
                .collect();

            let mut indexed: Vec<(usize, AttemptReport)> = group_by_recipient(&recipients)
                .par_iter()
                .flat_map_iter(|group| {
                    self.run_chain(group.iter().map(|&i| (i, &donors[i])), source, |_| false)
                })
                .collect();
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, attempt)| attempt).collect()
        } else {
            self.run_chain(donors.iter().enumerate(), source, |_| false)
                .into_iter()
                .map(|(_, attempt)| attempt)
                .collect()
        };

        let report = BatchReport { attempts };
        log_batch(&report);
        report
    }

    /// Sequential batch that stops starting new attempts once `stop` returns true
    pub fn run_batch_until<P>(
        &self,
        donors: &[DonorInput],
        source: &dyn RecipientSource,
        stop: P,
    ) -> BatchReport
    where
        P: FnMut(&AttemptReport) -> bool,
    {
        let attempts: Vec<AttemptReport> = self
            .run_chain(donors.iter().enumerate(), source, stop)
            .into_iter()
            .map(|(_, attempt)| attempt)
            .collect();
        if attempts.len() < donors.len() {
            log::info!(
                "Stopping batch after {} of {} donors",
                attempts.len(),
                donors.len()
            );
        }

        let report = BatchReport { attempts };
        log_batch(&report);
        report
    }

    /// Run donors in order; a recipient already rewritten in this chain is
    /// loaded from its latest output instead of `source`.
    fn run_chain<'d, I, P>(
        &self,
        donors: I,
        source: &dyn RecipientSource,
        mut stop: P,
    ) -> Vec<(usize, AttemptReport)>
    where
        I: IntoIterator<Item = (usize, &'d DonorInput)>,
        P: FnMut(&AttemptReport) -> bool,
    {
        let mut rewritten: HashMap<ClassIdentity, Vec<u8>> = HashMap::new();
        let mut attempts = Vec::new();

        for (index, donor) in donors {
            let attempt = self.attempt(&donor.label, &donor.bytes, |recipient| {
                match rewritten.get(recipient) {
                    Some(bytes) => {
                        log::debug!("{}: grafting onto earlier output for {recipient}", donor.label);
                        Ok(bytes.clone())
                    }
                    None => source.load(recipient),
                }
            });
            if let Some((recipient, bytes)) = attempt.encoded() {
                rewritten.insert(recipient.clone(), bytes.to_vec());
            }

            let halt = stop(&attempt);
            attempts.push((index, attempt));
            if halt {
                break;
            }
        }
        attempts
    }

    /// Recipient named by a donor, or `None` for inputs that end without loading one
    fn recipient_of(&self, donor: &[u8]) -> Option<ClassIdentity> {
        let donor = decode(donor).ok()?;
        MarkerResolver::new(&self.config).resolve_recipient(&donor).ok()
    }
}

/// Donor indices grouped by recipient, groups in order of first appearance.
/// Donors without a recipient each form their own group.
fn group_by_recipient(recipients: &[Option<ClassIdentity>]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_recipient: HashMap<&ClassIdentity, usize> = HashMap::new();

    for (index, recipient) in recipients.iter().enumerate() {
        match recipient {
            Some(recipient) => {
                let group = *by_recipient.entry(recipient).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[group].push(index);
            }
            None => groups.push(vec![index]),
        }
    }
    groups
}

fn log_batch(report: &BatchReport) {
    let mut donors_per_recipient: HashMap<&ClassIdentity, usize> = HashMap::new();
    for (recipient, _) in report.encoded() {
        *donors_per_recipient.entry(recipient).or_default() += 1;
    }
    for (recipient, count) in donors_per_recipient {
        if count > 1 {
            log::info!("{recipient} received {count} transplants, applied in input order");
        }
    }

    let summary = report.summary();
    log::info!(
        "Batch finished: {} encoded, {} skipped, {} failed",
        summary.encoded,
        summary.skipped,
        summary.failed
    );
}

/// Decode the output again and check that members and executable content are untouched
fn verify(original: &Artifact, bytes: &[u8]) -> std::result::Result<(), String> {
    let rewritten = decode(bytes).map_err(|e| e.to_string())?;

    if rewritten.name != original.name || rewritten.super_name != original.super_name {
        return Err("class identity changed".to_string());
    }
    if rewritten.members.len() != original.members.len() {
        return Err(format!(
            "member count changed from {} to {}",
            original.members.len(),
            rewritten.members.len()
        ));
    }

    for (before, after) in original.members.iter().zip(&rewritten.members) {
        if !before.same_identity(after) || before.access_flags != after.access_flags {
            return Err(format!("{} became {}", before.member_ref(), after.member_ref()));
        }
        if raw_attributes(&before.attributes) != raw_attributes(&after.attributes) {
            return Err(format!("attributes of {} changed", before.member_ref()));
        }
    }

    if raw_attributes(&original.attributes) != raw_attributes(&rewritten.attributes) {
        return Err("class attributes changed".to_string());
    }
    Ok(())
}

fn raw_attributes(slots: &[AttributeSlot]) -> Vec<&AttributeSlot> {
    slots
        .iter()
        .filter(|slot| matches!(slot, AttributeSlot::Raw(_)))
        .collect()
}
