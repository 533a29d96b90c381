use graftt_classfile::descriptor::to_java_name;
use graftt_classfile::{Annotation, Artifact, ElementValue, MemberKind};
use graftt_core::{
    transplantable, AttemptReport, BatchReport, BatchSummary, Diagnostic, GraftConfig,
    MarkerResolver, Outcome,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct GraftOutput<'a> {
    pub dry_run: bool,
    pub written: usize,
    pub summary: BatchSummary,
    pub attempts: &'a [AttemptReport],
}

/// Plain text batch report. Skipped classes only show up in the summary.
pub fn render_batch(report: &BatchReport, written: usize, dry_run: bool) -> String {
    let mut out = String::new();
    for attempt in &report.attempts {
        match &attempt.outcome {
            Outcome::Encoded { recipient, .. } => {
                out.push_str(&format!("ok    {} -> {recipient}", attempt.donor));
                for diagnostic in &attempt.diagnostics {
                    if let Diagnostic::Fused {
                        fused_members,
                        added,
                        overwritten,
                    } = diagnostic
                    {
                        out.push_str(&format!(" ({fused_members} member(s), {} added", added.len()));
                        if !overwritten.is_empty() {
                            let kinds: Vec<_> = overwritten.iter().map(|k| to_java_name(k)).collect();
                            out.push_str(&format!(", overwrote {}", kinds.join(", ")));
                        }
                        out.push(')');
                    }
                }
                out.push('\n');
            }
            Outcome::Failed(error) => {
                out.push_str(&format!("FAIL  {}: {error}\n", attempt.donor));
            }
            Outcome::Skipped(_) => {}
        }
    }

    let summary = report.summary();
    out.push_str(&format!(
        "{} encoded, {} skipped, {} failed, {} annotation(s) overwritten",
        summary.encoded, summary.skipped, summary.failed, summary.overwritten
    ));
    if dry_run {
        out.push_str("; dry run, nothing written\n");
    } else {
        out.push_str(&format!("; {written} class file(s) written\n"));
    }
    out
}

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub class: String,
    pub version: String,
    pub super_class: Option<String>,
    /// Recipient named by the class's transplant marker
    pub transplant_of: Option<String>,
    pub annotations: Vec<String>,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub kind: MemberKind,
    pub signature: String,
    pub annotations: Vec<String>,
    /// Annotations this member would fuse onto its recipient counterpart
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fuses: Vec<String>,
}

pub fn inspect(artifact: &Artifact, config: &GraftConfig) -> InspectOutput {
    let resolver = MarkerResolver::new(config);
    let transplant_of = resolver.resolve_recipient(artifact).ok();
    let fuse_requests = resolver.collect_fuse_requests(artifact);

    let members = artifact
        .members
        .iter()
        .map(|member| {
            let fuses = if transplant_of.is_some()
                && fuse_requests.iter().any(|r| r.same_identity(member))
            {
                transplantable(member, config)
                    .into_iter()
                    .map(format_annotation)
                    .collect()
            } else {
                Vec::new()
            };
            MemberView {
                kind: member.kind,
                signature: member.display_signature(),
                annotations: member.annotations.iter().map(format_annotation).collect(),
                fuses,
            }
        })
        .collect();

    InspectOutput {
        class: artifact.name.java_name(),
        version: format!("{}.{}", artifact.version.major, artifact.version.minor),
        super_class: artifact.super_name.as_deref().map(|s| s.replace('/', ".")),
        transplant_of: transplant_of.map(|r| r.java_name()),
        annotations: artifact.annotations.iter().map(format_annotation).collect(),
        members,
    }
}

pub fn render_inspect(view: &InspectOutput) -> String {
    let mut out = String::new();
    for annotation in &view.annotations {
        out.push_str(&format!("{annotation}\n"));
    }
    out.push_str(&format!("class {}", view.class));
    if let Some(super_class) = &view.super_class {
        out.push_str(&format!(" extends {super_class}"));
    }
    out.push_str(&format!(" (class file {})\n", view.version));
    if let Some(recipient) = &view.transplant_of {
        out.push_str(&format!("  transplant of {recipient}\n"));
    }

    for member in &view.members {
        out.push('\n');
        for annotation in &member.annotations {
            out.push_str(&format!("  {annotation}\n"));
        }
        out.push_str(&format!("  {}\n", member.signature));
        if !member.fuses.is_empty() {
            out.push_str(&format!("    fuses {}\n", member.fuses.join(" ")));
        }
    }
    out
}

/// Source-like rendering: `@com.example.Json(name="id")`
pub fn format_annotation(annotation: &Annotation) -> String {
    let kind = to_java_name(&annotation.kind);
    if annotation.elements.is_empty() {
        return format!("@{kind}");
    }
    let elements: Vec<String> = annotation
        .elements
        .iter()
        .map(|(name, value)| format!("{name}={}", format_value(value)))
        .collect();
    format!("@{kind}({})", elements.join(", "))
}

fn format_value(value: &ElementValue) -> String {
    match value {
        ElementValue::Byte(v) | ElementValue::Short(v) | ElementValue::Int(v) => v.to_string(),
        ElementValue::Char(v) => match u32::try_from(*v).ok().and_then(char::from_u32) {
            Some(c) => format!("{c:?}"),
            None => v.to_string(),
        },
        ElementValue::Boolean(v) => (*v != 0).to_string(),
        ElementValue::Long(v) => format!("{v}L"),
        ElementValue::Float(bits) => format!("{}f", f32::from_bits(*bits)),
        ElementValue::Double(bits) => f64::from_bits(*bits).to_string(),
        ElementValue::String(s) => format!("{s:?}"),
        ElementValue::Enum {
            type_descriptor,
            constant,
        } => format!("{}.{constant}", to_java_name(type_descriptor)),
        ElementValue::Class(descriptor) => format!("{}.class", to_java_name(descriptor)),
        ElementValue::Annotation(nested) => format_annotation(nested),
        ElementValue::Array(values) => {
            let values: Vec<String> = values.iter().map(format_value).collect();
            format!("{{{}}}", values.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graftt_classfile::Retention;

    #[test]
    fn test_format_annotation_like_source() {
        let annotation = Annotation::new("Lcom/example/Column;", Retention::Visible)
            .with("name", ElementValue::String("id".into()))
            .with("length", ElementValue::Int(12))
            .with("type", ElementValue::Class("[I".into()))
            .with(
                "order",
                ElementValue::Enum {
                    type_descriptor: "Lcom/example/Order;".into(),
                    constant: "ASC".into(),
                },
            )
            .with(
                "flags",
                ElementValue::Array(vec![ElementValue::boolean(true), ElementValue::Long(3)]),
            );
        assert_eq!(
            format_annotation(&annotation),
            r#"@com.example.Column(name="id", length=12, type=int[].class, order=com.example.Order.ASC, flags={true, 3L})"#
        );
        assert_eq!(
            format_annotation(&Annotation::new("Ljavax/annotation/Nonnull;", Retention::Invisible)),
            "@javax.annotation.Nonnull"
        );
    }
}
