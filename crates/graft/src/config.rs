use serde::{Deserialize, Serialize};

/// Descriptor of `@Graft.Recipient`
pub const RECIPIENT_MARKER: &str = "Lnet/onedaybeard/graftt/Graft$Recipient;";

/// Descriptor of `@Graft.Fuse`
pub const FUSE_MARKER: &str = "Lnet/onedaybeard/graftt/Graft$Fuse;";

/// Configuration for grafting runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraftConfig {
    /// Annotation descriptor naming the recipient class (element `value`)
    pub recipient_marker: String,

    /// Annotation descriptor requesting fusion of a member's other annotations
    pub fuse_marker: String,

    /// Run batch attempts on the rayon thread pool
    pub parallel: bool,

    /// Decode every rewritten artifact again before reporting success
    pub verify_output: bool,
}

impl Default for GraftConfig {
    fn default() -> Self {
        Self {
            recipient_marker: RECIPIENT_MARKER.to_string(),
            fuse_marker: FUSE_MARKER.to_string(),
            parallel: true,
            verify_output: true,
        }
    }
}

impl GraftConfig {
    /// Single-threaded batches; outcomes are produced strictly in input order
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (field, descriptor) in [
            ("recipient_marker", &self.recipient_marker),
            ("fuse_marker", &self.fuse_marker),
        ] {
            if graftt_classfile::descriptor::validate_object(descriptor).is_err() {
                return Err(format!(
                    "{field} must be an object type descriptor like Lcom/example/Marker; (got {descriptor:?})"
                ));
            }
        }

        if self.recipient_marker == self.fuse_marker {
            return Err("recipient_marker and fuse_marker must differ".to_string());
        }

        Ok(())
    }
}
