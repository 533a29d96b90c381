use anyhow::{Context, Result};
use graftt_classfile::ClassIdentity;
use graftt_core::{ArtifactSink, RecipientSource};
use std::fs;
use std::path::{Path, PathBuf};

/// A classes directory laid out by package: `<root>/com/example/Foo.class`
#[derive(Debug, Clone)]
pub struct ClassDirectory {
    root: PathBuf,
}

impl ClassDirectory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, class: &ClassIdentity) -> PathBuf {
        self.root.join(class.class_file_path())
    }
}

impl RecipientSource for ClassDirectory {
    fn load(&self, recipient: &ClassIdentity) -> Result<Vec<u8>> {
        let path = self.path_of(recipient);
        fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

impl ArtifactSink for ClassDirectory {
    fn accept(&self, recipient: &ClassIdentity, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(recipient);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
