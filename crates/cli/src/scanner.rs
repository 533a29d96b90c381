use anyhow::{Context, Result};
use graftt_core::DonorInput;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds compiled classes below a directory
pub struct ClassScanner {
    root: PathBuf,
}

impl ClassScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// All `.class` files, sorted so batches run in a stable order
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for result in WalkDir::new(&self.root).follow_links(false) {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some("class") {
                        continue;
                    }
                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} class files under {}", files.len(), self.root.display());
        files
    }

    /// Read every class file as a donor candidate, labelled by its path relative to the root
    pub fn donors(&self) -> Result<Vec<DonorInput>> {
        self.scan()
            .into_iter()
            .map(|path| {
                let bytes =
                    fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
                let label = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .display()
                    .to_string();
                Ok(DonorInput::new(label, bytes))
            })
            .collect()
    }
}
