//! Directory Artifact Source
//!
//! Reads generated HTML reports from an outbox folder.

use crate::domain::entities::DeliveryArtifact;
use crate::domain::ports::{ArtifactSource, StagedArtifact};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Outbox folder; every `*.html` file directly inside it is staged.
pub struct DirectoryArtifactSource {
    dir: PathBuf,
}

impl DirectoryArtifactSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_report(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html"))
    }
}

impl ArtifactSource for DirectoryArtifactSource {
    /// Staged reports sorted by file name. A file that cannot be read is
    /// logged and left for the next drain.
    fn list(&self) -> Result<Vec<StagedArtifact>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if Self::is_report(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let staged = stage_all(paths);
        tracing::debug!("{} reports staged in {}", staged.len(), self.dir.display());
        Ok(staged)
    }

    fn discard(&self, staged: &StagedArtifact) -> Result<()> {
        fs::remove_file(&staged.handle)?;
        Ok(())
    }
}

fn stage_all(paths: Vec<PathBuf>) -> Vec<StagedArtifact> {
    let mut staged = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match fs::read(&path) {
            Ok(content) => staged.push(StagedArtifact {
                handle: path.to_string_lossy().into_owned(),
                artifact: DeliveryArtifact::new(name, content),
            }),
            Err(e) => tracing::error!("cannot read {}, skipping: {}", path.display(), e),
        }
    }
    staged
}
