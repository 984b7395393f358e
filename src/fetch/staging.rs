use crate::error::{Result, SyncError};
use crate::models::Site;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scratch directory that downloads land in before they are parsed.
///
/// Files left at the top level by a previous run are removed at the start of
/// every run, so two runs must never share a staging directory. Subdirectories
/// are never touched.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed and remove the files a previous run left in it.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        let stale = self.list_files()?;
        if !stale.is_empty() {
            debug!(path = %self.root.display(), files = stale.len(), "Clearing staging directory");
        }
        for path in stale {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Path a site's download is written to: the last segment of its URL.
    pub fn path_for(&self, site: &Site) -> Result<PathBuf> {
        site.staged_file_name()
            .map(|name| self.root.join(name))
            .ok_or_else(|| SyncError::fetch(&site.download_url, "URL has no file name segment"))
    }

    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_clears_previous_run() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let staging = StagingArea::new(temp_dir.path().join("tmp"));

        staging.prepare()?;
        std::fs::write(staging.root().join("Laramie.dat"), "stale")?;
        assert_eq!(staging.list_files()?.len(), 1);

        staging.prepare()?;
        assert!(staging.root().is_dir());
        assert!(staging.list_files()?.is_empty());

        Ok(())
    }

    #[test]
    fn test_prepare_leaves_subdirectories_alone() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("project");
        std::fs::create_dir_all(project.join("src"))?;
        std::fs::write(project.join("src").join("main.rs"), "fn main() {}")?;
        std::fs::write(project.join("Pinedale.dat"), "stale")?;

        let staging = StagingArea::new(&project);
        staging.prepare()?;

        assert!(staging.list_files()?.is_empty());
        assert_eq!(std::fs::read_to_string(project.join("src").join("main.rs"))?, "fn main() {}");

        Ok(())
    }

    #[test]
    fn test_path_for_uses_url_file_name() -> Result<()> {
        let staging = StagingArea::new("tmp");
        let site = Site::new(1, "Laramie", "https://data.example.org/hourly/Laramie_Hourly.dat?v=2");
        assert_eq!(staging.path_for(&site)?, PathBuf::from("tmp/Laramie_Hourly.dat"));

        let site = Site::new(2, "Bare", "https://data.example.org/");
        assert!(matches!(staging.path_for(&site), Err(SyncError::Fetch { .. })));

        Ok(())
    }
}
