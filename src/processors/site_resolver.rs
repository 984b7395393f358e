use crate::error::{Result, SyncError};
use crate::models::{HeaderTriple, RawRow, Site};
use crate::store::SiteCatalog;
use crate::utils::constants::SITE_COLUMN;
use crate::utils::filename::site_name_from_path;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Matches a parsed file to a catalog site.
pub struct SiteResolver {
    catalog: Arc<dyn SiteCatalog>,
}

impl SiteResolver {
    pub fn new(catalog: Arc<dyn SiteCatalog>) -> Self {
        Self { catalog }
    }

    /// Name a file claims to belong to: the `site` cell of the sample row,
    /// otherwise the file's base name without extension.
    pub fn candidate_name(header: &HeaderTriple, sample_row: Option<&RawRow>, path: &Path) -> Option<String> {
        sample_row
            .and_then(|row| row.value_for(header, SITE_COLUMN))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .or_else(|| site_name_from_path(path))
    }

    pub async fn resolve(&self, header: &HeaderTriple, sample_row: Option<&RawRow>, path: &Path) -> Result<Site> {
        let name = Self::candidate_name(header, sample_row, path).ok_or_else(|| SyncError::UnknownSite {
            name: path.display().to_string(),
        })?;

        debug!(site_name = %name, path = %path.display(), "Resolving site");

        self.catalog
            .find_site_by_name(&name)
            .await?
            .ok_or(SyncError::UnknownSite { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    fn header_with_site() -> HeaderTriple {
        HeaderTriple::new(
            vec!["TIMESTAMP".into(), "site".into(), "AirTemp".into()],
            vec!["".into(); 3],
            vec!["".into(); 3],
        )
    }

    fn resolver() -> SiteResolver {
        SiteResolver::new(Arc::new(MemoryStore::with_sites(vec![
            Site::new(1, "Laramie", "https://data.example.org/Laramie_Hourly.dat"),
            Site::new(2, "Pinedale", "https://data.example.org/Pinedale.dat"),
        ])))
    }

    #[tokio::test]
    async fn test_site_column_wins_over_file_name() -> Result<()> {
        let row = RawRow::from(vec!["2021-06-01 00:00:00", "Laramie", "21.4"]);
        let site = resolver()
            .resolve(&header_with_site(), Some(&row), &PathBuf::from("tmp/Pinedale.dat"))
            .await?;

        assert_eq!(site.site_id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_name_fallback() -> Result<()> {
        let header = HeaderTriple::new(vec!["TIMESTAMP".into()], vec!["".into()], vec!["".into()]);
        let row = RawRow::from(vec!["2021-06-01 00:00:00"]);
        let site = resolver()
            .resolve(&header, Some(&row), &PathBuf::from("tmp/Pinedale.dat"))
            .await?;
        assert_eq!(site.site_id, 2);

        // Empty site cell also falls back
        let row = RawRow::from(vec!["2021-06-01 00:00:00", "", "21.4"]);
        let site = resolver()
            .resolve(&header_with_site(), Some(&row), &PathBuf::from("tmp/Pinedale.csv"))
            .await?;
        assert_eq!(site.site_id, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_site() {
        let result = resolver()
            .resolve(&header_with_site(), None, &PathBuf::from("tmp/Laramie_Hourly.dat"))
            .await;

        match result {
            Err(SyncError::UnknownSite { name }) => assert_eq!(name, "Laramie_Hourly"),
            other => panic!("expected UnknownSite, got {:?}", other),
        }
    }
}
