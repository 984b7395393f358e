use crate::error::{Result, SyncError};
use crate::fetch::staging::StagingArea;
use crate::models::Site;
use crate::utils::constants::USER_AGENT;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Streams a site's hourly export into the staging area.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    staging: StagingArea,
}

impl Downloader {
    pub fn new(staging: StagingArea, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, staging })
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Download a site's file, returning the staged path.
    ///
    /// Any transport, status or write failure is reported as a fetch error
    /// and leaves no partial file behind.
    pub async fn fetch(&self, site: &Site, cancel: &CancellationToken) -> Result<PathBuf> {
        let destination = self.staging.path_for(site)?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            result = self.stream_to_file(&site.download_url, &destination) => result,
        };

        match outcome {
            Ok(bytes) => {
                debug!(site_id = site.site_id, bytes, path = %destination.display(), "Download complete");
                Ok(destination)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&destination).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %destination.display(), "Could not remove partial download: {}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::fetch(url, format!("status {}", status)));
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| SyncError::fetch(url, format!("cannot create {}: {}", destination.display(), e)))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::fetch(url, format!("error reading body: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::fetch(url, format!("error writing file: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| SyncError::fetch(url, format!("error writing file: {}", e)))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(temp_dir: &TempDir) -> Result<Downloader> {
        let staging = StagingArea::new(temp_dir.path().join("tmp"));
        staging.prepare()?;
        Downloader::new(staging, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_successful_download_is_staged() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hourly/Laramie.dat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("TIMESTAMP,AirTemp\n"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new()?;
        let downloader = downloader(&temp_dir)?;
        let site = Site::new(1, "Laramie", &format!("{}/hourly/Laramie.dat", server.uri()));

        let staged = downloader.fetch(&site, &CancellationToken::new()).await?;

        assert!(staged.ends_with("tmp/Laramie.dat"));
        assert_eq!(std::fs::read_to_string(staged)?, "TIMESTAMP,AirTemp\n");

        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new()?;
        let downloader = downloader(&temp_dir)?;
        let site = Site::new(1, "Gone", &format!("{}/Gone.dat", server.uri()));

        let result = downloader.fetch(&site, &CancellationToken::new()).await;

        assert!(matches!(result, Err(SyncError::Fetch { .. })));
        assert!(downloader.staging().list_files()?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_is_fetch_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("TIMESTAMP,AirTemp\n")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let temp_dir = TempDir::new()?;
        let staging = StagingArea::new(temp_dir.path().join("tmp"));
        staging.prepare()?;
        let downloader = Downloader::new(staging, Duration::from_millis(300))?;
        let site = Site::new(1, "Stalled", &format!("{}/Stalled.dat", server.uri()));

        let result = downloader.fetch(&site, &CancellationToken::new()).await;

        assert!(matches!(result, Err(SyncError::Fetch { .. })));
        assert!(downloader.staging().list_files()?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_download() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new()?;
        let downloader = downloader(&temp_dir)?;
        let site = Site::new(1, "Slow", &format!("{}/Slow.dat", server.uri()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = downloader.fetch(&site, &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));

        Ok(())
    }
}
