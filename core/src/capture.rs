use crate::driver::Driver;
use crate::error::CaptureError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes screenshots for evidence. Never decides pass or fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceCapture;

impl EvidenceCapture {
    /// Missing parent directories are created first.
    pub async fn capture(
        &self,
        driver: &mut dyn Driver,
        path: &Path,
    ) -> Result<PathBuf, CaptureError> {
        let result = self.try_capture(driver, path).await;
        match &result {
            Ok(_) => info!(path = %path.display(), "screenshot captured"),
            Err(err) => warn!(%err, "screenshot not captured"),
        }
        result
    }

    async fn try_capture(
        &self,
        driver: &mut dyn Driver,
        path: &Path,
    ) -> Result<PathBuf, CaptureError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| CaptureError {
                    path: path.to_path_buf(),
                    reason: format!("cannot create {}: {err}", parent.display()),
                })?;
        }
        driver.screenshot(path).await?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakePage;

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("evidence/nested/month.png");
        let mut page = FakePage::new();

        let written = EvidenceCapture
            .capture(&mut page, &path)
            .await
            .expect("captured");
        assert_eq!(written, path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn driver_failure_becomes_capture_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("month.png");
        let mut page = FakePage::new().failing_screenshots();

        let err = EvidenceCapture
            .capture(&mut page, &path)
            .await
            .unwrap_err();
        assert_eq!(err.path, path);
        assert!(!path.exists());
    }
}
