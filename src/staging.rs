use std::path::{Path, PathBuf};

use crate::error::ReportError;

/// Flat directory holding uploaded images, keyed by their original filename.
///
/// Two uploads with the same name overwrite each other, and concurrent
/// writers are not coordinated.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub filename: String,
    pub path: PathBuf,
}

impl Staging {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reduce an uploaded filename to its last path component.
    /// Returns `None` when nothing usable is left.
    #[must_use]
    pub fn clean_filename(raw: &str) -> Option<String> {
        let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
        if name.is_empty() || name == "." || name == ".." {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Where `filename` lives (or would live) in the staging area.
    #[must_use]
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        Self::clean_filename(filename).map(|name| self.dir.join(name))
    }

    /// Write `bytes` under `filename`, replacing any previous file of that name.
    ///
    /// # Errors
    ///
    /// Fails if the directory can't be created or the file can't be written.
    pub async fn store(&self, filename: &str, bytes: &[u8]) -> std::io::Result<StagedImage> {
        let Some(name) = Self::clean_filename(filename) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unusable filename: {filename:?}"),
            ));
        };
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "staged upload");
        Ok(StagedImage {
            filename: name,
            path,
        })
    }

    /// Read a staged image back.
    ///
    /// # Errors
    ///
    /// `MissingAsset` if the file isn't there; any other read failure is `Io`.
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, ReportError> {
        let path = self
            .path_for(filename)
            .ok_or_else(|| ReportError::MissingAsset(self.dir.join(filename)))?;
        read_asset(&path)
    }
}

/// Read a file, reporting a missing file as `MissingAsset`.
///
/// # Errors
///
/// `MissingAsset` if `path` does not exist, `Io` for anything else.
pub fn read_asset(path: &Path) -> Result<Vec<u8>, ReportError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ReportError::MissingAsset(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
