use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

use crate::error::Error;

/// File system utilities
pub struct FsUtils;

impl FsUtils {
    /// Ensure the directory exists
    pub async fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> Result<(), Error> {
        let path = path.as_ref();

        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path).await?;
        }

        Ok(())
    }

    /// Write to a file (create the directory if it does not exist)
    pub async fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<(), Error> {
        let path = path.as_ref();
        trace!("Writing {} bytes to file: {}", contents.as_ref().len(), path.display());

        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, contents).await?;
        Ok(())
    }

    /// Write a file readable only by its owner, for private keys
    pub async fn write_private_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<(), Error> {
        let path = path.as_ref();
        trace!("Writing {} bytes to private file: {}", contents.as_ref().len(), path.display());

        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        #[cfg(unix)]
        {
            use tokio::io::AsyncWriteExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .await?;
            file.write_all(contents.as_ref()).await?;
            file.flush().await?;

            // mode() only applies on creation; tighten a pre-existing file too
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents).await?;
        }

        Ok(())
    }

    /// Hidden sibling used to stage a write before [`FsUtils::commit`]
    pub fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.certrelay-tmp", name))
    }

    /// Move a staged file over its target
    pub async fn commit(staged: &Path, target: &Path) -> Result<(), Error> {
        fs::rename(staged, target).await?;
        Ok(())
    }

    /// Best-effort removal of a staged file
    pub async fn discard(staged: &Path) {
        if let Err(e) = fs::remove_file(staged).await {
            trace!("Could not remove {}: {}", staged.display(), e);
        }
    }

    /// Read file as a string, `None` when it does not exist
    pub async fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<String>, Error> {
        match fs::read_to_string(path.as_ref()).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
