use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "acquisition";
const DATA_DIR_ENV: &str = "ACQUISITION_DATA_DIR";

/// Directory demo runs write their datasets to: `$ACQUISITION_DATA_DIR`, or
/// `acquisition/` under the platform's local data directory.
pub fn get_data_dir() -> io::Result<PathBuf> {
    if let Ok(dir) = crate::config::required_env(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|p| p.join(DATA_DIR_NAME))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system data directory",
            )
        })
}

/// Creates `path` (and parents) if it does not exist yet.
pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_dir_exists_creates_nested() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let nested = tmp.path().join("data").join("flights");
        ensure_dir_exists(&nested).await?;
        assert!(nested.is_dir());
        // Second call is a no-op
        ensure_dir_exists(&nested).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_dir_exists_rejects_file() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x")?;
        assert!(ensure_dir_exists(&file).await.is_err());
        Ok(())
    }
}
