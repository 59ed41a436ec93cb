//! Local note persistence: the on-disk files that get uploaded.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Write `body` to `<dir>/<title>.txt`, creating `dir` if needed, and return
/// the path for handing to an upload.
pub async fn save_note(dir: &Path, title: &str, body: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.txt", title));
    fs::write(&path, body).await?;
    Ok(path)
}

pub async fn read_note(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).await
}

/// Remove the local file after its upload completes. A file that is already
/// gone is not an error.
pub async fn remove_note(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_note(dir.path(), "groceries", "milk\neggs")
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "groceries.txt");
        assert_eq!(read_note(&path).await.unwrap(), "milk\neggs");
    }

    #[tokio::test]
    async fn remove_note_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_note(dir.path(), "todo", "ship it").await.unwrap();
        remove_note(&path).await.unwrap();
        assert!(!path.exists());
        remove_note(&path).await.unwrap();
    }
}
