use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Flat directory holding uploaded attachments.
///
/// Files end up at `{dir}/{file_name}` under the client-supplied name. A
/// second upload with the same name replaces the first one's bytes.
///
/// Uploads are first staged under a private temporary name and only moved to
/// their final name by [`StagedUpload::publish`], which the caller runs while
/// the registration row is being committed. A failed request therefore only
/// ever removes its own temporary files, never a file a committed row uses.
pub struct UploadDir {
    dir: PathBuf,
    seq: AtomicU64,
}

/// An upload written to a temporary file next to its final path.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub temp_path: PathBuf,
    pub path: PathBuf,
}

impl StagedUpload {
    /// Path string recorded in the database.
    pub fn stored_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Move the staged bytes to the final path, replacing any file there.
    /// Blocking; called from the store's transaction on the blocking pool.
    pub fn publish(&self) -> std::io::Result<()> {
        std::fs::rename(&self.temp_path, &self.path)
    }
}

impl UploadDir {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn temp_path(&self, file_name: &str) -> PathBuf {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.part", file_name, std::process::id(), seq))
    }

    /// Write `data` to a fresh temporary file for `file_name`.
    ///
    /// `file_name` must already be reduced to a single path component
    /// (see [`sanitize_file_name`]).
    pub async fn stage(&self, file_name: &str, data: &[u8]) -> std::io::Result<StagedUpload> {
        let temp_path = self.temp_path(file_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            fs::remove_file(&temp_path).await.ok();
            return Err(e);
        }

        Ok(StagedUpload {
            temp_path,
            path: self.file_path(file_name),
        })
    }

    /// Remove the temporary files of a request that did not commit.
    /// Uploads that were already published are left in place.
    pub async fn discard(&self, staged: &[StagedUpload]) {
        for upload in staged {
            match fs::remove_file(&upload.temp_path).await {
                Ok(()) => info!("Removed staged upload {}", upload.temp_path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove staged upload {}: {}",
                    upload.temp_path.display(),
                    e
                ),
            }
        }
    }
}

/// Reduce a client filename to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left (`""`, `"."`, `".."`, `"dir/"`).
pub fn sanitize_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    match name {
        "" | "." | ".." => None,
        name if name.contains('\0') => None,
        name => Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn plain_names_are_kept() {
        assert_eq!(sanitize_file_name("front.png"), Some("front.png"));
        assert_eq!(sanitize_file_name("my voice note.m4a"), Some("my voice note.m4a"));
    }

    #[test]
    fn directories_are_stripped() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\left.jpg"), Some("left.jpg"));
        assert_eq!(sanitize_file_name("/abs/right.jpg"), Some("right.jpg"));
    }

    #[test]
    fn unusable_names_are_rejected() {
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("a/.."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name("bad\0name"), None);
    }

    #[tokio::test]
    async fn new_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("uploads");
        let uploads = UploadDir::new(dir.clone()).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(uploads.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn staged_upload_is_invisible_until_published() {
        let tmp = TempDir::new().unwrap();
        let uploads = UploadDir::new(tmp.path().to_path_buf()).await.unwrap();

        let staged = uploads.stage("a.bin", b"bytes").await.unwrap();
        assert_eq!(staged.path, tmp.path().join("a.bin"));
        assert!(!staged.path.exists());
        assert_eq!(std::fs::read(&staged.temp_path).unwrap(), b"bytes");

        staged.publish().unwrap();
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"bytes");
        assert!(!staged.temp_path.exists());
    }

    #[tokio::test]
    async fn concurrent_stages_of_one_name_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let uploads = UploadDir::new(tmp.path().to_path_buf()).await.unwrap();

        let a = uploads.stage("p.png", b"from a").await.unwrap();
        let b = uploads.stage("p.png", b"from b").await.unwrap();
        assert_ne!(a.temp_path, b.temp_path);
        assert_eq!(a.path, b.path);

        // b commits, a fails afterwards: b's file must survive a's cleanup.
        b.publish().unwrap();
        uploads.discard(&[a.clone()]).await;

        assert_eq!(std::fs::read(&b.path).unwrap(), b"from b");
        assert!(!a.temp_path.exists());
    }

    #[tokio::test]
    async fn publish_overwrites_earlier_file() {
        let tmp = TempDir::new().unwrap();
        let uploads = UploadDir::new(tmp.path().to_path_buf()).await.unwrap();
        std::fs::write(tmp.path().join("shared.png"), b"old").unwrap();

        let staged = uploads.stage("shared.png", b"new").await.unwrap();
        staged.publish().unwrap();
        assert_eq!(std::fs::read(tmp.path().join("shared.png")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn discard_leaves_published_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let uploads = UploadDir::new(tmp.path().to_path_buf()).await.unwrap();
        std::fs::write(tmp.path().join("shared.png"), b"earlier").unwrap();

        let published = uploads.stage("kept.png", b"x").await.unwrap();
        published.publish().unwrap();
        let pending = uploads.stage("shared.png", b"later").await.unwrap();

        uploads.discard(&[published.clone(), pending.clone()]).await;

        assert!(published.path.exists());
        assert!(!pending.temp_path.exists());
        assert_eq!(std::fs::read(tmp.path().join("shared.png")).unwrap(), b"earlier");
    }

    #[tokio::test]
    async fn stage_fails_when_directory_is_gone() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("uploads");
        let uploads = UploadDir::new(dir.clone()).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(uploads.stage("a.bin", b"bytes").await.is_err());
    }
}
