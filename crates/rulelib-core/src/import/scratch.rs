use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use uuid::Uuid;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static pattern compiles"));

/// An uploaded file parked in the upload directory for the duration of one
/// import. The file is removed when the handle is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub async fn persist(dir: &Path, original_name: &str, bytes: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let scratch = Self {
            path: dir.join(format!(
                "{}_{}",
                Uuid::new_v4().simple(),
                sanitize_file_name(original_name)
            )),
        };
        tokio::fs::write(&scratch.path, bytes).await?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "failed to remove scratch upload"),
        }
    }
}

/// Reduces a client-supplied name to a single safe path component, keeping a
/// lowercase extension so the workbook reader can detect the format.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext.to_ascii_lowercase())),
        None => (base, None),
    };

    let stem = UNSAFE_CHARS.replace_all(stem, "_");
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "upload" } else { stem };

    match extension.map(|ext| UNSAFE_CHARS.replace_all(&ext, "").to_string()) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem.to_string(),
    }
}
