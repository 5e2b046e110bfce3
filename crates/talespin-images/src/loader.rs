//! Scans configured directories for supported source images.
//!
//! A file is accepted if its lowercase extension is one of
//! [`SUPPORTED_EXTENSIONS`], or, when sniffing is enabled, its leading bytes
//! match a known magic sequence. Symlinks are followed but a cycle (a link
//! that resolves back to an already-visited directory) is detected and
//! skipped rather than looped forever.

use crate::error::PipelineError;
use sha2::Digest;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use talespin_core::Config;
use tokio::sync::OnceCell;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// A single accepted source image, identified by path. The content hash is
/// computed lazily (streamed, not buffered whole) and memoized since it is
/// needed again on every cache probe.
#[derive(Debug)]
pub struct SourceRef {
    pub path: PathBuf,
    hash: OnceCell<[u8; 32]>,
}

impl SourceRef {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            hash: OnceCell::new(),
        }
    }

    pub async fn content_hash(&self) -> Result<[u8; 32], PipelineError> {
        self.hash
            .get_or_try_init(|| hash_file(&self.path))
            .await
            .copied()
    }
}

async fn hash_file(path: &Path) -> Result<[u8; 32], PipelineError> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    let mut hasher = sha2::Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Directories shipped with the server, scanned unless
/// `TALESPIN_DISABLE_BUILTIN_IMAGES_P` is set.
fn builtin_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("assets/cards")]
}

/// Walks every configured directory and returns a deduplicated,
/// path-sorted list of accepted source images. Fails fatally on an empty
/// final set — the room engine cannot deal a game with zero cards.
pub fn discover(config: &Config) -> Result<Vec<SourceRef>, PipelineError> {
    let mut roots = Vec::new();
    if !config.disable_builtin_images {
        roots.extend(builtin_dirs());
    }
    roots.extend(config.extra_image_dirs.iter().cloned());

    if roots.is_empty() {
        return Err(PipelineError::NoDirectories);
    }

    let mut seen_paths = HashSet::new();
    let mut accepted = Vec::new();

    for root in &roots {
        walk(root, config.sniff_extensionless_images, &mut seen_paths, &mut accepted);
    }

    accepted.sort();
    accepted.dedup();

    if accepted.is_empty() {
        return Err(PipelineError::NoImagesFound);
    }

    Ok(accepted.into_iter().map(SourceRef::new).collect())
}

fn walk(root: &Path, sniff: bool, seen_dirs: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
    let canonical = match std::fs::canonicalize(root) {
        Ok(p) => p,
        Err(_) => return,
    };
    if !seen_dirs.insert(canonical.clone()) {
        return; // symlink cycle back to an already-walked directory
    }

    let entries = match std::fs::read_dir(root) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.is_dir() {
            walk(&path, sniff, seen_dirs, out);
        } else if metadata.is_file() && is_accepted(&path, sniff) {
            out.push(path);
        }
    }
}

fn is_accepted(path: &Path, sniff: bool) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }
    sniff && sniff_magic(path)
}

fn sniff_magic(path: &Path) -> bool {
    let mut header = [0u8; 12];
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    use std::io::Read;
    let Ok(n) = file.read(&mut header) else {
        return false;
    };
    let header = &header[..n];
    header.starts_with(JPEG_MAGIC)
        || header.starts_with(PNG_MAGIC)
        || (header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_extension");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        assert!(is_accepted(&path, true));
        assert!(!is_accepted(&path, false));
    }

    #[test]
    fn sniffs_webp_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_extension");
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBP");
        std::fs::write(&path, bytes).unwrap();
        assert!(is_accepted(&path, true));
    }

    #[test]
    fn accepts_by_extension_regardless_of_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.JPG");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        assert!(is_accepted(&path, false));
    }

    #[test]
    fn rejects_unknown_extension_without_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(!is_accepted(&path, false));
        assert!(!is_accepted(&path, true));
    }

    #[tokio::test]
    async fn content_hash_is_memoized_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.jpg");
        std::fs::write(&path, b"card bytes").unwrap();
        let source = SourceRef::new(path);
        let first = source.content_hash().await.unwrap();
        let second = source.content_hash().await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn walk_detects_symlink_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        #[cfg(unix)]
        {
            let cycle = sub.join("back_to_root");
            let _ = std::os::unix::fs::symlink(dir.path(), &cycle);
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        // Must terminate rather than recurse forever.
        walk(dir.path(), false, &mut seen, &mut out);
        assert!(seen.contains(&std::fs::canonicalize(dir.path()).unwrap()));
    }
}
