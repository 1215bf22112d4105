//! Delivery of finished exports.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use snapreel_common::SnapreelResult;

/// Receives the finished file. Only called for exports that completed.
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `file_name`, returning where they ended up.
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> SnapreelResult<PathBuf>;
}

/// Writes exports into a downloads directory without overwriting: a taken
/// name gets a ` (n)` suffix before the extension.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn candidate_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{file_name} ({attempt})"),
    }
}

/// Run `fill` on a freshly created `file`; a failed fill removes the file so
/// no truncated artifact is left behind.
fn fill_or_remove(
    path: &Path,
    mut file: File,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let result = fill(&mut file).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = result {
        if let Err(remove) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %remove, "Failed to remove partial export");
        }
        return Err(e);
    }
    Ok(())
}

impl ArtifactSink for DirectorySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> SnapreelResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let mut attempt = 0u32;
        loop {
            let path = self.dir.join(candidate_name(file_name, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    fill_or_remove(&path, file, |f| f.write_all(bytes))?;
                    tracing::info!(path = %path.display(), bytes = bytes.len(), "Export delivered");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapreel-sink-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("clip.webm", 0), "clip.webm");
        assert_eq!(candidate_name("clip.webm", 2), "clip (2).webm");
        assert_eq!(candidate_name("clip", 1), "clip (1)");
    }

    #[test]
    fn test_deliver_never_overwrites() {
        let dir = scratch_dir("overwrite");
        let sink = DirectorySink::new(&dir);

        let first = sink.deliver("demo.webm", b"one").unwrap();
        let second = sink.deliver("demo.webm", b"two").unwrap();
        assert_eq!(first, dir.join("demo.webm"));
        assert_eq!(second, dir.join("demo (1).webm"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = scratch_dir("partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("demo.webm");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .unwrap();

        let err = fill_or_remove(&path, file, |f| {
            f.write_all(b"half")?;
            Err(io::Error::new(ErrorKind::Other, "no space left on device"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
