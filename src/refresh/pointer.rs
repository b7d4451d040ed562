//! Pointer-file discovery.
//!
//! A pointer file is `<name>.txt` holding one URL; its sibling `<name>` is
//! the content file served at `/cache/<name>`.

use std::path::{Path, PathBuf};

use url::Url;

use crate::refresh::worker::RefreshError;

/// Suffix that marks a pointer file.
pub const POINTER_SUFFIX: &str = ".txt";

/// One `<name>.txt` / `<name>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerFile {
    /// The `.txt` file holding the source URL.
    pub pointer: PathBuf,
    /// The file the fetched body is written to.
    pub content: PathBuf,
    /// Entry name relative to the cache directory, for logs.
    pub name: String,
}

impl PointerFile {
    fn from_path(cache_dir: &Path, pointer: PathBuf) -> Option<Self> {
        let file_name = pointer.file_name()?.to_str()?;
        let stem = file_name.strip_suffix(POINTER_SUFFIX)?;
        if stem.is_empty() {
            return None;
        }
        let content = pointer.with_file_name(stem);
        let name = content
            .strip_prefix(cache_dir)
            .unwrap_or(&content)
            .to_string_lossy()
            .into_owned();
        Some(Self { pointer, content, name })
    }

    /// Temporary file the next body is streamed into before the rename.
    pub fn temp_path(&self) -> PathBuf {
        let stem = self
            .content
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.content.with_file_name(format!(".{}.part", stem))
    }

    /// Read and validate the source URL (surrounding whitespace trimmed).
    pub async fn read_url(&self) -> Result<Url, RefreshError> {
        let raw = tokio::fs::read_to_string(&self.pointer)
            .await
            .map_err(|source| RefreshError::Io {
                path: self.pointer.clone(),
                source,
            })?;

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RefreshError::EmptyPointer(self.pointer.clone()));
        }

        let url = Url::parse(trimmed).map_err(|source| RefreshError::InvalidUrl {
            url: trimmed.to_string(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RefreshError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Every regular `*.txt` file below `cache_dir`, sorted by path.
///
/// Symlinks are not followed.
pub async fn discover(cache_dir: &Path) -> Result<Vec<PointerFile>, RefreshError> {
    let mut found = Vec::new();
    let mut pending = vec![cache_dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|source| RefreshError::Io {
            path: dir.clone(),
            source,
        })?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(RefreshError::Io { path: dir, source }),
            };

            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable cache entry");
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                if let Some(pointer) = PointerFile::from_path(cache_dir, entry.path()) {
                    found.push(pointer);
                }
            }
        }
    }

    found.sort_by(|a, b| a.pointer.cmp(&b.pointer));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_pointer_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("fonts")).unwrap();
        std::fs::write(dir.path().join("jquery.js.txt"), "https://cdn.example/jquery.js").unwrap();
        std::fs::write(dir.path().join("jquery.js"), "old").unwrap();
        std::fs::write(dir.path().join("fonts/inter.css.txt"), "https://cdn.example/inter.css").unwrap();
        std::fs::write(dir.path().join("readme.md"), "not a pointer").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let found = discover(dir.path()).await.unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["fonts/inter.css", "jquery.js"]);
        assert_eq!(found[1].content, dir.path().join("jquery.js"));
    }

    #[tokio::test]
    async fn url_is_trimmed_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let pointer = PointerFile::from_path(dir.path(), path.clone()).unwrap();

        std::fs::write(&path, "  http://127.0.0.1:9/a\n").unwrap();
        assert_eq!(pointer.read_url().await.unwrap().as_str(), "http://127.0.0.1:9/a");

        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(pointer.read_url().await, Err(RefreshError::EmptyPointer(_))));

        std::fs::write(&path, "ftp://example.com/a").unwrap();
        assert!(matches!(pointer.read_url().await, Err(RefreshError::UnsupportedScheme(_))));
    }

    #[test]
    fn bare_suffix_is_not_a_pointer() {
        let dir = Path::new("/srv/cache");
        assert!(PointerFile::from_path(dir, dir.join(".txt")).is_none());

        let pointer = PointerFile::from_path(dir, dir.join("app.js.txt")).unwrap();
        assert_eq!(pointer.temp_path(), dir.join(".app.js.part"));
    }
}
