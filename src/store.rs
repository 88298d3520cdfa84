//! Append-only directory of installed extensions

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;
use url::Url;

use crate::extension::EXTENSION_SUFFIX;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unable to create extension directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to read extension directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("extension {0} already exists")]
    AlreadyExists(String),
    #[error("unable to write extension {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Last path segment of a URL, used as the extension's file name.
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
    {
        return last.to_string();
    }
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// File name without the extension suffix, e.g. `hello` for `hello.yaml`.
#[must_use]
pub fn short_name(file_name: &str) -> &str {
    file_name.strip_suffix(EXTENSION_SUFFIX).unwrap_or(file_name)
}

/// Whether `file_name` may be stored: it carries the suffix and a non-empty stem.
#[must_use]
pub fn is_valid_file_name(file_name: &str) -> bool {
    file_name
        .strip_suffix(EXTENSION_SUFFIX)
        .is_some_and(|stem| !stem.is_empty() && !stem.contains(['/', '\\']))
}

/// Directory holding one file per installed extension. Files are never overwritten.
#[derive(Debug, Clone)]
pub struct ExtensionStore {
    dir: PathBuf,
}

impl ExtensionStore {
    /// Open the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CreateDir` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        debug!("Extension store at {}", dir.display());
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    #[must_use]
    pub fn contains(&self, file_name: &str) -> bool {
        self.path_for(file_name).exists()
    }

    /// Write `contents` under `file_name`, failing if the file already exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the name is taken, or
    /// `StoreError::Write` on any other IO failure.
    pub fn persist(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path_for(file_name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(file_name.to_string())
                } else {
                    StoreError::Write {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
        file.write_all(contents)
            .and_then(|()| file.sync_all())
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        info!("Stored extension {}", path.display());
        Ok(path)
    }

    /// Sources of all installed extensions, in file name order.
    ///
    /// Unreadable files are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ReadDir` if the directory cannot be listed.
    pub fn sources(&self) -> Result<Vec<(String, String)>, StoreError> {
        let read_dir_error = |source| StoreError::ReadDir {
            path: self.dir.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_dir_error)? {
            let entry = entry.map_err(read_dir_error)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_valid_file_name(&name) && entry.path().is_file() {
                names.push(name);
            }
        }
        names.sort();

        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            match fs::read_to_string(self.path_for(&name)) {
                Ok(source) => sources.push((name, source)),
                Err(e) => warn!("Skipping unreadable extension {name}: {e}"),
            }
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/cmds/hello.yaml"),
            "hello.yaml"
        );
        assert_eq!(
            file_name_from_url("https://example.com/hello.yaml?v=2"),
            "hello.yaml"
        );
        assert_eq!(file_name_from_url("https://example.com/cmds/"), "");
        assert_eq!(file_name_from_url("not a url/hello.yaml"), "hello.yaml");
    }

    #[test]
    fn test_valid_file_names() {
        assert!(is_valid_file_name("hello.yaml"));
        assert!(!is_valid_file_name("hello.py"));
        assert!(!is_valid_file_name(".yaml"));
        assert!(!is_valid_file_name(""));
        assert_eq!(short_name("hello.yaml"), "hello");
    }

    #[test]
    fn test_persist_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtensionStore::open(dir.path().join("commands")).unwrap();
        store.persist("hello.yaml", b"first").unwrap();
        assert!(store.contains("hello.yaml"));

        match store.persist("hello.yaml", b"second") {
            Err(StoreError::AlreadyExists(name)) => assert_eq!(name, "hello.yaml"),
            other => panic!("Expected AlreadyExists, got: {other:?}"),
        }
        assert_eq!(fs::read(store.path_for("hello.yaml")).unwrap(), b"first");
    }

    #[test]
    fn test_sources_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtensionStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("b.yaml"), "b").unwrap();
        fs::write(dir.path().join("a.yaml"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("dir.yaml")).unwrap();

        let sources = store.sources().unwrap();
        assert_eq!(
            sources,
            vec![
                ("a.yaml".to_string(), "a".to_string()),
                ("b.yaml".to_string(), "b".to_string()),
            ]
        );
    }
}
