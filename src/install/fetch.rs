use std::io;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unable to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Retrieves extension source for a URL
pub trait Fetch {
    /// # Errors
    ///
    /// Returns `FetchError` if the body cannot be retrieved.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Blocking fetcher for `http`, `https` and `file` URLs.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hark/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {
                debug!("Fetching {parsed}");
                let response = self.client.get(parsed).send()?.error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|()| FetchError::UnsupportedScheme(format!("file (host in {url})")))?;
                debug!("Reading {}", path.display());
                std::fs::read(&path).map_err(|source| FetchError::File { path, source })
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.yaml");
        std::fs::write(&path, b"commands: []\n").unwrap();
        let url = Url::from_file_path(&path).unwrap();
        assert_eq!(fetcher().fetch(url.as_str()).unwrap(), b"commands: []\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("missing.yaml")).unwrap();
        assert!(matches!(
            fetcher().fetch(url.as_str()),
            Err(FetchError::File { .. })
        ));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            fetcher().fetch("ftp://example.com/hello.yaml"),
            Err(FetchError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        assert!(matches!(
            fetcher().fetch("hello.yaml"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_closure_fetcher() {
        let fetch = |url: &str| -> Result<Vec<u8>, FetchError> { Ok(url.as_bytes().to_vec()) };
        assert_eq!(Fetch::fetch(&fetch, "abc").unwrap(), b"abc");
    }
}
