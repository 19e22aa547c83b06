//! Key/value stores for the out-of-band strategy.
//!
//! Writes are upserts: publishing a new value under an existing key replaces it.

use super::DistributionError;
use async_trait::async_trait;
use edge_verifier::{KeyValueRead, ReadError};
use regex::Regex;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};
use tracing::{debug, instrument};
use ulid::Ulid;
use url::Url;

pub const DEFAULT_SECRET_KEY: &str = "jwt-secret";

static KEY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,128}$").ok());

/// Keys are single path segments so they can name a file or a URL segment as is.
///
/// # Errors
/// [`DistributionError::InvalidKey`] otherwise.
pub fn validate_key(key: &str) -> Result<(), DistributionError> {
    let valid = KEY_PATTERN.as_ref().is_some_and(|re| re.is_match(key));
    if valid && key != "." && key != ".." {
        Ok(())
    } else {
        Err(DistributionError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), DistributionError>;

    /// `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributionError>;
}

/// REST store: `PUT {base}/{key}` with the raw bytes, `GET {base}/{key}`.
pub struct HttpKvStore {
    base: Url,
    token: Option<SecretString>,
    client: Client,
}

impl HttpKvStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base: Url,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DistributionError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base,
            token,
            client,
        })
    }

    fn url(&self, key: &str) -> Result<String, DistributionError> {
        validate_key(key)?;
        Ok(format!("{}/{key}", self.base.as_str().trim_end_matches('/')))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl KeyValueStore for HttpKvStore {
    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), DistributionError> {
        let request = self.client.put(self.url(key)?).body(value.to_vec());
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DistributionError::Store {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        debug!("value stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributionError> {
        let request = self.client.get(self.url(key)?);
        let response = self.authorize(request).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(DistributionError::Store {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// One file per key under a directory; the host-local store the in-process edge
/// guard reads.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, DistributionError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), DistributionError> {
        let path = self.path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // rename is atomic, so readers see the old value or the new one
        let staging = self.dir.join(format!(".{key}.tmp-{}", Ulid::new()));
        tokio::fs::write(&staging, value).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600)).await?;
        }
        if let Err(err) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        debug!(path = %path.display(), "value stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DistributionError> {
        match tokio::fs::read(self.path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Blocking file read; the edge guard reaches it through
/// [`CachedKeyValue`](crate::edge::CachedKeyValue).
impl KeyValueRead for FileKvStore {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, ReadError> {
        let path = self.path(key).map_err(|_| ReadError::NotFound)?;
        let bytes = std::fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ReadError::NotFound,
            _ => ReadError::Unavailable,
        })?;
        let target = buf.get_mut(..bytes.len()).ok_or(ReadError::TooLarge)?;
        target.copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

/// Write `secret` under `key`, read it back and require byte equality.
///
/// # Errors
/// Store failures, or [`DistributionError::Mismatch`] if the read-back differs.
#[instrument(skip(store, secret))]
pub async fn publish_secret(
    store: &dyn KeyValueStore,
    key: &str,
    secret: &[u8],
) -> Result<(), DistributionError> {
    store.put(key, secret).await?;
    let stored = store.get(key).await?.ok_or(DistributionError::Mismatch)?;
    if edge_verifier::constant_time_eq(&stored, secret) {
        Ok(())
    } else {
        Err(DistributionError::Mismatch)
    }
}
