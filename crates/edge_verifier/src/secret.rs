//! Where the verifier gets the shared signing secret from.
//!
//! Two provisioning models exist: the secret is compiled into the artifact
//! ([`InlineSecret`]), or it is read from the host's key/value store on each request
//! ([`KeyValueSecret`]). Any failure to load it denies the request.

use crate::TokenError;

/// Upper bound for a secret read from a key/value store.
pub const MAX_SECRET_LEN: usize = 512;

pub trait SecretSource {
    /// Run `f` with the secret bytes.
    ///
    /// # Errors
    ///
    /// [`TokenError::SecretUnavailable`] when the secret cannot be loaded or is empty.
    fn with_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, TokenError>;
}

impl<T: SecretSource + ?Sized> SecretSource for &T {
    fn with_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, TokenError> {
        (**self).with_secret(f)
    }
}

/// Secret embedded in the artifact at build time.
#[derive(Clone, Copy)]
pub struct InlineSecret<'a>(pub &'a [u8]);

impl SecretSource for InlineSecret<'_> {
    fn with_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, TokenError> {
        if self.0.is_empty() {
            return Err(TokenError::SecretUnavailable);
        }
        Ok(f(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    NotFound,
    TooLarge,
    Unavailable,
}

/// Synchronous read access to the host's key/value store.
pub trait KeyValueRead {
    /// Copy the value stored under `key` into `buf` and return its length.
    ///
    /// # Errors
    ///
    /// [`ReadError::TooLarge`] if the value does not fit `buf`, otherwise whatever the
    /// store reports.
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, ReadError>;
}

/// Secret fetched from a key/value store under a fixed key.
pub struct KeyValueSecret<'a, K: ?Sized> {
    store: &'a K,
    key: &'a str,
}

impl<'a, K: KeyValueRead + ?Sized> KeyValueSecret<'a, K> {
    #[must_use]
    pub const fn new(store: &'a K, key: &'a str) -> Self {
        Self { store, key }
    }
}

impl<K: KeyValueRead + ?Sized> SecretSource for KeyValueSecret<'_, K> {
    fn with_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, TokenError> {
        let mut buf = [0u8; MAX_SECRET_LEN];
        match self.store.read(self.key, &mut buf) {
            Ok(len) if len > 0 && len <= MAX_SECRET_LEN => Ok(f(&buf[..len])),
            _ => Err(TokenError::SecretUnavailable),
        }
    }
}
