use edge_verifier::{KeyValueRead, ReadError, MAX_SECRET_LEN};
use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

/// How long a secret read from the store is reused; bounds how long a rotation takes
/// to reach the guard.
pub const DEFAULT_SECRET_CACHE_TTL: Duration = Duration::from_secs(30);

struct Entry {
    key: String,
    value: Vec<u8>,
    read_at: Instant,
}

/// Reuses the last successful read of a key for `ttl`, so steady-state requests do not
/// touch a blocking store. Failed reads are never cached.
pub struct CachedKeyValue {
    store: Arc<dyn KeyValueRead + Send + Sync>,
    ttl: Duration,
    entry: RwLock<Option<Entry>>,
}

impl CachedKeyValue {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueRead + Send + Sync>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entry: RwLock::new(None),
        }
    }

    fn cached(&self, key: &str, buf: &mut [u8]) -> Option<Result<usize, ReadError>> {
        let guard = self.entry.read().ok()?;
        let entry = guard.as_ref()?;
        if entry.key != key || entry.read_at.elapsed() >= self.ttl {
            return None;
        }
        Some(copy_into(&entry.value, buf))
    }
}

fn copy_into(value: &[u8], buf: &mut [u8]) -> Result<usize, ReadError> {
    let target = buf.get_mut(..value.len()).ok_or(ReadError::TooLarge)?;
    target.copy_from_slice(value);
    Ok(value.len())
}

impl KeyValueRead for CachedKeyValue {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, ReadError> {
        if let Some(hit) = self.cached(key, buf) {
            return hit;
        }

        let mut fresh = [0u8; MAX_SECRET_LEN];
        let len = self.store.read(key, &mut fresh)?;
        let value = fresh.get(..len).ok_or(ReadError::TooLarge)?;
        if let Ok(mut entry) = self.entry.write() {
            *entry = Some(Entry {
                key: key.to_string(),
                value: value.to_vec(),
                read_at: Instant::now(),
            });
        }
        copy_into(value, buf)
    }
}
