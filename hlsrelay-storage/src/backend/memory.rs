// In-memory storage backend
//
// Data is lost on restart. Bounded by a key count and a byte budget; when
// either is exceeded the oldest writes are evicted first. The time-ordered
// index is a BTreeMap keyed by a monotonic sequence number, so finding the
// oldest entry is O(log N).

use super::HlsStorage;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;

/// Default max memory: 512 MB
const DEFAULT_MAX_MEMORY_BYTES: usize = 512 * 1024 * 1024;
/// Default max keys: 10,000
const DEFAULT_MAX_KEYS: usize = 10_000;

struct Entry {
    data: Bytes,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Entry>,
    by_age: BTreeMap<u64, String>,
    total_bytes: usize,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        match self.data.remove(key) {
            Some(entry) => {
                self.total_bytes -= entry.data.len();
                self.by_age.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.by_age.pop_first() else {
            return false;
        };
        if let Some(entry) = self.data.remove(&key) {
            self.total_bytes -= entry.data.len();
        }
        true
    }

    fn evict_for(&mut self, incoming: usize, max_keys: usize, max_bytes: usize) -> usize {
        let mut evicted = 0;
        while (max_keys > 0 && self.data.len() >= max_keys)
            || (max_bytes > 0 && self.total_bytes + incoming > max_bytes)
        {
            if !self.evict_oldest() {
                break;
            }
            evicted += 1;
        }
        evicted
    }
}

/// In-memory storage backend with configurable limits.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
    max_memory_bytes: usize,
    max_keys: usize,
}

impl MemoryStorage {
    /// Create new memory storage with default limits (512 MB, 10,000 keys)
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_MEMORY_BYTES, DEFAULT_MAX_KEYS)
    }

    /// Create new memory storage with custom limits (0 = unlimited)
    #[must_use]
    pub fn with_limits(max_memory_bytes: usize, max_keys: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_memory_bytes,
            max_keys,
        }
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.inner.lock().total_bytes
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.lock().data.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HlsStorage for MemoryStorage {
    async fn write(&self, key: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        if self.max_memory_bytes > 0 && size > self.max_memory_bytes {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Data size ({size} bytes) exceeds max memory limit ({} bytes)",
                    self.max_memory_bytes
                ),
            ));
        }

        let mut inner = self.inner.lock();
        inner.remove(key);

        let evicted = inner.evict_for(size, self.max_keys, self.max_memory_bytes);
        if evicted > 0 {
            tracing::debug!(
                evicted,
                keys = inner.data.len(),
                memory_bytes = inner.total_bytes,
                "Evicted old entries from memory storage"
            );
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.total_bytes += size;
        inner.by_age.insert(seq, key.to_string());
        inner.data.insert(key.to_string(), Entry { data, seq });

        tracing::trace!("Wrote to memory: {} ({} bytes)", key, size);

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        self.inner
            .lock()
            .data
            .get(key)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("Key not found: {key}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().data.contains_key(key))
    }
}
