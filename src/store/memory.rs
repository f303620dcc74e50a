//! In-memory [`DocumentStore`] for tests and embedding.
//!
//! Uses `HashMap`s behind `std::sync` locks. Besides plain storage it can
//! simulate a flaky backend (fail the next N reads or writes of a document)
//! and slow I/O (a fixed latency on every read), and it records how many
//! reads of the same document ever overlapped.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::DocumentStore;
use crate::models::DocumentMeta;

struct StoredDoc {
    meta: DocumentMeta,
    text: String,
}

#[derive(Default)]
struct Faults {
    reads: HashMap<String, u32>,
    writes: HashMap<String, u32>,
}

#[derive(Default)]
struct Concurrency {
    active: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

pub struct InMemoryStore {
    docs: RwLock<BTreeMap<String, StoredDoc>>,
    faults: Mutex<Faults>,
    concurrency: Mutex<Concurrency>,
    read_latency: Option<Duration>,
    writes: Mutex<u64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            concurrency: Mutex::new(Concurrency::default()),
            read_latency: None,
            writes: Mutex::new(0),
        }
    }

    /// Sleep this long inside every read, so concurrent passes interleave.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Insert a document whose id and title are both `title` (plus `.md` for the id).
    pub fn insert(&self, title: &str, text: &str) {
        let mut meta = DocumentMeta::new(format!("{}.md", title), title);
        meta.size = text.len() as u64;
        self.insert_meta(meta, text);
    }

    pub fn insert_meta(&self, meta: DocumentMeta, text: &str) {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.insert(
            meta.id.clone(),
            StoredDoc {
                meta,
                text: text.to_string(),
            },
        );
    }

    pub fn remove(&self, id: &str) {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.remove(id);
    }

    pub fn text(&self, id: &str) -> Option<String> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        docs.get(id).map(|d| d.text.clone())
    }

    /// Make the next `count` reads of `id` fail.
    pub fn fail_reads(&self, id: &str, count: u32) {
        lock(&self.faults).reads.insert(id.to_string(), count);
    }

    /// Make the next `count` writes of `id` fail.
    pub fn fail_writes(&self, id: &str, count: u32) {
        lock(&self.faults).writes.insert(id.to_string(), count);
    }

    /// Highest number of overlapping reads ever observed for any single document.
    pub fn peak_concurrency(&self) -> usize {
        lock(&self.concurrency)
            .peak
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u64 {
        *lock(&self.writes)
    }

    fn take_fault(map: &mut HashMap<String, u32>, id: &str) -> bool {
        match map.get_mut(id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn enter(&self, id: &str) {
        let mut c = lock(&self.concurrency);
        let active = {
            let a = c.active.entry(id.to_string()).or_insert(0);
            *a += 1;
            *a
        };
        let peak = c.peak.entry(id.to_string()).or_insert(0);
        if active > *peak {
            *peak = active;
        }
    }

    fn leave(&self, id: &str) {
        let mut c = lock(&self.concurrency);
        if let Some(a) = c.active.get_mut(id) {
            *a = a.saturating_sub(1);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        Ok(docs.values().map(|d| d.meta.clone()).collect())
    }

    async fn read(&self, id: &str) -> Result<String> {
        self.enter(id);
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
        let result = if Self::take_fault(&mut lock(&self.faults).reads, id) {
            Err(anyhow!("simulated read failure"))
        } else {
            self.text(id)
                .ok_or_else(|| anyhow!("document not found: {}", id))
        };
        self.leave(id);
        result
    }

    async fn write(&self, id: &str, text: &str) -> Result<()> {
        if Self::take_fault(&mut lock(&self.faults).writes, id) {
            bail!("simulated write failure");
        }
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| anyhow!("document not found: {}", id))?;
        doc.text = text.to_string();
        doc.meta.size = text.len() as u64;
        doc.meta.modified = Utc::now();
        drop(docs);
        *lock(&self.writes) += 1;
        Ok(())
    }
}
