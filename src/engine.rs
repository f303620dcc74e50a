//! The linking engine.
//!
//! Owns the title index, the pattern cache, the batch orchestrator, and the
//! persisted run state, and drives a [`DocumentStore`] through the
//! processing modes:
//!
//! | Mode | Documents | Checkpoint |
//! |------|-----------|------------|
//! | [`process_document`](Engine::process_document) | one | untouched |
//! | [`process_vault`](Engine::process_vault) | every non-excluded document | advanced |
//! | [`process_incremental`](Engine::process_incremental) | modified since the checkpoint | advanced |
//! | [`preview`](Engine::preview) | one, never written | untouched |
//!
//! Every store read and write goes through [`with_retry`]. A document is
//! written only when synthesis changed it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::batch::Orchestrator;
use crate::candidates::{sanitize_groups, select_candidates, SynonymGroup};
use crate::config::Config;
use crate::error::LinkError;
use crate::index::{ExclusionRules, TitleIndex};
use crate::models::{BatchResult, DocumentMeta, DocumentOutcome, SynthesisResult};
use crate::pattern::PatternCache;
use crate::progress::{LinkProgressEvent, LinkProgressReporter, NoProgress};
use crate::retry::{with_retry, RetryPolicy};
use crate::state::RunState;
use crate::stats::LinkStats;
use crate::store::{ChangeEvent, DocumentStore};
use crate::synth::{synthesize, SynthesisOptions};

/// Everything derived from [`Config`], replaced as a whole on reconfigure.
struct Settings {
    config: Config,
    rules: ExclusionRules,
    synthesis: SynthesisOptions,
    synonyms: Option<Vec<SynonymGroup>>,
    retry: RetryPolicy,
}

impl Settings {
    fn from_config(config: Config) -> Self {
        let synonyms = config
            .synonyms
            .enabled
            .then(|| sanitize_groups(&config.synonyms.groups));
        Self {
            rules: ExclusionRules::from_config(&config.exclude),
            synthesis: SynthesisOptions::from_config(&config),
            retry: RetryPolicy::from_config(&config.batch),
            synonyms,
            config,
        }
    }
}

pub struct Engine<S: DocumentStore> {
    store: S,
    settings: RwLock<Settings>,
    index: RwLock<TitleIndex>,
    documents: RwLock<BTreeMap<String, DocumentMeta>>,
    patterns: PatternCache,
    orchestrator: Orchestrator,
    state: Mutex<RunState>,
    state_path: Option<PathBuf>,
    reporter: Box<dyn LinkProgressReporter>,
}

impl<S: DocumentStore> Engine<S> {
    /// Create an engine with an empty index. Call
    /// [`rebuild_index`](Self::rebuild_index) or one of the batch modes
    /// before linking single documents.
    pub fn new(config: Config, store: S) -> Self {
        let state_path = Some(config.state_path());
        let orchestrator = Orchestrator::new(config.batch.effective_size());
        Self {
            store,
            settings: RwLock::new(Settings::from_config(config)),
            index: RwLock::new(TitleIndex::default()),
            documents: RwLock::new(BTreeMap::new()),
            patterns: PatternCache::new(),
            orchestrator,
            state: Mutex::new(RunState::default()),
            state_path,
            reporter: Box::new(NoProgress),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn LinkProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Keep the checkpoint and statistics in memory only.
    pub fn without_persistence(mut self) -> Self {
        self.state_path = None;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn pause(&self) {
        self.orchestrator.pause();
    }

    pub fn resume(&self) {
        self.orchestrator.resume();
    }

    fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(|e| e.into_inner())
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> Config {
        self.settings().config.clone()
    }

    // ============ State ============

    /// Load the persisted checkpoint and statistics and start a new session.
    pub async fn load_state(&self) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let mut loaded = RunState::load(path).await?;
        loaded.stats.reset_session();
        *self.run_state() = loaded;
        Ok(())
    }

    pub async fn save_state(&self) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let snapshot = self.run_state().clone();
        snapshot.save(path).await
    }

    pub fn stats(&self) -> LinkStats {
        self.run_state().stats.clone()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.run_state().last_run
    }

    pub fn set_last_run(&self, at: Option<DateTime<Utc>>) {
        self.run_state().last_run = at;
    }

    // ============ Index ============

    /// Rebuild the title index from the full document list.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let docs = self.store.list_documents().await?;
        let index = {
            let settings = self.settings();
            TitleIndex::rebuild(&docs, &settings.rules)
        };
        let titles = index.len();
        let documents = docs.len();

        *self.index.write().unwrap_or_else(|e| e.into_inner()) = index;
        *self.documents.write().unwrap_or_else(|e| e.into_inner()) =
            docs.into_iter().map(|d| (d.id.clone(), d)).collect();

        info!(titles, documents, "title index rebuilt");
        Ok(titles)
    }

    pub fn titles(&self) -> Vec<String> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .titles()
    }

    fn is_excluded(&self, meta: &DocumentMeta) -> bool {
        self.settings().rules.is_excluded(meta)
    }

    fn cached_meta(&self, id: &str) -> Option<DocumentMeta> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    async fn meta(&self, id: &str) -> Result<DocumentMeta> {
        if let Some(meta) = self.cached_meta(id) {
            return Ok(meta);
        }
        self.rebuild_index().await?;
        match self.cached_meta(id) {
            Some(meta) => Ok(meta),
            None => bail!("unknown document: {}", id),
        }
    }

    /// Ids of non-excluded documents accepted by `keep`, in id order.
    fn eligible_ids(&self, keep: impl Fn(&DocumentMeta) -> bool) -> Vec<String> {
        let settings = self.settings();
        let now = Utc::now();
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|d| !settings.rules.is_excluded_at(d, now) && keep(d))
            .map(|d| d.id.clone())
            .collect()
    }

    // ============ Synthesis ============

    /// Synthesize links into `text` for the document titled `title`.
    pub fn synthesize(&self, title: &str, text: &str) -> SynthesisResult {
        let settings = self.settings();
        let candidates = {
            let index = self.index.read().unwrap_or_else(|e| e.into_inner());
            select_candidates(index.iter(), title, settings.synonyms.as_deref())
        };
        synthesize(
            text,
            &candidates,
            title,
            &settings.synthesis,
            &self.patterns,
        )
    }

    async fn read(&self, id: &str) -> Result<String, LinkError> {
        let policy = self.settings().retry;
        with_retry(&policy, "read", id, || self.store.read(id)).await
    }

    async fn write(&self, id: &str, text: &str) -> Result<(), LinkError> {
        let policy = self.settings().retry;
        with_retry(&policy, "write", id, || self.store.write(id, text)).await
    }

    /// Read, synthesize, and write back one document. The caller holds the
    /// in-flight guard.
    async fn link_meta(&self, meta: &DocumentMeta) -> DocumentOutcome {
        let started = Instant::now();

        let text = match self.read(&meta.id).await {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                return DocumentOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let result = self.synthesize(&meta.title, &text);
        if result.changed {
            if let Err(e) = self.write(&meta.id, &result.text).await {
                warn!("{}", e);
                return DocumentOutcome::Failed {
                    error: e.to_string(),
                };
            }
            debug!("linked '{}': {} link(s)", meta.id, result.link_count);
        }

        self.run_state().stats.record(
            &meta.id,
            &result.applied_targets(),
            result.link_count,
            started.elapsed(),
        );

        if result.changed {
            DocumentOutcome::Linked {
                links: result.link_count,
            }
        } else {
            DocumentOutcome::Unchanged
        }
    }

    async fn link_id(&self, id: String) -> DocumentOutcome {
        match self.cached_meta(&id) {
            Some(meta) => self.link_meta(&meta).await,
            None => DocumentOutcome::Failed {
                error: format!("unknown document: {}", id),
            },
        }
    }

    // ============ Modes ============

    /// Link one document now. Skipped when it is excluded or already in flight.
    pub async fn process_document(&self, id: &str) -> Result<DocumentOutcome> {
        let meta = self.meta(id).await?;
        if self.is_excluded(&meta) {
            debug!("'{}' is excluded", id);
            return Ok(DocumentOutcome::Skipped);
        }
        let Some(_guard) = self.orchestrator.in_flight().try_acquire(id) else {
            debug!("'{}' already in flight", id);
            return Ok(DocumentOutcome::Skipped);
        };
        let outcome = self.link_meta(&meta).await;
        self.save_state().await?;
        Ok(outcome)
    }

    /// Run the given documents through the orchestrator.
    pub async fn run_batch(&self, ids: &[String]) -> BatchResult {
        self.orchestrator
            .run(ids, self.reporter.as_ref(), |id| self.link_id(id))
            .await
    }

    /// Link every non-excluded document.
    pub async fn process_vault(&self) -> Result<BatchResult> {
        let started = Utc::now();
        self.reporter.report(LinkProgressEvent::Scanning);
        self.rebuild_index().await?;

        let ids = self.eligible_ids(|_| true);
        info!(documents = ids.len(), "linking corpus");
        let result = self.run_batch(&ids).await;

        self.set_last_run(Some(started));
        self.save_state().await?;
        Ok(result)
    }

    /// Link documents modified after the last checkpoint, then advance it to
    /// this run's start time.
    pub async fn process_incremental(&self) -> Result<BatchResult> {
        let started = Utc::now();
        let since = self.last_run();
        self.reporter.report(LinkProgressEvent::Scanning);
        self.rebuild_index().await?;

        let ids = self.eligible_ids(|d| since.map_or(true, |t| d.modified > t));
        info!(
            documents = ids.len(),
            since = %since.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string()),
            "incremental linking"
        );
        let result = self.run_batch(&ids).await;

        self.set_last_run(Some(started));
        self.save_state().await?;
        Ok(result)
    }

    /// Synthesize one document without writing it.
    pub async fn preview(&self, id: &str) -> Result<SynthesisResult> {
        let meta = self.meta(id).await?;
        let text = self.read(id).await?;
        Ok(self.synthesize(&meta.title, &text))
    }

    /// React to a store change. Structural changes rebuild the index;
    /// modifications link the document when auto-linking on save is enabled.
    pub async fn handle_change(&self, event: ChangeEvent) -> Result<Option<DocumentOutcome>> {
        debug!("change: {:?}", event);
        if event.is_structural() {
            self.rebuild_index().await?;
            return Ok(None);
        }

        let ChangeEvent::Modified(id) = event else {
            return Ok(None);
        };
        if !self.settings().config.batch.auto_link_on_save {
            return Ok(None);
        }
        self.process_document(&id).await.map(Some)
    }

    /// Apply new settings: exclusion rules, matching options, and batch
    /// size all change, so the pattern cache is cleared and the index rebuilt.
    pub async fn reconfigure(&self, config: Config) -> Result<usize> {
        self.orchestrator
            .set_batch_size(config.batch.effective_size());
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = Settings::from_config(config);
        self.patterns.invalidate();
        self.rebuild_index().await
    }
}
