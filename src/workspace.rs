//! The workspace facade.
//!
//! A [`Workspace`] wires the record store, the analysis orchestrator, the
//! graph cache and the snapshot port together and is the single entry point
//! for callers. Every mutation marks the workspace dirty; the snapshot is
//! written by [`Workspace::flush`] / [`Workspace::flush_if_due`], normally
//! driven by [`crate::persistence::spawn_autosave`].

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::analyzer::Analyzer;
use crate::config::DissonanceConfig;
use crate::conflict::{Conflict, ConflictId, Resolution};
use crate::document::{Document, DocumentId, SourceFile, TextFile};
use crate::error::{DissonanceError, DissonanceResult, PersistenceError, ValidationError};
use crate::graph::{GraphCache, RelationshipGraph, ViewportController};
use crate::history::{HistoryEvent, HistoryEventType};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::orchestrator::{AnalysisOutcome, Orchestrator};
use crate::persistence::{Debouncer, FileSnapshotStore, Snapshot, SnapshotPort};
use crate::profile::UserProfile;
use crate::report::{render_report, Report, ReportOptions};
use crate::storage::{InMemoryRecordStore, RecordStore, ResolveOutcome};
use crate::time::{Clock, SystemClock};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, Default)]
struct Session {
    profile: UserProfile,
    report_counter: u32,
}

/// Builder for [`Workspace`].
pub struct WorkspaceBuilder {
    config: DissonanceConfig,
    analyzer: Arc<dyn Analyzer>,
    port: Option<Arc<dyn SnapshotPort>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl WorkspaceBuilder {
    /// Starts a builder with default config, uuid ids and the system clock.
    #[must_use]
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            config: DissonanceConfig::default(),
            analyzer,
            port: None,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: DissonanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the snapshot port. Defaults to a file at `config.snapshot_path`.
    #[must_use]
    pub fn snapshot_port(mut self, port: Arc<dyn SnapshotPort>) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the id generator.
    #[must_use]
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads the snapshot (or starts empty) and returns the workspace.
    ///
    /// A snapshot that cannot be read or fails validation is cleared and
    /// the workspace starts from defaults.
    ///
    /// # Errors
    /// Returns `Validation` if the configuration is invalid. Snapshot
    /// problems are never returned.
    pub fn open(self) -> DissonanceResult<Workspace> {
        let config = self.config.validate()?;
        let port = self
            .port
            .unwrap_or_else(|| Arc::new(FileSnapshotStore::new(config.snapshot_path.clone())) as Arc<dyn SnapshotPort>);

        let restored = match port.load() {
            Ok(Some(snapshot)) => match snapshot.restore(Arc::clone(&self.ids), Arc::clone(&self.clock)) {
                Ok(parts) => Some(parts),
                Err(e) => {
                    discard_snapshot(port.as_ref(), &e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                discard_snapshot(port.as_ref(), &e);
                None
            }
        };

        let (store, session) = match restored {
            Some((store, profile, report_counter)) => {
                tracing::info!(
                    documents = store.documents()?.len(),
                    conflicts = store.conflicts()?.len(),
                    "snapshot loaded"
                );
                (store, Session { profile, report_counter })
            }
            None => (
                InMemoryRecordStore::new(Arc::clone(&self.ids), Arc::clone(&self.clock)),
                Session::default(),
            ),
        };

        let store = Arc::new(store);
        let orchestrator = Orchestrator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            self.analyzer,
            Arc::clone(&self.ids),
            Arc::clone(&self.clock),
        );

        Ok(Workspace {
            graph: GraphCache::new(config.layout),
            autosave: Mutex::new(Debouncer::new(config.autosave_debounce())),
            config,
            store,
            orchestrator,
            port,
            ids: self.ids,
            clock: self.clock,
            session: Mutex::new(session),
        })
    }
}

fn discard_snapshot(port: &dyn SnapshotPort, cause: &PersistenceError) {
    tracing::warn!(error = %cause, "discarding unreadable snapshot, starting from defaults");
    if let Err(e) = port.clear() {
        tracing::warn!(error = %e, "could not clear snapshot");
    }
}

/// The conflict workspace.
pub struct Workspace {
    config: DissonanceConfig,
    store: Arc<InMemoryRecordStore>,
    orchestrator: Orchestrator,
    port: Arc<dyn SnapshotPort>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    session: Mutex<Session>,
    autosave: Mutex<Debouncer>,
    graph: GraphCache,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Shorthand for [`WorkspaceBuilder::new`].
    #[must_use]
    pub fn builder(analyzer: Arc<dyn Analyzer>) -> WorkspaceBuilder {
        WorkspaceBuilder::new(analyzer)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DissonanceConfig {
        &self.config
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// All documents in store order.
    ///
    /// # Errors
    /// Storage failures.
    pub fn documents(&self) -> DissonanceResult<Vec<Document>> {
        Ok(self.store.documents()?)
    }

    /// All conflicts in store order.
    ///
    /// # Errors
    /// Storage failures.
    pub fn conflicts(&self) -> DissonanceResult<Vec<Conflict>> {
        Ok(self.store.conflicts()?)
    }

    /// History, newest first.
    ///
    /// # Errors
    /// Storage failures.
    pub fn history(&self) -> DissonanceResult<Vec<HistoryEvent>> {
        Ok(self.store.history()?)
    }

    /// The current user profile.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        lock(&self.session).profile.clone()
    }

    /// Number of reports exported so far.
    #[must_use]
    pub fn report_counter(&self) -> u32 {
        lock(&self.session).report_counter
    }

    /// True while an analysis run is outstanding.
    #[must_use]
    pub fn is_analysis_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// True if a change has not been written to the snapshot yet.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.autosave).is_pending()
    }

    fn mark_dirty(&self) {
        lock(&self.autosave).touch(Instant::now());
    }

    fn record(&self, event_type: HistoryEventType, details: String) -> DissonanceResult<()> {
        let event = HistoryEvent::new(self.ids.new_id(), event_type, details, self.clock.now());
        self.store.append_history(event)?;
        Ok(())
    }

    fn revision(&self) -> Option<u64> {
        match self.store.revision() {
            Ok(revision) => Some(revision),
            Err(e) => {
                tracing::warn!(error = %e, "could not read store revision");
                None
            }
        }
    }

    /// Marks dirty when the store moved past `before`, whatever the result.
    fn settle<T>(&self, before: Option<u64>, result: DissonanceResult<T>) -> DissonanceResult<T> {
        let after = self.revision();
        if before.is_none() || after != before {
            self.mark_dirty();
        }
        result
    }

    /// Ingests `documents` and analyzes them against each other and against
    /// everything already stored.
    ///
    /// # Errors
    /// See [`Orchestrator::ingest_and_analyze`].
    pub async fn analyze_batch(&self, documents: Vec<Document>) -> DissonanceResult<AnalysisOutcome> {
        let before = self.revision();
        let result = self.orchestrator.ingest_and_analyze(documents).await;
        self.settle(before, result)
    }

    /// Reads uploaded files and analyzes them as a batch. Every file is
    /// checked before anything is ingested.
    ///
    /// # Errors
    /// `Validation` (`NonTextFile`) if any file is not plain text, otherwise
    /// as [`Workspace::analyze_batch`].
    pub async fn analyze_files(&self, files: Vec<SourceFile>) -> DissonanceResult<AnalysisOutcome> {
        if self.orchestrator.is_running() {
            return Err(ValidationError::AnalysisInProgress.into());
        }
        let texts = files
            .into_iter()
            .map(SourceFile::into_text)
            .collect::<Result<Vec<TextFile>, ValidationError>>()?;
        let documents = texts
            .into_iter()
            .map(|text| Document::from_text_file(DocumentId::new(self.ids.new_id()), text))
            .collect();
        self.analyze_batch(documents).await
    }

    /// Re-analyzes exactly one pair of stored documents.
    ///
    /// # Errors
    /// See [`Orchestrator::analyze_pair`].
    pub async fn analyze_pair(&self, first: &str, second: &str) -> DissonanceResult<AnalysisOutcome> {
        let before = self.revision();
        let result = self
            .orchestrator
            .analyze_pair(&DocumentId::from(first), &DocumentId::from(second))
            .await;
        self.settle(before, result)
    }

    /// Resolves a conflict from user input such as `"accept_doc1"`.
    ///
    /// # Errors
    /// - `Validation` (`InvalidResolution`): unknown resolution value
    /// - `NotFound`: unknown conflict id
    pub fn resolve(&self, conflict_id: &str, resolution: &str) -> DissonanceResult<ResolveOutcome> {
        let resolution = Resolution::from_str(resolution)?;
        self.resolve_with(&ConflictId::from(conflict_id), resolution)
    }

    /// Resolves a conflict.
    ///
    /// # Errors
    /// `NotFound` for an unknown conflict id.
    pub fn resolve_with(&self, id: &ConflictId, resolution: Resolution) -> DissonanceResult<ResolveOutcome> {
        let outcome = self.store.resolve(id, resolution)?;
        if let ResolveOutcome::Updated { .. } = outcome {
            self.mark_dirty();
        }
        Ok(outcome)
    }

    /// Replaces a document's content.
    ///
    /// # Errors
    /// `NotFound` for an unknown document id.
    pub fn save_document(&self, id: &str, content: impl Into<String>) -> DissonanceResult<Document> {
        let doc = self.store.save_document(&DocumentId::from(id), content.into())?;
        self.mark_dirty();
        Ok(doc)
    }

    /// Replaces the user profile.
    ///
    /// # Errors
    /// `Validation` if the profile name is blank.
    pub fn update_profile(&self, profile: UserProfile) -> DissonanceResult<UserProfile> {
        profile.validate()?;
        let details = format!("Profile updated: {}", profile.name);
        lock(&self.session).profile = profile.clone();
        self.record(HistoryEventType::ProfileUpdated, details)?;
        self.mark_dirty();
        Ok(profile)
    }

    /// Renders a report and bumps the report counter.
    ///
    /// # Errors
    /// Storage failures.
    pub fn generate_report(&self, options: &ReportOptions) -> DissonanceResult<Report> {
        let conflicts = self.store.conflicts()?;
        let report = {
            let mut session = lock(&self.session);
            let counter = session.report_counter.checked_add(1).ok_or_else(|| {
                DissonanceError::internal("report counter overflow")
            })?;
            session.report_counter = counter;
            render_report(&conflicts, options, counter, self.clock.now())
        };

        self.record(
            HistoryEventType::ReportGenerated,
            format!(
                "Generated {} with {} conflict(s)",
                report.filename, report.conflict_count
            ),
        )?;
        self.mark_dirty();
        tracing::info!(filename = %report.filename, conflicts = report.conflict_count, "report generated");
        Ok(report)
    }

    /// The relationship graph for the current state. Rebuilt only when its
    /// inputs changed.
    ///
    /// # Errors
    /// Storage failures.
    pub fn graph(&self) -> DissonanceResult<Arc<RelationshipGraph>> {
        let export = self.store.export()?;
        Ok(self.graph.get_or_build(&export.documents, &export.conflicts))
    }

    /// A fresh viewport using the configured zoom bounds.
    #[must_use]
    pub fn viewport(&self) -> ViewportController {
        ViewportController::new(self.config.viewport)
    }

    /// Captures the current state.
    ///
    /// # Errors
    /// `Persistence` if the store cannot be read.
    pub fn snapshot(&self) -> DissonanceResult<Snapshot> {
        let session = lock(&self.session).clone();
        Ok(Snapshot::capture(
            self.store.as_ref(),
            session.profile,
            session.report_counter,
        )?)
    }

    /// Writes the snapshot if anything changed. Returns whether it wrote.
    ///
    /// On failure the workspace stays dirty so the next flush retries.
    ///
    /// # Errors
    /// `Persistence` when the snapshot cannot be written.
    pub fn flush(&self) -> DissonanceResult<bool> {
        if !lock(&self.autosave).take() {
            return Ok(false);
        }
        self.write_snapshot()
    }

    /// Writes the snapshot once the debounce delay has passed since the
    /// last change. Returns whether it wrote.
    ///
    /// # Errors
    /// `Persistence` when the snapshot cannot be written.
    pub fn flush_if_due(&self) -> DissonanceResult<bool> {
        if !lock(&self.autosave).poll(Instant::now()) {
            return Ok(false);
        }
        self.write_snapshot()
    }

    fn write_snapshot(&self) -> DissonanceResult<bool> {
        let saved = self
            .snapshot()
            .and_then(|snapshot| self.port.save(&snapshot).map_err(DissonanceError::from));
        match saved {
            Ok(()) => {
                tracing::debug!("workspace snapshot written");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot save failed, will retry on next flush");
                self.mark_dirty();
                Err(e)
            }
        }
    }
}
