//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{Notify, Semaphore};

use dissonance::{
    Analyzer, AnalyzerError, CandidateConflict, Document, FixedClock, InMemorySnapshotStore, SequentialIds,
    Severity, SnapshotPort, Workspace,
};

/// What the scripted analyzer answers for one pair.
#[derive(Debug, Clone)]
pub enum Script {
    /// One candidate per severity.
    Conflicts(Vec<Severity>),
    /// The call fails.
    Fail,
    /// A candidate that names a document outside the pair.
    Malformed,
}

fn key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Analyzer answering from a per-pair script. Unscripted pairs have no
/// conflicts.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    scripts: Mutex<HashMap<(String, String), Script>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, a: &str, b: &str, script: Script) {
        self.scripts.lock().unwrap().insert(key(a, b), script);
    }

    /// Every call so far, as `(first, second)` in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, first: &Document, second: &Document) -> Result<Vec<CandidateConflict>, AnalyzerError> {
        self.calls
            .lock()
            .unwrap()
            .push((first.id.to_string(), second.id.to_string()));

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&key(first.id.as_str(), second.id.as_str()))
            .cloned()
            .unwrap_or(Script::Conflicts(Vec::new()));

        match script {
            Script::Conflicts(severities) => Ok(severities
                .into_iter()
                .enumerate()
                .map(|(n, severity)| CandidateConflict {
                    document_ids: [first.id.clone(), second.id.clone()],
                    document_titles: [first.title.clone(), second.title.clone()],
                    excerpts: [first.content.clone(), second.content.clone()],
                    explanation: format!("{} contradicts {} (#{n})", first.title, second.title),
                    severity,
                })
                .collect()),
            Script::Fail => Err(AnalyzerError::CallFailed {
                pair: format!("{}<->{}", first.id, second.id),
                message: "scripted failure".to_string(),
            }),
            Script::Malformed => Ok(vec![CandidateConflict {
                document_ids: [first.id.clone(), "ghost".into()],
                document_titles: [first.title.clone(), "Ghost".to_string()],
                excerpts: [String::new(), String::new()],
                explanation: "points elsewhere".to_string(),
                severity: Severity::Low,
            }]),
        }
    }
}

/// Analyzer that parks every call until released.
pub struct GatedAnalyzer {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        })
    }
}

#[async_trait]
impl Analyzer for GatedAnalyzer {
    async fn analyze(&self, _first: &Document, _second: &Document) -> Result<Vec<CandidateConflict>, AnalyzerError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }
}

/// Analyzer that counts calls as they arrive and parks each one until
/// `open` is called. Every pair yields one conflict.
pub struct CountingGate {
    expected: usize,
    entered: AtomicUsize,
    pub all_entered: Notify,
    permits: Semaphore,
}

impl CountingGate {
    pub fn new(expected: usize) -> Arc<Self> {
        Arc::new(Self {
            expected,
            entered: AtomicUsize::new(0),
            all_entered: Notify::new(),
            permits: Semaphore::new(0),
        })
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.permits.add_permits(self.expected);
    }
}

#[async_trait]
impl Analyzer for CountingGate {
    async fn analyze(&self, first: &Document, second: &Document) -> Result<Vec<CandidateConflict>, AnalyzerError> {
        if self.entered.fetch_add(1, Ordering::SeqCst) + 1 == self.expected {
            self.all_entered.notify_one();
        }
        let _permit = self.permits.acquire().await.map_err(|e| AnalyzerError::CallFailed {
            pair: format!("{}<->{}", first.id, second.id),
            message: e.to_string(),
        })?;
        Ok(vec![CandidateConflict {
            document_ids: [first.id.clone(), second.id.clone()],
            document_titles: [first.title.clone(), second.title.clone()],
            excerpts: [first.content.clone(), second.content.clone()],
            explanation: format!("{} contradicts {}", first.title, second.title),
            severity: Severity::Medium,
        }])
    }
}

pub fn doc(id: &str) -> Document {
    Document::new(id, id.to_uppercase(), format!("content of {id}"))
}

pub fn docs(ids: &[&str]) -> Vec<Document> {
    ids.iter().map(|id| doc(id)).collect()
}

pub fn open_with(analyzer: Arc<dyn Analyzer>, port: Arc<dyn SnapshotPort>) -> Workspace {
    Workspace::builder(analyzer)
        .snapshot_port(port)
        .ids(Arc::new(SequentialIds::new("id")))
        .clock(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
        )))
        .open()
        .unwrap()
}

pub fn open(analyzer: Arc<dyn Analyzer>) -> Workspace {
    open_with(analyzer, Arc::new(InMemorySnapshotStore::new()))
}
