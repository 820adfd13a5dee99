//! Async session runtime.
//!
//! One tokio task owns the [`SessionState`]. The presentation layer sends
//! events through a [`SessionHandle`] and observes [`SessionSnapshot`]s on a
//! watch channel. Effects run as spawned tasks that post their completion back
//! into the same event queue, so state only changes inside the loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fineprint_ai::ModelClient;
use fineprint_core::AnalysisResult;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ingest::{self, FileSelection};
use crate::state::{Effect, Event, SessionState, Step, reduce};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session runtime has shut down")]
    Closed,
}

/// What the presentation layer needs to render an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub preview_path: PathBuf,
}

/// Read-only view of the session after an event has been applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub step: Step,
    pub file: Option<FileSummary>,
    pub user_context: String,
    pub analysis: Option<AnalysisResult>,
    pub letter: Option<String>,
    pub error: Option<String>,
    /// A file read or model call is outstanding.
    pub busy: bool,
    /// Number of user actions applied so far.
    pub actions_applied: u64,
}

impl SessionSnapshot {
    fn capture(state: &SessionState, actions_applied: u64) -> Self {
        Self {
            step: state.step(),
            file: state.file().map(|f| FileSummary {
                name: f.name.clone(),
                mime_type: f.mime_type.clone(),
                size: f.size,
                preview_path: f.preview.path().to_path_buf(),
            }),
            user_context: state.user_context().to_string(),
            analysis: state.analysis().cloned(),
            letter: state.letter().map(str::to_string),
            error: state.error().map(str::to_string),
            busy: state.in_flight().is_some() || state.is_ingesting(),
            actions_applied,
        }
    }
}

/// Presentation-side handle to a running session.
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
    snapshots: watch::Receiver<SessionSnapshot>,
    actions_sent: AtomicU64,
    task: JoinHandle<()>,
}

/// Start a session runtime on the current tokio runtime.
pub fn spawn_session(client: Arc<dyn ModelClient>) -> SessionHandle {
    let (events, rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshots) = watch::channel(SessionSnapshot::default());
    let task = tokio::spawn(run(client, rx, events.downgrade(), snapshot_tx));
    info!("session started");
    SessionHandle {
        events,
        snapshots,
        actions_sent: AtomicU64::new(0),
        task,
    }
}

async fn run(
    client: Arc<dyn ModelClient>,
    mut rx: mpsc::UnboundedReceiver<Event>,
    events: mpsc::WeakUnboundedSender<Event>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    let mut state = SessionState::new();
    let mut actions_applied = 0u64;

    while let Some(event) = rx.recv().await {
        if event.is_user_action() {
            actions_applied += 1;
        }
        if let Some(effect) = reduce(&mut state, event) {
            execute(effect, &client, &events);
        }
        snapshots.send_replace(SessionSnapshot::capture(&state, actions_applied));
    }

    info!(
        transitions = state.transitions().len(),
        "session ended"
    );
}

fn execute(
    effect: Effect,
    client: &Arc<dyn ModelClient>,
    events: &mpsc::WeakUnboundedSender<Event>,
) {
    // Handle dropped: nobody is left to observe the result.
    let Some(tx) = events.upgrade() else {
        return;
    };

    match effect {
        Effect::Ingest { request, selection } => {
            tokio::spawn(async move {
                let event = match ingest::ingest(&selection).await {
                    Ok(file) => Event::FileIngested { request, file },
                    Err(error) => Event::IngestionFailed { request, error },
                };
                post(&tx, event);
            });
        }
        Effect::Analyze {
            request,
            base64,
            mime_type,
            user_context,
        } => {
            let client = Arc::clone(client);
            tokio::spawn(async move {
                let outcome = client
                    .analyze_document(&base64, &mime_type, &user_context)
                    .await;
                post(&tx, Event::AnalysisCompleted { request, outcome });
            });
        }
        Effect::GenerateLetter {
            request,
            analysis,
            user_context,
        } => {
            let client = Arc::clone(client);
            tokio::spawn(async move {
                let outcome = client
                    .generate_dispute_letter(&analysis, &user_context)
                    .await;
                post(&tx, Event::LetterCompleted { request, outcome });
            });
        }
    }
}

fn post(tx: &mpsc::UnboundedSender<Event>, event: Event) {
    let name = event.name();
    if tx.send(event).is_err() {
        debug!(event = name, "session closed before completion was delivered");
    }
}

impl SessionHandle {
    fn send(&self, event: Event) -> Result<(), SessionError> {
        self.events.send(event).map_err(|_| SessionError::Closed)?;
        self.actions_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn select_file(&self, selection: FileSelection) -> Result<(), SessionError> {
        self.send(Event::FileSelected(selection))
    }

    pub fn set_context(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Event::ContextChanged(text.into()))
    }

    pub fn start_scan(&self) -> Result<(), SessionError> {
        self.send(Event::StartScan)
    }

    pub fn generate_letter(&self) -> Result<(), SessionError> {
        self.send(Event::GenerateLetter)
    }

    pub fn close_preview(&self) -> Result<(), SessionError> {
        self.send(Event::ClosePreview)
    }

    pub fn dismiss_error(&self) -> Result<(), SessionError> {
        self.send(Event::DismissError)
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.send(Event::Reset)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every applied event.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until every action sent so far has been applied and no file read
    /// or model call is outstanding.
    pub async fn settle(&self) -> Result<SessionSnapshot, SessionError> {
        let target = self.actions_sent.load(Ordering::SeqCst);
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| s.actions_applied >= target && !s.busy)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Stop accepting events and wait for outstanding work to finish.
    ///
    /// Dropping the state releases any preview file.
    pub async fn shutdown(self) {
        let Self { events, task, .. } = self;
        drop(events);
        if let Err(e) = task.await {
            debug!(error = %e, "session task ended abnormally");
        }
    }
}
