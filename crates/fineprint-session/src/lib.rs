//! Review session: file ingestion, the step state machine, and its async runtime.

pub mod ingest;
mod runtime;
pub mod state;

pub use ingest::{FileSelection, IngestError, PreviewFile, UploadedFile};
pub use runtime::{FileSummary, SessionError, SessionHandle, SessionSnapshot, spawn_session};
pub use state::{Effect, Event, RequestId, SessionState, Step, TransitionRecord, reduce};
