//! Review session state machine.
//!
//! All mutation goes through [`reduce`], which applies one [`Event`] and may
//! return one [`Effect`] for the runtime to execute. Guards that fail turn the
//! event into a no-op.
//!
//! ```text
//! UPLOAD --start-scan--> ANALYZING --ok--> RESULTS --generate--> GENERATING_LETTER --ok--> LETTER_READY
//!   ^                        |               ^                          |                     |
//!   +--------- err ----------+               +---------- err -----------+                     |
//!                                            +------------------ close-preview ---------------+
//! any --reset--> UPLOAD
//! ```

use chrono::{DateTime, Utc};
use fineprint_ai::ModelError;
use fineprint_core::AnalysisResult;
use tracing::{debug, info, warn};

use crate::ingest::{self, FileSelection, IngestError, UploadedFile};

pub const UNSUPPORTED_FILE_MESSAGE: &str = "Only images and PDF files are supported.";
pub const FILE_READ_MESSAGE: &str = "Failed to process file.";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Analysis failed. Please try again.";
pub const LETTER_FAILED_MESSAGE: &str = "Failed to generate letter.";

/// Oldest transition records are dropped past this many.
pub const MAX_TRANSITIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Upload,
    Analyzing,
    Results,
    GeneratingLetter,
    LetterReady,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Analyzing => "analyzing",
            Self::Results => "results",
            Self::GeneratingLetter => "generating-letter",
            Self::LetterReady => "letter-ready",
        }
    }
}

/// Token identifying one outstanding async operation.
///
/// Completions carrying a token that no longer matches the session's slot
/// are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// One applied step change.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: Step,
    pub to: Step,
    pub trigger: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub enum Event {
    // User actions.
    FileSelected(FileSelection),
    ContextChanged(String),
    StartScan,
    GenerateLetter,
    ClosePreview,
    DismissError,
    Reset,

    // Completions posted by the runtime.
    FileIngested {
        request: RequestId,
        file: UploadedFile,
    },
    IngestionFailed {
        request: RequestId,
        error: IngestError,
    },
    AnalysisCompleted {
        request: RequestId,
        outcome: Result<AnalysisResult, ModelError>,
    },
    LetterCompleted {
        request: RequestId,
        outcome: Result<String, ModelError>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileSelected(_) => "file-selected",
            Self::ContextChanged(_) => "context-changed",
            Self::StartScan => "start-scan",
            Self::GenerateLetter => "generate-letter",
            Self::ClosePreview => "close-preview",
            Self::DismissError => "dismiss-error",
            Self::Reset => "reset",
            Self::FileIngested { .. } => "file-ingested",
            Self::IngestionFailed { .. } => "ingestion-failed",
            Self::AnalysisCompleted { .. } => "analysis-completed",
            Self::LetterCompleted { .. } => "letter-completed",
        }
    }

    /// Whether the event originates from the presentation layer.
    pub fn is_user_action(&self) -> bool {
        matches!(
            self,
            Self::FileSelected(_)
                | Self::ContextChanged(_)
                | Self::StartScan
                | Self::GenerateLetter
                | Self::ClosePreview
                | Self::DismissError
                | Self::Reset
        )
    }
}

/// Work the runtime must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Ingest {
        request: RequestId,
        selection: FileSelection,
    },
    Analyze {
        request: RequestId,
        base64: String,
        mime_type: String,
        user_context: String,
    },
    GenerateLetter {
        request: RequestId,
        analysis: AnalysisResult,
        user_context: String,
    },
}

/// Everything one review session holds.
///
/// Fields are private: [`reduce`] is the only writer, which keeps the step
/// invariants (analysis present in RESULTS and LETTER_READY, letter present
/// only in LETTER_READY, at most one model call in flight).
#[derive(Debug, Default)]
pub struct SessionState {
    step: Step,
    file: Option<UploadedFile>,
    user_context: String,
    analysis: Option<AnalysisResult>,
    letter: Option<String>,
    error: Option<String>,
    /// Single slot for the outstanding model call.
    in_flight: Option<RequestId>,
    /// Outstanding file read; separate from the model slot.
    pending_ingest: Option<RequestId>,
    /// Never rewound, so ids stay unique across resets.
    next_request: u64,
    transitions: Vec<TransitionRecord>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn user_context(&self) -> &str {
        &self.user_context
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn letter(&self) -> Option<&str> {
        self.letter.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn is_ingesting(&self) -> bool {
        self.pending_ingest.is_some()
    }

    /// Most recent transitions, kept across resets and capped at
    /// [`MAX_TRANSITIONS`].
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// True when every session field is back at its initial value.
    pub fn is_pristine(&self) -> bool {
        self.step == Step::Upload
            && self.file.is_none()
            && self.user_context.is_empty()
            && self.analysis.is_none()
            && self.letter.is_none()
            && self.error.is_none()
            && self.in_flight.is_none()
            && self.pending_ingest.is_none()
    }

    fn issue_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn can_start_scan(&self) -> bool {
        self.step == Step::Upload
            && self.in_flight.is_none()
            && self.pending_ingest.is_none()
            && self.file.is_some()
            && !self.user_context.trim().is_empty()
    }

    /// Accept a model completion only if it answers the call in the slot.
    fn take_in_flight(&mut self, request: RequestId, expected: Step) -> bool {
        if self.step == expected && self.in_flight == Some(request) {
            self.in_flight = None;
            true
        } else {
            debug!(
                request = request.value(),
                step = self.step.as_str(),
                "discarding stale model response"
            );
            false
        }
    }

    fn take_pending_ingest(&mut self, request: RequestId) -> bool {
        if self.pending_ingest == Some(request) {
            self.pending_ingest = None;
            true
        } else {
            debug!(request = request.value(), "discarding stale file read");
            false
        }
    }

    fn clear(&mut self) {
        self.step = Step::Upload;
        self.file = None;
        self.user_context.clear();
        self.analysis = None;
        self.letter = None;
        self.error = None;
        self.in_flight = None;
        self.pending_ingest = None;
    }

    fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }
}

/// Apply one event. Returns the side effect to run, if any.
pub fn reduce(state: &mut SessionState, event: Event) -> Option<Effect> {
    let from = state.step;
    let trigger = event.name();

    let effect = match event {
        Event::FileSelected(selection) => {
            if state.step != Step::Upload {
                debug!(step = from.as_str(), "ignoring file selection outside upload");
                return None;
            }
            match ingest::validate_mime_type(&selection.mime_type) {
                Ok(()) => {
                    let request = state.issue_request();
                    state.pending_ingest = Some(request);
                    Some(Effect::Ingest { request, selection })
                }
                Err(e) => {
                    warn!(error = %e, "rejected file selection");
                    state.set_error(UNSUPPORTED_FILE_MESSAGE);
                    None
                }
            }
        }

        Event::FileIngested { request, file } => {
            if state.take_pending_ingest(request) && state.step == Step::Upload {
                // Replacing the slot drops the previous file and its preview.
                state.file = Some(file);
                state.error = None;
            }
            None
        }

        Event::IngestionFailed { request, error } => {
            if state.take_pending_ingest(request) {
                warn!(error = %error, "file ingestion failed");
                let message = match error {
                    IngestError::UnsupportedFileType(_) => UNSUPPORTED_FILE_MESSAGE,
                    IngestError::FileRead { .. } => FILE_READ_MESSAGE,
                };
                state.set_error(message);
            }
            None
        }

        Event::ContextChanged(text) => {
            if state.step == Step::Upload {
                state.user_context = text;
            }
            None
        }

        Event::StartScan => {
            if !state.can_start_scan() {
                debug!("start-scan guard not met");
                return None;
            }
            let Some(file) = state.file.as_ref() else {
                return None;
            };
            let (base64, mime_type) = (file.base64.clone(), file.mime_type.clone());
            let request = state.issue_request();
            state.in_flight = Some(request);
            state.analysis = None;
            state.letter = None;
            state.step = Step::Analyzing;
            Some(Effect::Analyze {
                request,
                base64,
                mime_type,
                user_context: state.user_context.clone(),
            })
        }

        Event::AnalysisCompleted { request, outcome } => {
            if state.take_in_flight(request, Step::Analyzing) {
                match outcome {
                    Ok(result) => {
                        state.analysis = Some(result);
                        state.step = Step::Results;
                    }
                    Err(e) => {
                        warn!(error = %e, "analysis failed");
                        state.analysis = None;
                        state.set_error(ANALYSIS_FAILED_MESSAGE);
                        state.step = Step::Upload;
                    }
                }
            }
            None
        }

        Event::GenerateLetter => {
            if state.step != Step::Results || state.in_flight.is_some() {
                debug!(step = from.as_str(), "generate-letter guard not met");
                return None;
            }
            let Some(analysis) = state.analysis.clone() else {
                return None;
            };
            let request = state.issue_request();
            state.in_flight = Some(request);
            state.step = Step::GeneratingLetter;
            Some(Effect::GenerateLetter {
                request,
                analysis,
                user_context: state.user_context.clone(),
            })
        }

        Event::LetterCompleted { request, outcome } => {
            if state.take_in_flight(request, Step::GeneratingLetter) {
                match outcome {
                    Ok(letter) => {
                        state.letter = Some(letter);
                        state.step = Step::LetterReady;
                    }
                    Err(e) => {
                        warn!(error = %e, "letter generation failed");
                        state.set_error(LETTER_FAILED_MESSAGE);
                        state.step = Step::Results;
                    }
                }
            }
            None
        }

        Event::ClosePreview => {
            if state.step == Step::LetterReady {
                // Letter exists only in LETTER_READY; that invariant outranks
                // keeping the draft around.
                state.letter = None;
                state.step = Step::Results;
            }
            None
        }

        Event::DismissError => {
            state.error = None;
            None
        }

        Event::Reset => {
            state.clear();
            None
        }
    };

    if state.step != from {
        let record = TransitionRecord {
            from,
            to: state.step,
            trigger,
            timestamp: Utc::now(),
        };
        info!(
            from = record.from.as_str(),
            to = record.to.as_str(),
            trigger = record.trigger,
            "session transition"
        );
        state.transitions.push(record);
        if state.transitions.len() > MAX_TRANSITIONS {
            let excess = state.transitions.len() - MAX_TRANSITIONS;
            state.transitions.drain(..excess);
        }
    }

    effect
}
