//! Hosted LLM layer: document analysis and dispute-letter generation.

mod client;
pub mod config;
mod error;
mod gemini;
pub mod prompt;

pub use client::ModelClient;
pub use config::ModelConfig;
pub use error::ModelError;
pub use gemini::GeminiClient;
pub use prompt::FALLBACK_LETTER;
