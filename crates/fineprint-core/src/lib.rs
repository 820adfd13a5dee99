//! Core types and the analysis response schema for Fineprint.

pub mod analysis;
pub mod schema;

pub use analysis::{AnalysisResult, RedFlag, RiskScore, RiskTier, ScoreOutOfRange, Severity};
