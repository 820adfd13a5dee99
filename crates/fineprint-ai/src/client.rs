use async_trait::async_trait;
use fineprint_core::AnalysisResult;

use crate::ModelError;

/// The two calls the application makes against the hosted model.
///
/// Each method performs exactly one external call and never retries.
/// Identical inputs may yield different outputs; nothing is cached.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Analyse a base64-encoded document and return validated findings.
    ///
    /// Fails with [`ModelError::EmptyResponse`] when the service returns no
    /// text and [`ModelError::MalformedResponse`] when the text does not
    /// match the declared schema.
    async fn analyze_document(
        &self,
        base64_data: &str,
        mime_type: &str,
        user_context: &str,
    ) -> Result<AnalysisResult, ModelError>;

    /// Draft a Markdown dispute letter from a prior analysis.
    ///
    /// An empty response yields [`FALLBACK_LETTER`](crate::FALLBACK_LETTER)
    /// rather than an error. Every other failure is wrapped in
    /// [`ModelError::GenerationFailure`].
    async fn generate_dispute_letter(
        &self,
        analysis: &AnalysisResult,
        user_context: &str,
    ) -> Result<String, ModelError>;
}
