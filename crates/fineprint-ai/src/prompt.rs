//! Prompt templates for the two model calls.

use fineprint_core::AnalysisResult;

/// Returned in place of a letter when the service produces no text.
pub const FALLBACK_LETTER: &str = "Failed to generate letter.";

/// Instruction sent alongside the document for analysis.
pub fn analysis_prompt(user_context: &str) -> String {
    format!(
        "You are an elite legal expert and consumer rights advocate. \
         Your job is to protect the user from predatory bureaucracy.\n\
         \n\
         Analyze the attached document (which could be a contract, bill, or notice).\n\
         The user has provided this context about their situation: \"{user_context}\".\n\
         \n\
         1. Identify specific clauses that are logically unfair, legally dubious, \
         hidden in fine print, or predatory.\n\
         2. Quote the exact text.\n\
         3. Explain why it is a \"Red Flag\" using standard legal logic \
         (e.g., ambiguity, shifting burden of proof, unreasonable fees).\n\
         4. Assess the severity.\n\
         \n\
         Be authoritative but accessible."
    )
}

/// Instruction for the dispute letter, embedding the red flags as JSON.
pub fn letter_prompt(
    analysis: &AnalysisResult,
    user_context: &str,
) -> Result<String, serde_json::Error> {
    let red_flags = serde_json::to_string(&analysis.red_flags)?;
    Ok(format!(
        "You are a senior attorney writing a formal dispute letter on behalf of a client.\n\
         \n\
         Client's Situation: \"{user_context}\"\n\
         \n\
         Key Issues Identified in Document:\n\
         {red_flags}\n\
         \n\
         Task:\n\
         Write a formal, stern, and legally grounded dispute letter.\n\
         - Use professional formatting.\n\
         - Cite the specific clauses (from the red flags) and explain why they are \
         invalid or being contested.\n\
         - Demand a specific resolution based on the user's context.\n\
         - Keep the tone firm but polite (authoritative).\n\
         - Use generic placeholders like \"[Sender Name]\" unless the context \
         provides identifying details.\n\
         \n\
         Output ONLY the letter content in Markdown format."
    ))
}
