/// Response schema declared to the hosted model for document analysis.
///
/// Uses the OpenAPI subset accepted by the `responseSchema` generation option:
/// upper-case type names, `enum` on string fields, explicit `required` lists.
pub mod analysis {
    use serde_json::{Value, json};

    use crate::Severity;

    /// Schema for [`AnalysisResult`](crate::AnalysisResult).
    pub fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "summary": {
                    "type": "STRING",
                    "description": "A brief executive summary of the document's fairness and key issues."
                },
                "overallRiskScore": {
                    "type": "INTEGER",
                    "description": "A score from 0 to 100 indicating how predatory the document is (100 being extremely predatory)."
                },
                "redFlags": {
                    "type": "ARRAY",
                    "items": red_flag_schema()
                }
            },
            "required": ["summary", "redFlags", "overallRiskScore"]
        })
    }

    fn red_flag_schema() -> Value {
        let severities: Vec<&str> = Severity::ALL.iter().map(|s| s.as_str()).collect();
        json!({
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "quote": {
                    "type": "STRING",
                    "description": "The exact text from the document containing the issue."
                },
                "explanation": {
                    "type": "STRING",
                    "description": "Why this clause is problematic or predatory."
                },
                "severity": { "type": "STRING", "enum": severities },
                "legalPrinciple": {
                    "type": "STRING",
                    "description": "The general legal concept violated (e.g., 'Unconscionability', 'Lack of Consideration')."
                }
            },
            "required": ["title", "quote", "explanation", "severity"]
        })
    }
}
