//! Analysis payload returned by the hosted model.
//!
//! Field names on the wire are camelCase (`overallRiskScore`, `redFlags`,
//! `legalPrinciple`) because the response schema sent to the service uses them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Structured findings for one analysed document.
///
/// Replaced wholesale on every analysis; never merged with a previous result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub overall_risk_score: RiskScore,
    /// Service presentation order. Not sorted by severity.
    pub red_flags: Vec<RedFlag>,
}

/// A single problematic clause identified in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedFlag {
    pub title: String,
    /// Verbatim excerpt from the source document.
    pub quote: String,
    pub explanation: String,
    pub severity: Severity,
    /// `None` when the service omitted the field; `Some("")` is kept as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_principle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// All values, in the order they are declared to the service.
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Overall predatoriness score, 0 (benign) to 100 (extremely predatory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RiskScore(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("risk score {0} is outside 0..=100")]
pub struct ScoreOutOfRange(pub i64);

impl RiskScore {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Result<Self, ScoreOutOfRange> {
        Self::try_from(i64::from(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn tier(self) -> RiskTier {
        RiskTier::from_score(self)
    }
}

impl TryFrom<i64> for RiskScore {
    type Error = ScoreOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(ScoreOutOfRange(value)),
        }
    }
}

impl From<RiskScore> for i64 {
    fn from(score: RiskScore) -> Self {
        i64::from(score.0)
    }
}

/// Display tier for a risk score.
///
/// Boundaries are exclusive on the lower side: 70 is `Medium`, 40 is `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    pub const HIGH_ABOVE: u8 = 70;
    pub const MEDIUM_ABOVE: u8 = 40;

    pub fn from_score(score: RiskScore) -> Self {
        match score.value() {
            s if s > Self::HIGH_ABOVE => Self::High,
            s if s > Self::MEDIUM_ABOVE => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl AnalysisResult {
    /// Parse and validate the service's JSON text.
    ///
    /// The text is untrusted: missing fields, unknown severities, and scores
    /// outside 0..=100 are all rejected.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let result: Self = serde_json::from_str(text)?;
        debug!(
            score = result.overall_risk_score.value(),
            red_flags = result.red_flags.len(),
            "parsed analysis result"
        );
        Ok(result)
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.overall_risk_score.tier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(v: u8) -> RiskScore {
        RiskScore::new(v).unwrap()
    }

    #[test]
    fn parses_service_payload() {
        let json = r#"{
            "summary": "Lease heavily favours the landlord.",
            "overallRiskScore": 85,
            "redFlags": [{
                "title": "Non-refundable deposit",
                "quote": "deposit is non-refundable under any circumstance",
                "explanation": "Deposits must be returned less lawful deductions.",
                "severity": "High"
            }]
        }"#;
        let result = AnalysisResult::from_json(json).unwrap();
        assert_eq!(result.overall_risk_score.value(), 85);
        assert_eq!(result.risk_tier(), RiskTier::High);
        assert_eq!(result.red_flags.len(), 1);
        assert_eq!(result.red_flags[0].severity, Severity::High);
        assert!(result.red_flags[0].legal_principle.is_none());
    }

    #[test]
    fn missing_and_empty_legal_principle_differ() {
        let missing = r#"{"title":"t","quote":"q","explanation":"e","severity":"Low"}"#;
        let empty = r#"{"title":"t","quote":"q","explanation":"e","severity":"Low","legalPrinciple":""}"#;
        let a: RedFlag = serde_json::from_str(missing).unwrap();
        let b: RedFlag = serde_json::from_str(empty).unwrap();
        assert_eq!(a.legal_principle, None);
        assert_eq!(b.legal_principle.as_deref(), Some(""));
        assert_ne!(a, b);
    }

    #[test]
    fn omitted_legal_principle_is_not_serialized() {
        let flag = RedFlag {
            title: "Auto-renewal".into(),
            quote: "renews automatically".into(),
            explanation: "No notice window.".into(),
            severity: Severity::Medium,
            legal_principle: None,
        };
        let json = serde_json::to_string(&flag).unwrap();
        assert!(!json.contains("legalPrinciple"));
        assert!(json.contains(r#""severity":"Medium""#));
    }

    #[test]
    fn empty_red_flags_are_valid() {
        let json = r#"{"summary":"Looks fair.","overallRiskScore":5,"redFlags":[]}"#;
        let result = AnalysisResult::from_json(json).unwrap();
        assert!(result.red_flags.is_empty());
        assert_eq!(result.risk_tier(), RiskTier::Low);
    }

    #[test]
    fn red_flag_order_is_preserved() {
        let json = r#"{"summary":"s","overallRiskScore":50,"redFlags":[
            {"title":"a","quote":"q","explanation":"e","severity":"Low"},
            {"title":"b","quote":"q","explanation":"e","severity":"High"},
            {"title":"c","quote":"q","explanation":"e","severity":"Medium"}
        ]}"#;
        let result = AnalysisResult::from_json(json).unwrap();
        let titles: Vec<&str> = result.red_flags.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[test]
    fn rejects_unknown_severity() {
        let json = r#"{"summary":"s","overallRiskScore":50,"redFlags":[
            {"title":"a","quote":"q","explanation":"e","severity":"Critical"}
        ]}"#;
        assert!(AnalysisResult::from_json(json).is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        let json = r#"{"summary":"s","redFlags":[]}"#;
        assert!(AnalysisResult::from_json(json).is_err());
    }

    #[test]
    fn rejects_out_of_range_scores() {
        for bad in ["101", "-1", "1000"] {
            let json = format!(r#"{{"summary":"s","overallRiskScore":{bad},"redFlags":[]}}"#);
            let err = AnalysisResult::from_json(&json).unwrap_err();
            assert!(err.to_string().contains("outside 0..=100"), "{bad}: {err}");
        }
    }

    #[test]
    fn rejects_fractional_score() {
        let json = r#"{"summary":"s","overallRiskScore":45.5,"redFlags":[]}"#;
        assert!(AnalysisResult::from_json(json).is_err());
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(score(0).tier(), RiskTier::Low);
        assert_eq!(score(40).tier(), RiskTier::Low);
        assert_eq!(score(41).tier(), RiskTier::Medium);
        assert_eq!(score(45).tier(), RiskTier::Medium);
        assert_eq!(score(70).tier(), RiskTier::Medium);
        assert_eq!(score(71).tier(), RiskTier::High);
        assert_eq!(score(100).tier(), RiskTier::High);
    }

    #[test]
    fn risk_score_bounds() {
        assert!(RiskScore::new(100).is_ok());
        assert_eq!(RiskScore::new(101), Err(ScoreOutOfRange(101)));
        assert_eq!(RiskScore::try_from(-3), Err(ScoreOutOfRange(-3)));
    }
}
