//! Terminal rendering for a review session.
//!
//! Renders the analysis as a grouped card: document, risk, summary, then the
//! red flags in the order the service returned them.

use std::io::{self, Write};

use fineprint_core::{AnalysisResult, RedFlag, RiskTier};
use fineprint_session::{FileSummary, SessionSnapshot};

const MAX_QUOTE_CHARS: usize = 240;
const LABEL_WIDTH: usize = 12;

// ── Public API ──

/// Write the analysis report for a snapshot in the RESULTS step.
pub fn write_report(out: &mut impl Write, snapshot: &SessionSnapshot) -> io::Result<()> {
    let Some(analysis) = &snapshot.analysis else {
        return Ok(());
    };

    if let Some(file) = &snapshot.file {
        write_document(out, file)?;
    }
    write_risk(out, analysis)?;

    writeln!(out, "Summary")?;
    writeln!(out, "  {}", analysis.summary)?;
    writeln!(out)?;

    write_red_flags(out, &analysis.red_flags)
}

/// Write the current error message, if any.
pub fn write_error(out: &mut impl Write, snapshot: &SessionSnapshot) -> io::Result<()> {
    if let Some(error) = &snapshot.error {
        writeln!(out, "! {error}")?;
    }
    Ok(())
}

// ── Section rendering ──

fn write_document(out: &mut impl Write, file: &FileSummary) -> io::Result<()> {
    writeln!(out, "=== {} ===", file.name)?;
    writeln!(out, "  {:<LABEL_WIDTH$} {}", "type", file.mime_type)?;
    writeln!(out, "  {:<LABEL_WIDTH$} {} bytes", "size", file.size)?;
    writeln!(out, "  {:<LABEL_WIDTH$} {}", "preview", file.preview_path.display())?;
    writeln!(out)
}

fn write_risk(out: &mut impl Write, analysis: &AnalysisResult) -> io::Result<()> {
    let tier = analysis.risk_tier();
    writeln!(out, "Risk")?;
    writeln!(
        out,
        "  {:<LABEL_WIDTH$} {}/100 ({} risk) {}",
        "score",
        analysis.overall_risk_score.value(),
        tier.as_str(),
        meter(analysis.overall_risk_score.value(), tier)
    )?;
    writeln!(out)
}

fn write_red_flags(out: &mut impl Write, flags: &[RedFlag]) -> io::Result<()> {
    if flags.is_empty() {
        writeln!(out, "Red Flags")?;
        writeln!(out, "  none found")?;
        return Ok(());
    }

    writeln!(out, "Red Flags ({})", flags.len())?;
    for (i, flag) in flags.iter().enumerate() {
        writeln!(out, "  {}. [{}] {}", i + 1, flag.severity.as_str(), flag.title)?;
        writeln!(out, "     \"{}\"", shorten(&flag.quote, MAX_QUOTE_CHARS))?;
        writeln!(out, "     {}", flag.explanation)?;
        if let Some(principle) = &flag.legal_principle {
            writeln!(out, "     principle: {principle}")?;
        }
    }
    Ok(())
}

// ── Helpers ──

/// Ten-cell bar; the fill character marks the tier.
fn meter(score: u8, tier: RiskTier) -> String {
    let filled = usize::from(score).div_ceil(10);
    let cell = match tier {
        RiskTier::High => '#',
        RiskTier::Medium => '=',
        RiskTier::Low => '-',
    };
    let mut bar = String::with_capacity(12);
    bar.push('[');
    bar.extend(std::iter::repeat_n(cell, filled));
    bar.extend(std::iter::repeat_n(' ', 10 - filled));
    bar.push(']');
    bar
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
