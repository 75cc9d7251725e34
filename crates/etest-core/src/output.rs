//! Command payload rendering.
//!
//! Every command can print JSON (wrapped in a versioned envelope), Markdown,
//! or a one-line summary. Payloads go to stdout; logs never do.

use clap::ValueEnum;
use etest_math::{ModeCenteredWalk, PoissonTerm};
use serde::{Deserialize, Serialize};

use crate::calibrate::CalibrationReport;
use crate::etest::EtestReport;

/// Version of the JSON envelope and payload shapes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured JSON (default for machine consumption)
    #[default]
    Json,

    /// Human-readable Markdown
    Md,

    /// One-line summary for quick checks
    Summary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}

/// Wrap a payload with schema version, run id and timestamp.
pub fn envelope(run_id: &str, command: &str, payload: impl Serialize) -> serde_json::Value {
    serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "command": command,
        "result": payload,
    })
}

/// Error payload in the same envelope.
pub fn error_envelope(run_id: &str, command: &str, code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "command": command,
        "status": "error",
        "error": {
            "code": code,
            "message": message,
        }
    })
}

fn to_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        format!(r#"{{"status":"error","error":{{"code":"serialization_failed","message":"{}"}}}}"#, e)
    })
}

/// Terms of one mode-centered walk, for `etest walk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkListing {
    pub lambda: f64,
    pub mode: u64,
    pub truncation: f64,
    /// Terms sorted by index.
    pub terms: Vec<PoissonTerm>,
    pub retained_mass: f64,
}

impl WalkListing {
    pub fn from_walk(walk: ModeCenteredWalk, truncation: f64) -> Self {
        let lambda = walk.lambda();
        let mode = walk.mode();
        let mut terms: Vec<PoissonTerm> = walk.collect();
        terms.sort_by_key(|t| t.index);
        let retained_mass = terms.iter().map(|t| t.probability).sum();
        WalkListing {
            lambda,
            mode,
            truncation,
            terms,
            retained_mass,
        }
    }
}

/// Render an E-test report.
pub fn render_pvalue(
    report: &EtestReport,
    alpha: Option<f64>,
    format: OutputFormat,
    run_id: &str,
) -> String {
    let significant = alpha.map(|a| report.is_significant(a));
    match format {
        OutputFormat::Json => {
            let mut payload = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
            if let (Some(a), Some(s), Some(obj)) = (alpha, significant, payload.as_object_mut()) {
                obj.insert("alpha".to_string(), serde_json::json!(a));
                obj.insert("significant".to_string(), serde_json::json!(s));
            }
            to_json(&envelope(run_id, "pvalue", payload))
        }
        OutputFormat::Summary => {
            let verdict = match (alpha, significant) {
                (Some(a), Some(true)) => format!(" (significant at alpha={})", a),
                (Some(a), Some(false)) => format!(" (not significant at alpha={})", a),
                _ => String::new(),
            };
            format!(
                "p={:.6} k1={} k2={} n1={} n2={} d={} side={}{}\n",
                report.p_value,
                report.k1,
                report.k2,
                report.n1,
                report.n2,
                report.difference,
                report.sidedness,
                verdict
            )
        }
        OutputFormat::Md => {
            let mut out = String::from("# E-test\n\n");
            out.push_str("| quantity | value |\n|---|---:|\n");
            out.push_str(&format!("| k1 / n1 | {} / {} |\n", report.k1, report.n1));
            out.push_str(&format!("| k2 / n2 | {} / {} |\n", report.k2, report.n2));
            out.push_str(&format!("| d | {} |\n", report.difference));
            out.push_str(&format!("| sidedness | {} |\n", report.sidedness));
            out.push_str(&format!("| pooled rate | {:.6} |\n", report.null_rates.pooled));
            out.push_str(&format!("| λ̂1 | {:.6} |\n", report.null_rates.lambda1));
            out.push_str(&format!("| λ̂2 | {:.6} |\n", report.null_rates.lambda2));
            out.push_str(&format!("| T(k1, k2) | {:.6} |\n", report.observed_statistic));
            out.push_str(&format!(
                "| cells (qualifying / visited) | {} / {} |\n",
                report.cells_qualifying, report.cells_visited
            ));
            out.push_str(&format!("| **p-value** | **{:.6}** |\n", report.p_value));
            if let (Some(a), Some(s)) = (alpha, significant) {
                out.push_str(&format!(
                    "\n{} at alpha = {}.\n",
                    if s { "Significant" } else { "Not significant" },
                    a
                ));
            }
            out
        }
    }
}

/// Render a calibration report. Every format carries the ASCII plot; JSON
/// puts it in the `plot` field of the result.
pub fn render_calibration(
    report: &CalibrationReport,
    format: OutputFormat,
    run_id: &str,
    plot: (usize, usize),
) -> String {
    match format {
        OutputFormat::Json => {
            let mut payload = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
            if let Some(obj) = payload.as_object_mut() {
                obj.insert(
                    "plot".to_string(),
                    serde_json::json!(report.ascii_plot(plot.0, plot.1)),
                );
            }
            to_json(&envelope(run_id, "calibrate", payload))
        }
        OutputFormat::Summary => format!(
            "mean false-positive rate {:.4} at alpha={} over {} rates, {} trials (seed {})\n\n{}",
            report.overall_rate,
            report.alpha,
            report.experiments,
            report.total_trials,
            report.seed,
            report.ascii_plot(plot.0, plot.1)
        ),
        OutputFormat::Md => {
            let mut out = String::from("# E-test calibration\n\n");
            out.push_str(&format!(
                "alpha = {}, n1 = {}, n2 = {}, seed = {}\n\n",
                report.alpha, report.n1, report.n2, report.seed
            ));
            if let Some(path) = &report.config_source.path {
                out.push_str(&format!("config: `{}`\n\n", path.display()));
            }
            out.push_str(&report.markdown_table());
            out.push_str(&format!(
                "\nMean false-positive rate: **{:.4}** ({} experiments, {} trials)\n\n",
                report.overall_rate, report.experiments, report.total_trials
            ));
            out.push_str("```text\n");
            out.push_str(&report.ascii_plot(plot.0, plot.1));
            out.push_str("```\n");
            out
        }
    }
}

/// Render the terms of a walk.
pub fn render_walk(listing: &WalkListing, format: OutputFormat, run_id: &str) -> String {
    match format {
        OutputFormat::Json => to_json(&envelope(run_id, "walk", listing)),
        OutputFormat::Summary => format!(
            "lambda={} mode={} terms={} mass={:.9}\n",
            listing.lambda,
            listing.mode,
            listing.terms.len(),
            listing.retained_mass
        ),
        OutputFormat::Md => {
            let mut out = format!(
                "# Poisson({}) walk\n\nmode = {}, truncation = {:e}\n\n| i | pmf |\n|---:|---:|\n",
                listing.lambda, listing.mode, listing.truncation
            );
            for term in &listing.terms {
                out.push_str(&format!("| {} | {:.9} |\n", term.index, term.probability));
            }
            out.push_str(&format!("\nRetained mass: {:.9}\n", listing.retained_mass));
            out
        }
    }
}
