// Report generation for completed mirror runs

use crate::mirror::{MirrorOutcome, MirrorStats};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub url: String,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorReport {
    pub root_url: String,
    pub base_prefix: String,
    pub destination: String,
    pub stats: MirrorStats,
    pub failures: Vec<FailureEntry>,
}

impl From<&MirrorOutcome> for MirrorReport {
    fn from(outcome: &MirrorOutcome) -> Self {
        let failures = outcome
            .failures
            .iter()
            .map(|(url, record)| FailureEntry {
                url: url.to_string(),
                attempts: record.attempts,
                error: record.last_error.clone(),
            })
            .collect();

        Self {
            root_url: outcome.root_url.clone(),
            base_prefix: outcome.base_prefix.clone(),
            destination: outcome.destination.display().to_string(),
            stats: outcome.stats.clone(),
            failures,
        }
    }
}

pub fn generate_text_report(data: &MirrorReport) -> String {
    let mut report = String::new();
    let stats = &data.stats;

    report.push_str(RULE);
    report.push_str("                          DIRMIRROR RUN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Source:       {}\n", data.root_url));
    if data.base_prefix != data.root_url {
        report.push_str(&format!("Prefix:       {}\n", data.base_prefix));
    }
    report.push_str(&format!("Destination:  {}\n", data.destination));
    report.push_str(&format!(
        "Duration:     {:.1} seconds\n",
        stats.elapsed.as_secs_f64()
    ));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("  Directories visited:  {}\n", stats.directories_visited));
    report.push_str(&format!("  Directories created:  {}\n", stats.directories_created));
    report.push_str(&format!("  Files discovered:     {}\n", stats.files_discovered));
    report.push_str(&format!("  Files downloaded:     {}\n", stats.files_downloaded));
    if stats.files_recovered_by_retry > 0 {
        report.push_str(&format!(
            "    (after retry:      {})\n",
            stats.files_recovered_by_retry
        ));
    }
    report.push_str(&format!("  Files skipped:        {}\n", stats.files_skipped));
    report.push_str(&format!(
        "  Bytes downloaded:     {}\n",
        format_bytes(stats.bytes_downloaded)
    ));
    report.push_str(&format!("  Permanent failures:   {}\n", stats.permanent_failures));
    report.push('\n');

    if !data.failures.is_empty() {
        report.push_str(RULE);
        report.push_str("PERMANENT FAILURES\n");
        report.push_str(RULE);
        report.push('\n');

        for (idx, failure) in data.failures.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, failure.url));
            report.push_str(&format!("    Attempts: {}\n", failure.attempts));
            report.push_str(&format!("    Error:    {}\n", failure.error));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                             End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &MirrorReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "dirmirror",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "source": {
                "root_url": data.root_url,
                "base_prefix": data.base_prefix,
                "destination": data.destination
            },
            "summary": {
                "directories_visited": data.stats.directories_visited,
                "directories_created": data.stats.directories_created,
                "files_discovered": data.stats.files_discovered,
                "files_downloaded": data.stats.files_downloaded,
                "files_recovered_by_retry": data.stats.files_recovered_by_retry,
                "files_skipped": data.stats.files_skipped,
                "bytes_downloaded": data.stats.bytes_downloaded,
                "permanent_failures": data.stats.permanent_failures,
                "duration_seconds": data.stats.elapsed.as_secs_f64()
            },
            "failures": data.failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_report(data: &MirrorReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {} ({} bytes)", value, UNITS[unit], bytes)
}
