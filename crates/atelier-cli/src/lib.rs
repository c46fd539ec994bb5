use anyhow::bail;
use atelier_core::{AppError, PassState, PassSummary, Strategy};
use atelier_db::StoreResult;
use atelier_services::VerificationReport;
use std::fmt::Write;
use std::future::Future;

/// Output format for pass reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Human readable summary of a migrate or cleanup pass.
pub fn render_summary(summary: &PassSummary) -> String {
    let mut out = String::new();
    let title = if summary.dry_run {
        format!("=== {} summary (dry run) ===", summary.pass)
    } else {
        format!("=== {} summary ===", summary.pass)
    };
    let _ = writeln!(out, "\n{}\n", title);

    if let Some(strategy) = summary.strategy {
        let _ = writeln!(out, "Strategy:          {}", strategy);
    }
    let _ = writeln!(out, "State:             {:?}", summary.state);
    let _ = writeln!(out, "Projects scanned:  {:>8}", summary.projects_scanned);
    let _ = writeln!(out, "Projects modified: {:>8}", summary.projects_modified);
    let _ = writeln!(out, "Sections modified: {:>8}", summary.sections_modified);
    let _ = writeln!(out, "Projects failed:   {:>8}", summary.projects_failed());

    if let Some(reason) = &summary.abort_reason {
        let _ = writeln!(out, "\nAborted: {}", reason);
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(out, "\n--- Failures ---");
        let _ = writeln!(
            out,
            "{:<26} {:<24} {:>7}  {:<18} {}",
            "PROJECT", "NAME", "SECTION", "CODE", "MESSAGE"
        );
        for failure in &summary.failures {
            let section = failure
                .section_index
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:<26} {:<24} {:>7}  {:<18} {}",
                truncate_string(failure.project_id.as_str(), 26),
                truncate_string(&failure.project_name, 24),
                section,
                failure.code,
                truncate_string(&failure.message, 60)
            );
        }
    }

    out
}

/// Human readable verification report.
pub fn render_report(report: &VerificationReport) -> String {
    let mut out = String::new();
    let totals = &report.totals;

    let _ = writeln!(out, "\n=== Verification ===\n");
    let _ = writeln!(out, "State:             {:?}", report.summary.state);
    let _ = writeln!(
        out,
        "Projects scanned:  {:>8}",
        report.summary.projects_scanned
    );
    let _ = writeln!(out, "Sections checked:  {:>8}", totals.total());
    let _ = writeln!(out, "\n--- Sections by content ---");
    let _ = writeln!(out, "Hosted URL:        {:>8}", totals.hosted_url);
    let _ = writeln!(out, "Legacy payload:    {:>8}", totals.legacy_payload);
    let _ = writeln!(out, "Placeholder:       {:>8}", totals.placeholder);
    let _ = writeln!(out, "Other:             {:>8}", totals.other);
    let _ = writeln!(out, "Empty:             {:>8}", totals.empty);

    let remaining: Vec<_> = report.remaining().collect();
    if !remaining.is_empty() {
        let _ = writeln!(out, "\n--- Projects with legacy payloads ---");
        for audit in remaining {
            let indices: Vec<String> = audit
                .legacy_sections
                .iter()
                .map(|i| i.to_string())
                .collect();
            let _ = writeln!(
                out,
                "{:<26} {:<24} sections [{}]",
                truncate_string(audit.project_id.as_str(), 26),
                truncate_string(&audit.name, 24),
                indices.join(", ")
            );
        }
    }

    if !report.summary.failures.is_empty() {
        let _ = writeln!(out, "\n--- Unchecked projects ---");
        for failure in &report.summary.failures {
            let _ = writeln!(out, "{:<26} {}", failure.project_id, failure.message);
        }
    }

    if let Some(reason) = &report.summary.abort_reason {
        let _ = writeln!(out, "\nAborted: {}", reason);
    }

    let verdict = if report.is_complete() {
        "PASS: no legacy payloads remain"
    } else {
        "FAIL: migration incomplete"
    };
    let _ = writeln!(out, "\n{}", verdict);

    out
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Await a store session on behalf of `summary`'s pass.
///
/// The summary is `Connecting` until the session resolves. A session that
/// never connected aborts the summary and yields `None`.
pub async fn connect_scoped<T, Fut>(summary: &mut PassSummary, session: Fut) -> Option<T>
where
    Fut: Future<Output = StoreResult<T>>,
{
    summary.state = PassState::Connecting;
    tracing::info!(pass = %summary.pass, "Connecting to content store");

    match session.await {
        Ok(output) => Some(output),
        Err(e) => {
            let e = AppError::from(e);
            tracing::error!(pass = %summary.pass, error = %e, "Pass aborted before scanning");
            summary.abort(e.to_string());
            None
        }
    }
}

/// Reject flags that only apply to the other strategy.
pub fn check_strategy_flags(
    strategy: Strategy,
    placeholder: Option<&str>,
    max_payload_bytes: Option<u64>,
) -> anyhow::Result<()> {
    match strategy {
        Strategy::Upload if placeholder.is_some() => {
            bail!("--placeholder only applies to the discard strategy")
        }
        Strategy::Discard if max_payload_bytes.is_some() => {
            bail!("--max-payload-bytes only applies to the upload strategy")
        }
        _ => Ok(()),
    }
}
