//! The client-side driver: walks one report from search to a finalized
//! summary, one pipeline call at a time.

use compintel_core::{ReportStatus, ReportStore, SearchHit};
use compintel_db::PgStore;
use compintel_pipeline::{FinalizeResponse, Pipeline, StartResearchResponse};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResearchOptions {
    pub select: usize,
    pub urls: Vec<String>,
    pub force_refresh: bool,
}

/// Explicit `--url` values win; otherwise the first `select` candidates.
pub(crate) fn choose_urls(candidates: &[String], explicit: &[String], select: usize) -> Vec<String> {
    if explicit.is_empty() {
        candidates.iter().take(select.max(1)).cloned().collect()
    } else {
        explicit.to_vec()
    }
}

/// Runs every remaining stage of the subject's report, resuming a report
/// that is already in flight.
///
/// # Errors
///
/// Returns an error when a stage is refused or fails.
pub(crate) async fn run_research(
    pipeline: &Pipeline,
    store: &PgStore,
    subject_id: &str,
    options: &ResearchOptions,
) -> anyhow::Result<()> {
    let started = pipeline
        .start_research(subject_id, options.force_refresh)
        .await?;
    let report_id = started.report_id();

    let total = match started {
        StartResearchResponse::Started {
            search_results,
            urls,
            query,
            ..
        } => {
            println!("report {report_id}");
            println!("query: {query}");
            print_candidates(&search_results);
            confirm(pipeline, report_id, &urls, options).await?
        }
        StartResearchResponse::Resuming { status, .. } => {
            println!("resuming report {report_id} ({status})");
            let report = store
                .find_by_id(report_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("report {report_id} disappeared while resuming"))?;
            if status == ReportStatus::Previewing {
                let urls: Vec<String> =
                    report.competitor_data.iter().map(|h| h.url.clone()).collect();
                print_candidates(&report.competitor_data);
                confirm(pipeline, report_id, &urls, options).await?
            } else {
                pipeline
                    .confirm_urls(report_id, &report.selected_urls)
                    .await?
                    .total_urls
            }
        }
    };

    println!("analyzing {total} page(s)");
    for index in 0..total {
        let step = pipeline.analyze_url(report_id, index).await?;
        let label = match (&step.profile, &step.error) {
            (Some(profile), _) => format!(
                "{} {}",
                profile.name,
                profile
                    .current_price
                    .map(|p| format!("{p} {}", profile.currency.as_deref().unwrap_or("")))
                    .unwrap_or_default()
            ),
            (None, Some(error)) => format!("skipped: {error}"),
            (None, None) => "no profile".to_string(),
        };
        println!(
            "  [{}/{}] {}",
            step.progress.current,
            step.progress.total,
            label.trim_end()
        );
    }

    let finalized = pipeline.finalize(report_id).await?;
    print_summary(&finalized);
    Ok(())
}

async fn confirm(
    pipeline: &Pipeline,
    report_id: Uuid,
    candidates: &[String],
    options: &ResearchOptions,
) -> anyhow::Result<usize> {
    let selected = choose_urls(candidates, &options.urls, options.select);
    anyhow::ensure!(
        !selected.is_empty(),
        "search returned no candidate URLs; nothing to analyze"
    );
    println!("extracting {} page(s)", selected.len());
    Ok(pipeline.confirm_urls(report_id, &selected).await?.total_urls)
}

fn print_candidates(hits: &[SearchHit]) {
    println!("{} candidate(s):", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("  {:>2}. {}  {}", i + 1, hit.title, hit.url);
    }
}

fn print_summary(finalized: &FinalizeResponse) {
    let summary = &finalized.report.summary;
    println!();
    println!(
        "{} competitor(s), prices in {}",
        summary.total_competitors, summary.store_currency
    );
    if let (Some(lo), Some(hi), Some(avg)) =
        (summary.lowest_price, summary.highest_price, summary.avg_price)
    {
        println!("  low {lo}  high {hi}  avg {avg}");
    }
    for finding in &summary.key_findings {
        println!("  - {finding}");
    }
    if !summary.common_features.is_empty() {
        println!("  common features: {}", summary.common_features.join(", "));
    }
}
