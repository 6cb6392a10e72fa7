//! Report inspection and maintenance commands.
//!
//! Read-only commands go straight to the store so they work without any
//! provider API keys configured. Cancellation goes through the pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use compintel_core::{AppConfig, ReportStore, StoreError};
use compintel_db::PgStore;
use compintel_pipeline::{ReportListItem, ReportResponse, MAX_LIST_LIMIT};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum ReportsCommands {
    /// List the most recent reports for a subject
    List {
        subject_id: String,
        /// Maximum number of reports to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show one report and its summary
    Show {
        report_id: Uuid,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop an in-flight report
    Cancel { report_id: Uuid },
    /// Delete a finished report
    Delete { report_id: Uuid },
}

pub(crate) async fn run_reports_command(
    config: &Arc<AppConfig>,
    store: PgStore,
    command: ReportsCommands,
) -> anyhow::Result<()> {
    match command {
        ReportsCommands::List { subject_id, limit } => {
            let reports = store
                .find_by_subject(&subject_id, limit.clamp(1, MAX_LIST_LIMIT))
                .await?;
            let items: Vec<ReportListItem> = reports.iter().map(ReportListItem::from).collect();
            print_list(&subject_id, &items);
        }
        ReportsCommands::Show { report_id, json } => {
            let report = store
                .find_by_id(report_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("report {report_id} not found"))?;
            let view = ReportResponse::from(report);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_report(&view);
            }
        }
        ReportsCommands::Cancel { report_id } => {
            let pipeline = crate::build_pipeline(config, store)?;
            let response = pipeline.cancel(report_id).await?;
            println!("report {report_id} is now {}", response.status);
        }
        ReportsCommands::Delete { report_id } => match store.delete(report_id).await {
            Ok(true) => println!("deleted report {report_id}"),
            Ok(false) => anyhow::bail!("report {report_id} not found"),
            Err(StoreError::InProgress(_)) => {
                anyhow::bail!("report {report_id} is still in progress; cancel it first")
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

pub(crate) async fn run_usage(pool: &sqlx::PgPool, daily_budget: f64) -> anyhow::Result<()> {
    let day = compintel_core::utc_today();
    let used = compintel_db::credits::credits_for_day(pool, day).await?;
    println!("{day}: {used} credit(s) used");
    if daily_budget > 0.0 {
        println!(
            "budget {daily_budget}, remaining {}",
            (daily_budget - used).max(0.0)
        );
    } else {
        println!("no daily budget configured");
    }
    Ok(())
}

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "-".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn fmt_price(price: Option<Decimal>) -> String {
    price.map_or_else(|| "-".to_string(), |p| p.to_string())
}

fn print_list(subject_id: &str, items: &[ReportListItem]) {
    if items.is_empty() {
        println!("no reports found for subject {subject_id}");
        return;
    }

    println!(
        "{:<38}{:<12}{:<18}{:<18}COMPETITORS",
        "REPORT", "STATUS", "CREATED", "COMPLETED"
    );
    for item in items {
        println!(
            "{:<38}{:<12}{:<18}{:<18}{}",
            item.report_id,
            item.status.to_string(),
            fmt_time(Some(item.created_at)),
            fmt_time(item.completed_at),
            item.total_competitors
                .map_or_else(|| "-".to_string(), |n| n.to_string())
        );
    }
}

fn print_report(view: &ReportResponse) {
    println!("Report: {}", view.report_id);
    println!("Subject: {}", view.subject_id);
    println!("Status: {} ({})", view.status, view.message);
    println!("Created: {}", fmt_time(Some(view.created)));
    println!("Completed: {}", fmt_time(view.completed));
    if let Some(error) = &view.error {
        println!("Error: {error}");
    }
    if !view.failed_urls.is_empty() {
        println!("Failed URLs:");
        for url in &view.failed_urls {
            println!("  {url}");
        }
    }

    let Some(report) = &view.report else {
        return;
    };
    let summary = &report.summary;
    println!();
    println!(
        "{:<40}{:>12}{:>12}  URL",
        "COMPETITOR",
        "PRICE",
        summary.store_currency.as_str()
    );
    for profile in &report.competitors {
        let name = if profile.name.chars().count() > 38 {
            format!("{}...", profile.name.chars().take(35).collect::<String>())
        } else {
            profile.name.clone()
        };
        println!(
            "{:<40}{:>12}{:>12}  {}",
            name,
            fmt_price(profile.current_price),
            fmt_price(profile.converted_price),
            profile.url
        );
    }
    println!();
    for finding in &summary.key_findings {
        println!("- {finding}");
    }
}
