//! `nixipfs status`: what the next publish would do.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use nixipfs_core::{HashCache, LocalLayout};
use nixipfs_sync::plan::{plan_at, PlanState, TargetPlan};

/// Arguments for `nixipfs status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Mirror root holding `releases/`, `channels/` and `binary_cache/`.
    #[arg(long, default_value = "output")]
    pub dir: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let layout = LocalLayout::new(&self.dir);
        let cache = HashCache::load_at(&layout.hash_cache_path()).with_context(|| {
            format!(
                "failed to load hash cache {}",
                layout.hash_cache_path().display()
            )
        })?;
        let plans = plan_at(&layout, &cache)
            .with_context(|| format!("failed to plan {}", self.dir.display()))?;

        if self.json {
            return print_json(&plans, cache.len());
        }
        print_table(&self.dir, &plans, cache.len());
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    targets: Vec<TargetStatusJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    targets: usize,
    pending: usize,
    cached_hashes: usize,
}

#[derive(Serialize)]
struct TargetStatusJson {
    kind: String,
    name: String,
    remote: String,
    status: &'static str,
    marker: Option<String>,
    selected: usize,
    cached: usize,
    pending_uploads: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "remote")]
    remote: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "cached")]
    cached: usize,
    #[tabled(rename = "to upload")]
    pending: usize,
}

fn print_json(plans: &[TargetPlan], cached_hashes: usize) -> Result<()> {
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            targets: plans.len(),
            pending: plans.iter().map(TargetPlan::pending_uploads).sum(),
            cached_hashes,
        },
        targets: plans
            .iter()
            .map(|plan| TargetStatusJson {
                kind: plan.kind.to_string(),
                name: plan.name.clone(),
                remote: plan.remote.to_string(),
                status: state_key(&plan.state),
                marker: marker(&plan.state),
                selected: plan.selected,
                cached: plan.cached,
                pending_uploads: plan.pending_uploads(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(dir: &Path, plans: &[TargetPlan], cached_hashes: usize) {
    let pending: usize = plans.iter().map(TargetPlan::pending_uploads).sum();
    println!(
        "nixipfs v{} | {} | {} targets | {} cached hashes | {} to upload",
        env!("CARGO_PKG_VERSION"),
        dir.display(),
        plans.len(),
        cached_hashes,
        pending,
    );

    if plans.is_empty() {
        println!("Nothing to publish.");
        return;
    }

    println!(
        "Indicators: {} UPLOAD  {} REPUBLISH",
        state_indicator(&PlanState::Upload),
        "■".green().bold(),
    );
    let rows: Vec<StatusTableRow> = plans
        .iter()
        .map(|plan| StatusTableRow {
            target: format!("{} {}", plan.kind, plan.name),
            status: format!("{} {}", state_indicator(&plan.state), state_label(&plan.state)),
            remote: format!("<ns>{}", plan.remote),
            files: plan.selected,
            cached: plan.cached,
            pending: plan.pending_uploads(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn state_key(state: &PlanState) -> &'static str {
    match state {
        PlanState::Upload => "upload",
        PlanState::Republish { .. } => "republish",
    }
}

fn state_label(state: &PlanState) -> &'static str {
    match state {
        PlanState::Upload => "UPLOAD",
        PlanState::Republish { .. } => "REPUBLISH",
    }
}

fn state_indicator(state: &PlanState) -> String {
    match state {
        PlanState::Upload => "■".yellow().bold().to_string(),
        PlanState::Republish { .. } => "■".green().bold().to_string(),
    }
}

fn marker(state: &PlanState) -> Option<String> {
    match state {
        PlanState::Upload => None,
        PlanState::Republish { hash } => Some(hash.to_string()),
    }
}
