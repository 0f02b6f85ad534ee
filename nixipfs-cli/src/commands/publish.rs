//! `nixipfs publish`: upload, assemble, pin and publish one run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{builder::RangedU64ValueParser, Args};

use nixipfs_backend::{ipfs::DEFAULT_API, IpfsHttpBackend};
use nixipfs_core::LocalLayout;
use nixipfs_sync::{
    pipeline::{namespace_for, run, RunOptions},
    uploader::DEFAULT_UPLOAD_CONCURRENCY,
    ReleaseOutcome, RunSummary,
};

/// Arguments for `nixipfs publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// IPFS API address, `host:port` or a full URL.
    #[arg(long, default_value = DEFAULT_API)]
    pub ipfsapi: String,

    /// Mirror root holding `releases/`, `channels/` and `binary_cache/`.
    #[arg(long, default_value = "output")]
    pub dir: PathBuf,

    /// Maximum concurrent uploads.
    #[arg(
        long,
        default_value_t = DEFAULT_UPLOAD_CONCURRENCY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
    )]
    pub jobs: usize,

    /// Timeout for connecting to the IPFS API and for every request except
    /// uploads, which may run as long as the file takes to stream.
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let layout = LocalLayout::new(&self.dir);
        let backend = IpfsHttpBackend::new(&self.ipfsapi, Duration::from_secs(self.timeout_secs))
            .context("failed to build IPFS API client")?;
        tracing::debug!("using IPFS API at {}", backend.base_url());

        let options = RunOptions {
            namespace: namespace_for(chrono::Utc::now().timestamp()),
            concurrency: self.jobs,
        };
        let summary = run(&layout, Arc::new(backend), &options).with_context(|| {
            format!(
                "publish of {} via {} failed",
                self.dir.display(),
                self.ipfsapi
            )
        })?;

        print_summary(&summary);
        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    if let Some(cache) = summary.global_cache {
        println!(
            "✓ binary cache: {} narinfo, {} nar",
            cache.narinfos, cache.nars
        );
    }
    for report in &summary.releases {
        match &report.outcome {
            ReleaseOutcome::Uploaded { hash, files } => println!(
                "✓ {} '{}' uploaded ({files} files) {hash}",
                report.kind, report.name
            ),
            ReleaseOutcome::Republished { hash } => {
                println!("· {} '{}' republished {hash}", report.kind, report.name)
            }
        }
    }
    println!("Root {} is {}", summary.namespace, summary.root_hash);
    println!(
        "Published {} to /ipns/{}",
        summary.published.value, summary.published.name
    );
}
