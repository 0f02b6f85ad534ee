//! # nixipfs-sync
//!
//! Upload, cache and publish pipeline.
//!
//! Call [`pipeline::run`] to mirror a whole local root into one published
//! tree, or [`release::sync_release`] to mirror a single release or channel.
//! [`plan::plan_at`] reports what a run would do without touching the
//! backend.

pub mod assembler;
pub mod error;
pub mod lister;
pub mod pipeline;
pub mod plan;
pub mod release;
pub mod uploader;

pub use error::SyncError;
pub use pipeline::{run, ReleaseReport, RunOptions, RunSummary, TargetKind};
pub use release::{sync_release, ReleaseOutcome};
pub use uploader::{ResolvedFiles, Uploader};
