//! nixipfs core library: domain types, hash cache persistence and the local layout.
//!
//! Public API surface:
//! - [`types`]: newtypes shared by the backend and sync crates
//! - [`error`]: [`CoreError`]
//! - [`hash_cache`]: load / persist the cross-run filename → hash cache
//! - [`layout`]: every local path derived from the mirror root
//! - [`policy`]: fixed allow-lists deciding which files are uploaded and cached

pub mod error;
pub mod hash_cache;
pub mod layout;
pub mod policy;
pub mod types;

pub use error::CoreError;
pub use hash_cache::HashCache;
pub use layout::LocalLayout;
pub use policy::FileSelector;
pub use types::{ContentHash, PublishedName, RemotePath, UploadResult};
