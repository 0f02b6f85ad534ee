//! # nixipfs-backend
//!
//! The content-addressed storage capabilities the mirror needs, behind the
//! [`Backend`] trait, plus two implementations:
//!
//! - [`IpfsHttpBackend`] talks to an IPFS node's HTTP API.
//! - [`MemoryBackend`] keeps everything in process and counts every call.

mod backend;
pub mod error;
pub mod ipfs;
pub mod memory;

pub use backend::{Backend, Content};
pub use error::BackendError;
pub use ipfs::IpfsHttpBackend;
pub use memory::{CallCounts, MemoryBackend};
