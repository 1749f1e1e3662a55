//! S3-compatible object storage.
//!
//! This crate provides:
//! - The [`ObjectStore`] seam used by every pipeline stage
//! - [`S3Store`], backed by the AWS SDK (works against any S3 endpoint)
//! - [`MemoryStore`], an in-process store for local runs and tests

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{content_type_for_key, ObjectInfo, ObjectStore};
