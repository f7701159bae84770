//! bucketview: folder-tree browsing and bulk operations over a flat
//! S3-compatible object store.
//!
//! The store only knows buckets and keys. Everything hierarchical here is
//! derived per request from key prefixes: directory views, recursive
//! enumeration, bulk delete, streaming zip downloads, and presigned
//! capability URLs all sit on top of the same small gateway trait.

pub mod archive;
pub mod bulk;
pub mod capability;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod folders;
pub mod gateway;
pub mod handlers;
pub mod listing;
pub mod server;
