//! Persistence for ramble models.
//!
//! `ramble-core` stays free of I/O; this crate owns the on-disk archive
//! format and the wire representations it is made of.

pub mod archive;
pub mod error;
pub mod wire;

pub use archive::{exists, load, save};
pub use error::{Result, StoreError};
