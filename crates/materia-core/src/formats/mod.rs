//! # Formats Module
//!
//! Byte-level encodings of the persisted state: pretty JSON documents for the
//! directory store and header-prefixed postcard blobs for the redb store.
//! File I/O lives in the storage backends.

mod persistence;

pub use persistence::*;
