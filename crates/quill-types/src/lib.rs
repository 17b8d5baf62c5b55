//! Foundation types for Quill.
//!
//! Quill stores every object as an append-only, plain-text changelog. This
//! crate holds the small vocabulary shared by the storage engine and its
//! consumers.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Opaque object identifier, generated or caller-supplied
//! - [`IndexKey`] -- Name of an index bucket (e.g. `title:foo`)
//! - [`Timestamp`] -- Wall-clock milliseconds since the UNIX epoch
//! - [`Change`] -- A single `time:field=value` change record

pub mod change;
pub mod error;
pub mod key;
pub mod object;
pub mod temporal;

pub use change::{is_valid_field, Change};
pub use error::TypeError;
pub use key::IndexKey;
pub use object::ObjectId;
pub use temporal::Timestamp;
