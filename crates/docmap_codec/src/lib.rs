//! # docmap codec
//!
//! Document value model for docmap.
//!
//! This crate provides:
//! - [`Value`] and [`Record`], the tree every stored document is made of
//! - [`ObjectId`], the store-native primary key type
//! - The key codec that escapes `$` and `.` in map keys before storage
//! - Conversion to and from plain JSON
//!
//! ## Usage
//!
//! ```
//! use docmap_codec::{escape_value, unescape_value, Value};
//!
//! let value = Value::map([("a.b", Value::from("c"))]);
//! let stored = escape_value(value.clone());
//! assert_eq!(stored, Value::map([("a&period;b", Value::from("c"))]));
//! assert_eq!(unescape_value(stored), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod keys;
mod object_id;
mod value;

pub use error::{CodecError, CodecResult};
pub use json::{record_to_json, to_pretty_json};
pub use keys::{
    escape_key, escape_record, escape_value, needs_escape, unescape_key, unescape_record,
    unescape_value, KEY_REPLACEMENTS,
};
pub use object_id::ObjectId;
pub use value::{Record, Value};
