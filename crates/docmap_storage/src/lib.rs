//! # docmap storage
//!
//! The document-store collection interface consumed by docmap.
//!
//! This crate is the lowest layer that touches stored records. Collections
//! speak only in storage form: `_id` primary keys and escaped map keys.
//! Schemas, references and identity caching live in `docmap_core`.
//!
//! ## Design Principles
//!
//! - Collections are equality-filtered record stores (find, insert, update, remove)
//! - No knowledge of schemas or entity types
//! - Must be `Send + Sync`; every call is a potentially blocking I/O boundary
//! - Failures are reported, never retried
//!
//! ## Available Collections
//!
//! - [`InMemoryCollection`] - For testing and ephemeral storage
//! - [`InMemoryStore`] - A [`DocumentStore`] handing out in-memory collections by name
//!
//! ## Example
//!
//! ```rust
//! use docmap_codec::{ObjectId, Record, Value};
//! use docmap_storage::{DocumentCollection, InMemoryCollection, Update};
//!
//! let col = InMemoryCollection::new("user");
//! let id = Value::ObjectId(ObjectId::new());
//! let mut record = Record::new();
//! record.insert("_id".into(), id.clone());
//! col.insert(record).unwrap();
//!
//! let mut by_id = Record::new();
//! by_id.insert("_id".into(), id);
//! let mut set = Record::new();
//! set.insert("username".into(), Value::from("bob"));
//! assert_eq!(col.update(&by_id, &Update::set(set)).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod index;
mod memory;
mod query;
mod store;

pub use collection::{Cursor, DocumentCollection};
pub use error::{StorageError, StorageResult};
pub use index::{IndexOptions, IndexSpec, SortDirection};
pub use memory::InMemoryCollection;
pub use query::{compare_records, lookup_path, matches, FindOptions, Update, PRIMARY_KEY};
pub use store::{DocumentStore, InMemoryStore};
