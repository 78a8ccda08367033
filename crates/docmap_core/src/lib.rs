//! # docmap core
//!
//! Schema-validated object-document mapping over a document store.
//!
//! This crate provides:
//! - Field descriptors and schemas with nested maps and typed lists
//! - Closed-world validation with dotted error paths
//! - References between entity types, resolved lazily to live documents
//! - A per-type identity cache: one live [`Document`] per stored id
//! - Schema migration by default-filling on every read
//! - Storage key escaping for `$` and `.` in embedded map keys
//!
//! ## Layers
//!
//! ```text
//! Registry ── EntityType ── Document / RefList
//!                 │
//!          Schema, Validator, IdentityCache
//!                 │
//!     docmap_storage::DocumentCollection  (stored form: `_id`, escaped keys)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docmap_core::{Assign, EntityType, FieldDescriptor, Query, Registry};
//!
//! let registry = Registry::in_memory();
//! let users = registry
//!     .register(
//!         EntityType::builder("User")
//!             .field("username", FieldDescriptor::text())
//!             .index("username"),
//!     )
//!     .unwrap();
//! let emails = registry
//!     .register(
//!         EntityType::builder("Email")
//!             .field("user", FieldDescriptor::reference(&users))
//!             .field("subject", FieldDescriptor::text()),
//!     )
//!     .unwrap();
//!
//! let bob = users.create([("username", "bob")]).unwrap();
//! let mail = emails
//!     .create([("user", Assign::from(&bob)), ("subject", "hi".into())])
//!     .unwrap();
//!
//! // The reference is stored as an id and resolves to the same instance.
//! assert_eq!(mail.value("user"), Some(bob.id().clone()));
//! let owner = mail.get("user").unwrap().into_entity().unwrap();
//! assert!(owner.ptr_eq(&bob));
//!
//! assert_eq!(emails.count(Query::new().eq("user", &bob)).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod document;
mod entity;
mod error;
mod query;
mod reference;
mod reflist;
mod registry;
mod schema;
mod validate;

pub use cache::{IdKey, IdentityCache};
pub use config::RegistryConfig;
pub use document::{DocState, Document};
pub use entity::{Documents, EntityType, EntityTypeBuilder};
pub use error::{ErrorKind, OdmError, OdmResult};
pub use query::Query;
pub use reference::{Assign, Field};
pub use reflist::RefList;
pub use registry::Registry;
pub use schema::{DefaultValue, FieldDescriptor, FieldType, Schema, SchemaNode, TypeRef, ID_FIELD};
pub use validate::Validator;
