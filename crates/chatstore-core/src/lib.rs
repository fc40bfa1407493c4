//! # chatstore core
//!
//! Shared, runtime-agnostic logic for chatstore: data models, collection
//! schemas with pre-persist hooks, the document store abstraction, the
//! query layer, cursor pagination, and the RAG plugin descriptor.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage backends
//! implement [`store::DocumentStore`]; [`store::memory::InMemoryStore`] is
//! provided for tests and embedding.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Typed records for every collection |
//! | [`error`] | The two surfaced query-layer error kinds |
//! | [`schema`] | Collection schemas, defaults, validation and hooks |
//! | [`store`] | `DocumentStore` trait, filters, in-memory backend |
//! | [`queries`] | One operation per domain action |
//! | [`pagination`] | Over-fetch-by-one page helpers |
//! | [`rag`] | RAG plugin configuration, registration and seams |

pub mod error;
pub mod models;
pub mod pagination;
pub mod queries;
pub mod rag;
pub mod schema;
pub mod store;

pub use error::DbError;
pub use queries::Queries;
pub use store::DocumentStore;
