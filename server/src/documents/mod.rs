//! PDF documents and per-user retrieval tracking.
//!
//! Each document carries a retriever set: the usernames that have received
//! it through the pending listing. Only `DocumentStore::list_pending_for`
//! grows that set; direct fetches and the full listing never touch it.

pub mod routes;
pub mod store;

pub use store::DocumentStore;
