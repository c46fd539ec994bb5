//! Atelier content store library
//!
//! This crate provides the `ContentStore` abstraction over the document
//! database holding portfolio projects, and its implementations:
//!
//! - **MongoDB** (`store-mongodb`, default): the production store. Projects are
//!   streamed from a cursor and written back with a whole-array `$set` on
//!   `sections`.
//! - **Memory** (`store-memory`): an ordered in-process store used by tests.
//!
//! Passes receive an explicit store handle; `with_mongo_store` scopes the
//! connection so it is always shut down when the pass returns.

#[cfg(any(test, feature = "store-memory"))]
pub mod memory;
#[cfg(feature = "store-mongodb")]
pub mod mongo;
#[cfg(feature = "store-mongodb")]
pub mod session;
pub mod traits;

// Re-export commonly used types
#[cfg(any(test, feature = "store-memory"))]
pub use memory::MemoryContentStore;
#[cfg(feature = "store-mongodb")]
pub use mongo::MongoContentStore;
#[cfg(feature = "store-mongodb")]
pub use session::with_mongo_store;
pub use traits::{
    ContentStore, ProjectStream, ScanOptions, StoreError, StoreResult, DEFAULT_BATCH_SIZE,
};
