//! Durable `PersistentStore` implementations

pub mod file_store;

pub use file_store::FileOperationStore;
