//! Service layer: the storage orchestrator and the remote-capability
//! clients it composes (key service, blob store, metadata catalog, secret
//! provider), plus credential lookup.

pub mod blob_store;
pub mod key_service;
pub mod metadata_repository;
pub mod secrets;
pub mod storage_service;
pub mod user_repository;
