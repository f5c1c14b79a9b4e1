//! Service Layer
//!
//! Orchestrates the filter and the authoritative store behind the
//! `UsernameExistenceApi` port.

pub mod existence_index_service;

pub use existence_index_service::ExistenceIndexService;
