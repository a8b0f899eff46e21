//! Catalog services
//!
//! Handlers open a [`unit_of_work::UnitOfWork`] through
//! [`metadata_service::MetadataService::begin`] and pass it into every service
//! call of the request.

pub mod metadata_service;
pub mod request_context;
pub mod storage_service;
pub mod unit_of_work;
