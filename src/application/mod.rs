//! Application services: report orchestration, cache administration, and the
//! generator and exporter collaborators they drive.

pub mod cache_admin;
pub mod error;
pub mod export;
pub mod generators;
pub mod reports;
