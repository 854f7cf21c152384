//! Bistro: cached restaurant analytics reports served over HTTP.
//!
//! Layering follows the usual split: `domain` holds report types and their
//! invariants, `cache` owns storage, keys and invalidation, `application`
//! wires generators and exporters around the cache, and `infra` exposes it
//! all over axum.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
