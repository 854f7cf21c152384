//! API handlers organized by resource.

mod cache;
mod reports;

pub use cache::*;
pub use reports::*;
