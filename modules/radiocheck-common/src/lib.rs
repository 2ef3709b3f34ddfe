pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{adjust_name_for_url, format_tag, parse_catalog, Catalog};
pub use config::{Config, DiscoveryTimings};
pub use error::RadioCheckError;
pub use types::*;
