pub mod core;
pub mod http;
pub mod layout;
pub mod merge;
pub mod model;
pub mod nlp;
pub mod pipeline;
pub mod scraping;
pub mod segment;
pub mod storage;

// --- Primary core exports ---
pub use crate::core::error::{AtlasError, Result};
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;
