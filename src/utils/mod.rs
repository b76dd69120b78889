//! Utility modules shared by the scanner, catalog and engine

pub mod logging;
pub mod time;
pub mod validation;

// Re-export commonly used items
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use time::current_timestamp;
pub use validation::{ensure_not_blank, recover_lock};
