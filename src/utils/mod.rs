pub mod log_sanitizer;

pub use log_sanitizer::{redact_sensitive, sanitize_for_log};
