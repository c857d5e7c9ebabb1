//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber: pretty or JSON
//! output on stderr, plus optional rolling JSON files.

pub mod logger;

pub use logger::LoggerImpl;
