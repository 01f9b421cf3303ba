//! Observability for the connection manager: structured logging setup and
//! the span macros used around broker operations.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

pub use logging::mqtt_span;
