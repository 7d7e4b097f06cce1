// Version information for the chatbot crate

/// Version string for the chatbot crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

