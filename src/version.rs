//! Version information for the readclean binary.

/// Version string taken from the crate manifest at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name used in reports and log output.
pub const NAME: &str = "readclean";
