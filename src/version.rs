// Package identity from Cargo.toml, used in the startup log and the upload User-Agent

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `netprobe/<version>`
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
