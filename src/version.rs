// Build-time identity from Cargo.toml

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name/version`, logged at start-up.
pub fn user_agent() -> String {
    format!("{NAME}/{VERSION}")
}
