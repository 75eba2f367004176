//! The version command.

/// Print the tool version.
///
/// Prefers the git-describe version embedded at build time, falling back to
/// the crate version.
pub fn run() {
    let version = option_env!("MONCFG_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    println!("moncfg {version}");
}
