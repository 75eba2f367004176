//! Opt-in feature toggles read from the process environment.

/// Enables/disables automation kinds (`MONCFG_FEAT_AUTOMATION`, default on).
pub const AUTOMATION_VAR: &str = "MONCFG_FEAT_AUTOMATION";
/// Gates destructive commands (`MONCFG_FEAT_DANGEROUS_COMMANDS`, default off).
pub const DANGEROUS_COMMANDS_VAR: &str = "MONCFG_FEAT_DANGEROUS_COMMANDS";
/// Bounds cross-environment parallelism (`MONCFG_MAX_CONCURRENT_DEPLOYS`).
pub const MAX_CONCURRENT_VAR: &str = "MONCFG_MAX_CONCURRENT_DEPLOYS";

/// Default bound for parallel environment deployments.
const DEFAULT_MAX_CONCURRENT: usize = 4;

fn flag(var: &str, default: bool) -> bool {
    match std::env::var(var) {
        Ok(value) => !matches!(value.as_str(), "0" | "false" | "FALSE" | "off"),
        Err(_) => default,
    }
}

/// `true` unless automation kinds were explicitly disabled.
#[must_use]
pub fn automation_enabled() -> bool {
    flag(AUTOMATION_VAR, true)
}

/// `true` only when destructive commands were explicitly enabled.
#[must_use]
pub fn dangerous_commands_enabled() -> bool {
    match std::env::var(DANGEROUS_COMMANDS_VAR) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "TRUE" | "on"),
        Err(_) => false,
    }
}

/// The configured bound for parallel environment deployments (at least 1).
#[must_use]
pub fn max_concurrent_deploys() -> usize {
    std::env::var(MAX_CONCURRENT_VAR)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_CONCURRENT)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    // The test environment does not set the feature variables, so the
    // defaults are observable directly.

    #[test]
    fn automation_defaults_on() {
        if std::env::var(AUTOMATION_VAR).is_err() {
            assert!(automation_enabled());
        }
    }

    #[test]
    fn dangerous_commands_default_off() {
        if std::env::var(DANGEROUS_COMMANDS_VAR).is_err() {
            assert!(!dangerous_commands_enabled());
        }
    }

    #[test]
    fn max_concurrent_defaults_to_four() {
        if std::env::var(MAX_CONCURRENT_VAR).is_err() {
            assert_eq!(max_concurrent_deploys(), 4);
        }
    }
}
