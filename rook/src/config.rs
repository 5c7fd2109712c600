//! Engine tunables, overridable from the environment.

use std::env;

/// Knobs an embedder can set per engine. `from_env` applies
/// `ROOK_*`-prefixed overrides on top of the defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for `length/2` generating lists with both arguments
    /// unbound. Generation fails past the cap rather than running away.
    pub length_generation_cap: usize,
    /// Log every resolved goal at debug level.
    pub trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            length_generation_cap: 4096,
            trace: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(cap) = env::var("ROOK_LENGTH_CAP") {
            match cap.parse::<usize>() {
                Ok(value) => config.length_generation_cap = value,
                Err(_) => log::warn!("ignoring unparsable ROOK_LENGTH_CAP={}", cap),
            }
        }
        if let Ok(trace) = env::var("ROOK_TRACE") {
            config.trace = matches!(trace.as_str(), "1" | "true" | "on");
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_generous() {
        let config = EngineConfig::default();
        assert!(config.length_generation_cap >= 1024);
        assert!(!config.trace);
    }
}
