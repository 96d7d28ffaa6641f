//! Runtime-specific knobs for thread control and stepping
//!
//! Defaults match the Go runtime. Every field can be overridden from TOML:
//!
//! ```toml
//! goexit_symbol = "runtime.goexit"
//! defer_scan_limit = 256
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extension (without the dot) of managed-language sources
    pub managed_extension: String,

    /// Function a goroutine returns into when its entry function exits
    pub goexit_symbol: String,

    /// Function that hosts compiled-in breakpoints
    pub breakpoint_symbol: String,

    /// Type name of the goroutine control block
    pub g_type_name: String,

    /// Variable name given to the control block when read directly from TLS
    pub curg_name: String,

    /// Maximum number of lines scanned forward from a deferred call
    pub defer_scan_limit: u32,

    /// Attempts made to rewrite a trap after stepping past it
    pub reinstate_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            managed_extension: "go".to_string(),
            goexit_symbol: "runtime.goexit".to_string(),
            breakpoint_symbol: "runtime.breakpoint".to_string(),
            g_type_name: "runtime.g".to_string(),
            curg_name: "runtime.curg".to_string(),
            defer_scan_limit: 1024,
            reinstate_attempts: 2,
        }
    }
}

impl Config {
    /// Parse a configuration from TOML, filling in defaults for missing keys
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reinstate_attempts == 0 {
            return Err(Error::Config("reinstate_attempts must be at least 1".to_string()));
        }
        if self.managed_extension.starts_with('.') {
            return Err(Error::Config(format!(
                "managed_extension must not start with a dot: {}",
                self.managed_extension
            )));
        }
        Ok(())
    }
}
