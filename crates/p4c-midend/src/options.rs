//! Middle-end options.
//!
//! Options can be built in code or read from a TOML table:
//!
//! ```toml
//! dialect = "legacy"
//! dump_passes = true
//! key_temp_prefix = "key"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which language revision the program was written in. Selects the
/// pipeline and the control inliner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Legacy,
    #[default]
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MidEndOptions {
    pub dialect: Dialect,
    /// Log the printed tree after every pass (at `debug` level).
    pub dump_passes: bool,
    /// Base name of the temporaries introduced for complex table keys.
    pub key_temp_prefix: String,
}

impl Default for MidEndOptions {
    fn default() -> Self {
        MidEndOptions {
            dialect: Dialect::Current,
            dump_passes: false,
            key_temp_prefix: "tmp".to_string(),
        }
    }
}

impl MidEndOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_is_default() {
        let options = MidEndOptions::from_toml_str("").unwrap();
        assert_eq!(options, MidEndOptions::default());
    }

    #[test]
    fn reads_every_field() {
        let options = MidEndOptions::from_toml_str(
            "dialect = \"legacy\"\ndump_passes = true\nkey_temp_prefix = \"key\"\n",
        )
        .unwrap();
        assert_eq!(options.dialect, Dialect::Legacy);
        assert!(options.dump_passes);
        assert_eq!(options.key_temp_prefix, "key");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = MidEndOptions::from_toml_str("inline = false").unwrap_err();
        assert!(err.to_string().starts_with("invalid middle-end options"));
    }
}
