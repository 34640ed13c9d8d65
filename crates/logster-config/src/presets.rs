use crate::{parse, LogsterConfig, Result};

/// TOML source of the parsers shipped with logster.
pub const BUILTIN_TOML: &str = include_str!("../presets/builtin.toml");

/// Parse the built-in parser definitions.
pub fn builtin() -> Result<LogsterConfig> {
    parse(BUILTIN_TOML)
}
