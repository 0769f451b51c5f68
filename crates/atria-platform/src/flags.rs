use std::collections::HashMap;

use atria_core::FlagProvider;

/// Fixed flag values, handed to services at wiring time. The flag oracle is
/// resolved once per operation and passed down explicitly, never read from
/// ambient global state mid-calculation.
#[derive(Default)]
pub struct StaticFlags {
    values: HashMap<String, bool>,
}

impl StaticFlags {
    pub fn with(values: &[(&str, bool)]) -> Self {
        StaticFlags {
            values: values
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }
}

impl FlagProvider for StaticFlags {
    fn bool_flag(&self, name: &str, default: bool) -> bool {
        self.values.get(name).copied().unwrap_or(default)
    }
}

/// Flags read from the environment: `FLAG_<NAME>` set to "true"/"false".
#[derive(Default)]
pub struct EnvFlags;

impl FlagProvider for EnvFlags {
    fn bool_flag(&self, name: &str, default: bool) -> bool {
        let var = format!("FLAG_{}", name.to_uppercase().replace('-', "_"));
        match std::env::var(var) {
            Ok(raw) => raw.eq_ignore_ascii_case("true"),
            Err(_) => default,
        }
    }
}
