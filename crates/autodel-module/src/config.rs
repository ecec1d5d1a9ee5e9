use autodel_store::NotifyMask;
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ModuleResult};

/// Positions of key arguments in a command's argv, for hosts that route or
/// check access by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub first: usize,
    pub last: usize,
    pub step: usize,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            first: 1,
            last: 1,
            step: 1,
        }
    }
}

/// Configuration for [`crate::AutoDelModule`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Name the module registers under.
    pub name: String,
    /// Module API version reported to the host.
    pub version: u32,
    /// Name of the claim command. Matched case-insensitively by hosts.
    pub command_name: String,
    /// Space-separated command flags passed through to the host.
    pub command_flags: String,
    /// Keyspace event classes the module subscribes to.
    pub notify: NotifyMask,
    pub key_spec: KeySpec,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: "autodel".into(),
            version: 1,
            command_name: "ax.associate_key".into(),
            command_flags: "readonly fast".into(),
            notify: NotifyMask::GENERIC | NotifyMask::EXPIRED | NotifyMask::EVICTED,
            key_spec: KeySpec::default(),
        }
    }
}

impl ModuleConfig {
    pub fn validate(&self) -> ModuleResult<()> {
        if self.name.is_empty() {
            return Err(ModuleError::InvalidConfig("module name is empty".into()));
        }
        if self.command_name.is_empty() || self.command_name.contains(char::is_whitespace) {
            return Err(ModuleError::InvalidConfig(format!(
                "command name {:?} must be a single non-empty word",
                self.command_name
            )));
        }
        let KeySpec { first, last, step } = self.key_spec;
        if first == 0 || last < first || step == 0 {
            return Err(ModuleError::InvalidConfig(format!(
                "key spec ({first}, {last}, {step}) does not select any argument"
            )));
        }
        Ok(())
    }

    /// Command flags as individual words.
    pub fn flags(&self) -> Vec<String> {
        self.command_flags
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodel_store::EventClass;

    #[test]
    fn default_config() {
        let c = ModuleConfig::default();
        assert_eq!(c.command_name, "ax.associate_key");
        assert_eq!(c.flags(), vec!["readonly", "fast"]);
        assert_eq!(c.key_spec, KeySpec { first: 1, last: 1, step: 1 });
        assert!(c.notify.contains(EventClass::Generic));
        assert!(c.notify.contains(EventClass::Expired));
        assert!(c.notify.contains(EventClass::Evicted));
        assert!(!c.notify.contains(EventClass::String));
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c: ModuleConfig = toml::from_str(
            r#"
            command_name = "claim"
            notify = ["expired"]
            "#,
        )
        .unwrap();
        assert_eq!(c.command_name, "claim");
        assert_eq!(c.notify, NotifyMask::EXPIRED);
        assert_eq!(c.version, 1);
    }

    #[test]
    fn rejects_bad_command_name() {
        let c = ModuleConfig {
            command_name: "two words".into(),
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ModuleError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_key_spec() {
        let c = ModuleConfig {
            key_spec: KeySpec { first: 0, last: 0, step: 0 },
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
