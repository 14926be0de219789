//! Connection profiles for the `apg` CLI
//!
//! Each profile is a small YAML file in the config directory
//! (`~/.config/registry` unless `APG_CONFIG_DIR` is set), named after the
//! profile. A file called `active_config` holds the name of the profile used
//! when `--config` is not given.
//!
//! ## Profile format
//!
//! ```yaml
//! registry:
//!   address: registry.example.com:443
//!   insecure: false
//!   token: ${REGISTRY_TOKEN}
//!   project: my-project
//!   location: global
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Profiles support environment variable expansion with the following syntax:
//! - `${VAR}` - Simple substitution
//! - `${VAR:-default}` - Use default if VAR is unset or empty
//! - `${VAR-default}` - Use default if VAR is unset
//! - `${VAR:+alt}` - Use alt if VAR is set and non-empty
//! - `${VAR+alt}` - Use alt if VAR is set

use crate::constants::{ACTIVE_CONFIG_FILE, CONFIG_DIR_ENV};
use anyhow::{bail, Context};
use clap::Args;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{env, fs};

/// How to reach one registry.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySettings {
    /// `host:port` or a full URL
    #[serde(default)]
    pub address: String,
    /// Use plain HTTP when the address has no scheme
    #[serde(default)]
    pub insecure: bool,
    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Project used to qualify relative resource names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A named profile as stored on disk.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    #[serde(default)]
    pub registry: RegistrySettings,
}

/// Profiles stored in one directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `APG_CONFIG_DIR`, or `registry` under the user config directory.
    pub fn default_dir() -> PathBuf {
        env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
                p.push("registry");
                p
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.path(name).is_file()
    }

    /// Profile names, sorted.
    pub fn list(&self) -> anyhow::Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("reading config directory {}", self.dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name != ACTIVE_CONFIG_FILE && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads a profile, expanding `${VAR}` placeholders first.
    pub fn load(&self, name: &str) -> anyhow::Result<Profile> {
        validate_name(name)?;
        let path = self.path(name);
        if !path.is_file() {
            bail!("config {name:?} does not exist");
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let profile: Profile = serde_yaml::from_str(&expand_env_placeholders(&raw))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(profile)
    }

    pub fn save(&self, name: &str, profile: &Profile) -> anyhow::Result<()> {
        validate_name(name)?;
        fs::create_dir_all(&self.dir)?;
        let data = serde_yaml::to_string(profile)?;
        fs::write(self.path(name), data)?;
        tracing::debug!(name, dir = %self.dir.display(), "saved config");
        Ok(())
    }

    /// Name of the active profile, if one has been activated.
    pub fn active(&self) -> anyhow::Result<Option<String>> {
        let path = self.path(ACTIVE_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(&path)?.trim().to_string();
        Ok(Some(name).filter(|n| !n.is_empty()))
    }

    pub fn activate(&self, name: &str) -> anyhow::Result<()> {
        if !self.exists(name) {
            bail!("config {name:?} does not exist");
        }
        fs::write(self.path(ACTIVE_CONFIG_FILE), name)?;
        Ok(())
    }

    /// Removes a profile. The active profile cannot be deleted.
    pub fn delete(&self, name: &str) -> anyhow::Result<()> {
        if !self.exists(name) {
            bail!("config {name:?} does not exist");
        }
        if self.active()?.as_deref() == Some(name) {
            bail!("cannot delete config {name:?}: it is the active config");
        }
        fs::remove_file(self.path(name))?;
        Ok(())
    }
}

/// Profile names become file names in the config directory.
pub fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        bail!("config name must not be empty");
    }
    if name == ACTIVE_CONFIG_FILE {
        bail!("{ACTIVE_CONFIG_FILE:?} is reserved and cannot be used as a config name");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("config name {name:?} must not contain path separators");
    }
    Ok(())
}

/// Connection flags shared by every command.
///
/// Flags (and their environment variables) override the selected profile.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Name of the profile to use instead of the active one
    #[arg(short = 'c', long = "config", global = true, env = "APG_CONFIG")]
    pub config: Option<String>,
    /// Registry address (host:port or URL)
    #[arg(long, global = true, env = "APG_REGISTRY_ADDRESS")]
    pub address: Option<String>,
    /// Connect over plain HTTP
    #[arg(long, global = true, env = "APG_REGISTRY_INSECURE")]
    pub insecure: bool,
    /// Bearer token
    #[arg(long, global = true, env = "APG_REGISTRY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// API key
    #[arg(long, global = true, env = "APG_REGISTRY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Project used for relative resource names
    #[arg(long, global = true, env = "APG_REGISTRY_PROJECT")]
    pub project: Option<String>,
    /// Location used for relative resource names
    #[arg(long, global = true, env = "APG_REGISTRY_LOCATION")]
    pub location: Option<String>,
}

impl ConnectionArgs {
    /// Merges the selected profile (if any) with command-line overrides.
    pub fn resolve(&self, store: &ConfigStore) -> anyhow::Result<RegistrySettings> {
        let name = match &self.config {
            Some(name) => Some(name.clone()),
            None => store.active()?,
        };
        let mut settings = match name {
            Some(name) => store.load(&name)?.registry,
            None => RegistrySettings::default(),
        };
        if let Some(address) = &self.address {
            settings.address = address.clone();
        }
        settings.insecure |= self.insecure;
        let overrides = [
            (&mut settings.token, &self.token),
            (&mut settings.api_key, &self.api_key),
            (&mut settings.project, &self.project),
            (&mut settings.location, &self.location),
        ];
        for (field, value) in overrides {
            if value.is_some() {
                field.clone_from(value);
            }
        }
        if settings.address.is_empty() {
            bail!(
                "registry address is not set; pass --address, set APG_REGISTRY_ADDRESS or create a config with `apg config create`"
            );
        }
        Ok(settings)
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?[-+])([^}]*))?\}")
        .expect("placeholder regex is valid")
});

pub fn expand_env_placeholders(input: &str) -> String {
    PLACEHOLDER
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let op = caps.get(2).map_or("", |m| m.as_str());
            let val = caps.get(3).map_or("", |m| m.as_str());
            let var = env::var(var_name).ok();

            match (var.as_deref(), op) {
                (Some(v), _) if op.is_empty() => v.to_string(), // ${VAR}
                (Some(v), ":-") if !v.is_empty() => v.to_string(), // ${VAR:-default}
                (None, ":-") | (Some(_), ":-") => val.to_string(),
                (Some(v), "-") => v.to_string(), // ${VAR-default}
                (None, "-") => val.to_string(),
                (Some(v), ":+") if !v.is_empty() => val.to_string(), // ${VAR:+alt}
                (Some(_), "+") => val.to_string(),                   // ${VAR+alt}
                _ => "".to_string(),
            }
        })
        .to_string()
}
