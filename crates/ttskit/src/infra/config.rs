//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".ttskit/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub include: Include,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Extension for extracted script files.
    #[serde(default = "Defaults::default_script_extension")]
    pub script_extension: String,
    /// Decimal places kept when numeric normalization is requested.
    #[serde(default = "Defaults::default_normalize_digits")]
    pub normalize_digits: u32,
}

impl Defaults {
    fn default_script_extension() -> String {
        "ttslua".into()
    }

    fn default_normalize_digits() -> u32 {
        4
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            script_extension: Self::default_script_extension(),
            normalize_digits: Self::default_normalize_digits(),
        }
    }
}

/// Where nested object directories are placed relative to their parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default = "Layout::default_sub_path")]
    pub contents_path: String,
    #[serde(default = "Layout::default_sub_path")]
    pub states_path: String,
    #[serde(default = "Layout::default_sub_path")]
    pub children_path: String,
}

impl Layout {
    fn default_sub_path() -> String {
        ".".into()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            contents_path: Self::default_sub_path(),
            states_path: Self::default_sub_path(),
            children_path: Self::default_sub_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Include {
    /// Extra include search roots, consulted after roots given on the
    /// command line.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    script_extension: Option<String>,
    include_path: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            script_extension: env::var("TTSKIT_SCRIPT_EXTENSION").ok(),
            include_path: env::var("TTSKIT_INCLUDE_PATH").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(script_extension: &str, include_path: &str) -> Self {
        Self {
            script_extension: Some(script_extension.to_owned()),
            include_path: Some(include_path.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace
    /// config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            layout: merge_layout(self.layout, other.layout),
            include: merge_include(self.include, other.include),
        }
    }

    /// Include roots as paths, in configured order.
    pub fn include_roots(&self) -> Vec<PathBuf> {
        self.include.paths.iter().map(PathBuf::from).collect()
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        script_extension: if overlay.script_extension != Defaults::default_script_extension() {
            overlay.script_extension
        } else {
            base.script_extension
        },
        normalize_digits: if overlay.normalize_digits != Defaults::default_normalize_digits() {
            overlay.normalize_digits
        } else {
            base.normalize_digits
        },
    }
}

fn merge_layout(base: Layout, overlay: Layout) -> Layout {
    Layout {
        contents_path: choose_sub_path(base.contents_path, overlay.contents_path),
        states_path: choose_sub_path(base.states_path, overlay.states_path),
        children_path: choose_sub_path(base.children_path, overlay.children_path),
    }
}

fn choose_sub_path(base: String, overlay: String) -> String {
    if overlay != Layout::default_sub_path() {
        overlay
    } else {
        base
    }
}

fn merge_include(base: Include, overlay: Include) -> Include {
    // Order matters for include precedence: overlay roots are consulted
    // before the base ones, duplicates dropped.
    let mut paths = overlay.paths;
    for path in base.paths {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Include { paths }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("ttskit/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    Ok(Some(cwd.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(script_extension) = env.script_extension {
        config.defaults.script_extension = script_extension;
    }
    if let Some(include_path) = env.include_path {
        config.include.paths.insert(0, include_path);
    }
    config
}
