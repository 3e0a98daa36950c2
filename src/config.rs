use crate::actions::ActionSpec;
use crate::consts::DEFAULT_TIMEOUT_MS;
use crate::error::ConfigError;
use crate::layouts::Layout;
use crate::tapcode::TapCode;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub(crate) fn config() -> Result<Config> {
    let config_path = match env::args().nth(1) {
        Some(arg_path) => PathBuf::from(arg_path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tapkeys")
            .join("config.yml"),
    };

    let config = if !config_path.exists() {
        let config = Config::default();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, serialize(&config_path, &config)?)?;
        info!("Default config written to {}", config_path.display());
        config
    } else {
        let config_content = fs::read_to_string(&config_path)?;
        deserialize(&config_path, &config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?
    };

    debug!("Config: {:#?}", config);

    Ok(config)
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

fn serialize(path: &Path, config: &Config) -> Result<String> {
    if is_toml(path) {
        Ok(toml::to_string_pretty(config)?)
    } else {
        Ok(serde_yaml::to_string(config)?)
    }
}

fn deserialize(path: &Path, content: &str) -> Result<Config> {
    if is_toml(path) {
        Ok(toml::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_no_emit() -> bool {
    false
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub globals: Globals,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Globals {
    /// Disambiguation window in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_no_emit")]
    pub no_emit: bool,
    #[serde(default)]
    pub layout: Layout,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            no_emit: default_no_emit(),
            layout: Layout::default(),
        }
    }
}

impl Globals {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub transparent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map: Vec<MapEntryConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enter: Vec<ActionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    Single,
    Double,
    Triple,
}

impl Arity {
    fn as_str(self) -> &'static str {
        match self {
            Arity::Single => "single",
            Arity::Double => "double",
            Arity::Triple => "triple",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEntryConfig {
    pub code: TapCode,
    #[serde(rename = "type")]
    pub arity: Arity,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl TryFrom<&ActionConfig> for ActionSpec {
    type Error = ConfigError;

    fn try_from(action: &ActionConfig) -> Result<Self, Self::Error> {
        let field = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or_else(|| ConfigError::MissingField {
                kind: action.kind.clone(),
                field: name,
            })
        };

        match action.kind.to_ascii_lowercase().as_str() {
            "press" => Ok(ActionSpec::Press(field(&action.key, "key")?.parse()?)),
            "pushlayer" => Ok(ActionSpec::PushLayer(field(&action.layer, "layer")?)),
            "poplayer" => Ok(ActionSpec::PopLayer),
            "toplayer" => Ok(ActionSpec::TopLayer(field(&action.layer, "layer")?)),
            _ => Err(ConfigError::UnknownActionType(action.kind.clone())),
        }
    }
}

/// Action lists per arity for one tap code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pub single: Option<Vec<ActionSpec>>,
    pub double: Option<Vec<ActionSpec>>,
    pub triple: Option<Vec<ActionSpec>>,
}

impl Bindings {
    fn slot(&mut self, arity: Arity) -> &mut Option<Vec<ActionSpec>> {
        match arity {
            Arity::Single => &mut self.single,
            Arity::Double => &mut self.double,
            Arity::Triple => &mut self.triple,
        }
    }
}

/// A layer with `extends` applied and every action validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayer {
    pub name: String,
    pub default: bool,
    pub transparent: bool,
    pub bindings: BTreeMap<TapCode, Bindings>,
    pub enter: Vec<ActionSpec>,
    pub exit: Vec<ActionSpec>,
}

impl Config {
    /// Validates the document and flattens `extends` chains, keeping the
    /// configured layer order.
    pub fn resolve(&self) -> Result<Vec<ResolvedLayer>, ConfigError> {
        if self.globals.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let mut by_name = HashMap::new();
        for layer in &self.layers {
            if by_name.insert(layer.name.as_str(), layer).is_some() {
                return Err(ConfigError::DuplicateLayer(layer.name.clone()));
            }
        }

        let mut resolved = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let bindings = resolve_bindings(layer, &by_name, &mut HashSet::new())?;
            resolved.push(ResolvedLayer {
                name: layer.name.clone(),
                default: layer.default,
                transparent: layer.transparent,
                bindings,
                enter: compile_specs(&layer.enter)?,
                exit: compile_specs(&layer.exit)?,
            });
        }

        if !resolved.iter().any(|layer| layer.default) {
            return Err(ConfigError::NoDefaultLayer);
        }

        warn_unknown_targets(&resolved, &by_name);

        Ok(resolved)
    }
}

fn resolve_bindings<'a>(
    layer: &'a LayerConfig,
    by_name: &HashMap<&str, &'a LayerConfig>,
    visiting: &mut HashSet<&'a str>,
) -> Result<BTreeMap<TapCode, Bindings>, ConfigError> {
    if !visiting.insert(layer.name.as_str()) {
        return Err(ConfigError::ExtendsCycle(layer.name.clone()));
    }

    let mut bindings = match &layer.extends {
        Some(base) => {
            let base_layer =
                by_name
                    .get(base.as_str())
                    .ok_or_else(|| ConfigError::UnknownBaseLayer {
                        layer: layer.name.clone(),
                        base: base.clone(),
                    })?;
            resolve_bindings(base_layer, by_name, visiting)?
        }
        None => BTreeMap::new(),
    };

    let mut seen = HashSet::new();
    for entry in &layer.map {
        if !seen.insert((entry.code, entry.arity)) {
            return Err(ConfigError::DuplicateBinding {
                layer: layer.name.clone(),
                code: entry.code.value(),
                arity: entry.arity.as_str(),
            });
        }
        *bindings.entry(entry.code).or_default().slot(entry.arity) =
            Some(compile_specs(&entry.actions)?);
    }

    Ok(bindings)
}

fn compile_specs(actions: &[ActionConfig]) -> Result<Vec<ActionSpec>, ConfigError> {
    actions.iter().map(ActionSpec::try_from).collect()
}

fn warn_unknown_targets(layers: &[ResolvedLayer], known: &HashMap<&str, &LayerConfig>) {
    for layer in layers {
        let specs = layer
            .bindings
            .values()
            .flat_map(|b| [&b.single, &b.double, &b.triple])
            .flatten()
            .flatten()
            .chain(&layer.enter)
            .chain(&layer.exit);

        for spec in specs {
            if let ActionSpec::PushLayer(target) | ActionSpec::TopLayer(target) = spec
                && !known.contains_key(target.as_str())
            {
                warn!(
                    "Layer `{}` refers to unknown layer `{target}`, the action will do nothing",
                    layer.name
                );
            }
        }
    }
}

fn press(code: u8, arity: Arity, key: &str) -> MapEntryConfig {
    MapEntryConfig {
        code: TapCode::from_bits(code),
        arity,
        actions: vec![ActionConfig {
            kind: "press".into(),
            key: Some(key.into()),
            layer: None,
        }],
    }
}

fn layer_action(kind: &str, layer: Option<&str>) -> ActionConfig {
    ActionConfig {
        kind: kind.into(),
        key: None,
        layer: layer.map(Into::into),
    }
}

fn default_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig {
            name: "base".into(),
            default: true,
            map: vec![
                press(1, Arity::Single, "a"),
                press(2, Arity::Single, "e"),
                press(4, Arity::Single, "i"),
                press(8, Arity::Single, "o"),
                press(16, Arity::Single, "u"),
                press(31, Arity::Single, "space"),
                press(31, Arity::Double, "enter"),
                press(3, Arity::Single, "backspace"),
                press(3, Arity::Triple, "ctrl+backspace"),
                MapEntryConfig {
                    code: TapCode::from_bits(30),
                    arity: Arity::Double,
                    actions: vec![layer_action("pushlayer", Some("navigation"))],
                },
            ],
            ..Default::default()
        },
        LayerConfig {
            name: "navigation".into(),
            transparent: true,
            map: vec![
                press(2, Arity::Single, "up"),
                press(4, Arity::Single, "down"),
                press(8, Arity::Single, "left"),
                press(16, Arity::Single, "right"),
                MapEntryConfig {
                    code: TapCode::from_bits(30),
                    arity: Arity::Double,
                    actions: vec![layer_action("poplayer", None)],
                },
            ],
            ..Default::default()
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            globals: Globals::default(),
            layers: default_layers(),
        }
    }
}
