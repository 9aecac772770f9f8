//! Run-time settings of the demo programs.
//!
//! Every field has a default, so the programs run without any file. A TOML
//! file named by the `GORILLA_CONFIG` environment variable overrides
//! individual keys; the rest keep the defaults of the program reading it.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{types::Float, viewer::scene::VisualOptions, PI};

pub const CONFIG_ENV: &str = "GORILLA_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not encode default config: {0}")]
    Defaults(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub distance: Float,
    pub azimuth: Float,   // degrees
    pub elevation: Float, // degrees
    pub lookat: [Float; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub close_on_escape: bool,
    pub camera: CameraConfig,
    pub visual: VisualOptions,
    pub max_objects: usize, // scene capacity
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdConfig {
    /// Controlled hinge. The first joint of the model when absent.
    pub joint: Option<String>,
    pub kp: Float,
    pub kd: Float,
    pub target: Float,
    pub initial_angle: Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IkConfig {
    pub site: String,
    pub center_x: Float,
    pub center_z: Float,
    pub radius: Float,
    pub time_increment: Float, // trajectory parameter advance per tick
    pub alpha: Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendulumDemoConfig {
    pub viewer: ViewerConfig,
    pub control: PdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReachDemoConfig {
    pub model: PathBuf,
    pub viewer: ViewerConfig,
    pub control: IkConfig,
}

impl Default for PdConfig {
    fn default() -> Self {
        PdConfig {
            joint: None,
            kp: 130.,
            kd: 3.,
            target: PI,
            initial_angle: 1.,
        }
    }
}

impl Default for IkConfig {
    fn default() -> Self {
        IkConfig {
            site: "endeff".to_string(),
            center_x: 0.45,
            center_z: 1.05,
            radius: 0.12,
            time_increment: 0.01,
            alpha: 0.3,
        }
    }
}

impl Default for PendulumDemoConfig {
    fn default() -> Self {
        PendulumDemoConfig {
            viewer: ViewerConfig {
                width: 1200,
                height: 900,
                title: "Inverted Pendulum (PD Control)".to_string(),
                close_on_escape: false,
                camera: CameraConfig {
                    distance: 6.,
                    azimuth: 90.,
                    elevation: -10.,
                    lookat: [0., 0., 2.], // hinge height
                },
                visual: VisualOptions::default(),
                max_objects: 2000,
            },
            control: PdConfig::default(),
        }
    }
}

impl Default for ReachDemoConfig {
    fn default() -> Self {
        ReachDemoConfig {
            model: PathBuf::from("assets/double_pendulum.xml"),
            viewer: ViewerConfig {
                width: 1200,
                height: 900,
                title: "Jacobian IK - Small Circle".to_string(),
                close_on_escape: true,
                camera: CameraConfig {
                    distance: 5.,
                    azimuth: 90.,
                    elevation: -15.,
                    lookat: [0., 0., 1.25],
                },
                visual: VisualOptions::default(),
                max_objects: 1000,
            },
            control: IkConfig::default(),
        }
    }
}

/// Parse `text` as overrides on top of `T::default()`.
pub fn from_toml_str<T>(text: &str) -> Result<T, ConfigError>
where
    T: Default + Serialize + DeserializeOwned,
{
    let overrides: toml::Table = text.parse()?;
    let mut merged = match toml::Value::try_from(T::default())? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    merge(&mut merged, overrides);
    Ok(toml::Value::Table(merged).try_into()?)
}

pub fn load_file<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + Serialize + DeserializeOwned,
{
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = from_toml_str(&text)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Defaults, overridden by the file named in `GORILLA_CONFIG` when set.
pub fn from_env<T>() -> Result<T, ConfigError>
where
    T: Default + Serialize + DeserializeOwned,
{
    match env::var_os(CONFIG_ENV) {
        Some(path) => load_file(Path::new(&path)),
        None => Ok(T::default()),
    }
}

/// Recursively overwrite `base` with the entries of `overrides`.
fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(sub) if matches!(base.get(&key), Some(toml::Value::Table(_))) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge(existing, sub);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
