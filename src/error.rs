use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a model description into a `Model`.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("could not read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed attribute of <{element}> at byte {position}: {source}")]
    Attribute {
        element: String,
        position: u64,
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    #[error("missing <mujoco> root element")]
    MissingRoot,

    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("invalid value '{value}' for attribute '{attribute}' of <{element}>")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("unknown {kind} type '{value}'")]
    UnknownType { kind: &'static str, value: String },

    #[error("actuator '{actuator}' references unknown joint '{joint}'")]
    UnknownJoint { actuator: String, joint: String },

    #[error("joint '{0}' cannot be attached to the world body")]
    WorldJoint(String),

    #[error("body '{0}' has joints but no mass")]
    MasslessBody(String),

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
}

/// Failure to wire a controller to a loaded model.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("site '{0}' not found in model")]
    MissingSite(String),

    #[error("actuator for joint '{0}' not found in model")]
    MissingActuator(String),

    #[error("joint '{0}' not found in model")]
    MissingJoint(String),
}

#[cfg(test)]
mod error_tests {
    use crate::{
        config::{self, PendulumDemoConfig},
        mjcf::load_model_from_str,
    };

    use super::*;

    fn load_both(xml: &str, toml: &str) -> Result<(), SetupError> {
        let _: PendulumDemoConfig = config::from_toml_str(toml)?;
        load_model_from_str(xml)?;
        Ok(())
    }

    #[test]
    fn setup_wraps_model_and_config_failures() {
        // Arrange
        let xml = "<mujoco><worldbody><body><geom size=\"1\"/></body></worldbody></mujoco>";

        // Act
        let bad_model = load_both("<robot/>", "");
        let bad_config = load_both(xml, "[control]\nki = 1.0");

        // Assert
        assert!(load_both(xml, "").is_ok());
        let err = bad_model.unwrap_err();
        assert!(matches!(err, SetupError::Model(ModelError::MissingRoot)));
        assert_eq!(err.to_string(), "missing <mujoco> root element");
        assert!(matches!(bad_config, Err(SetupError::Config(_))));
    }
}
