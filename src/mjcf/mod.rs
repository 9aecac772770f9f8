//! Loader for the subset of MJCF (MuJoCo XML) needed to describe
//! tree-structured mechanisms with hinge and slide joints, motors and sites.

use std::{fs, path::Path};

use parser::MjcfParser;
use tracing::info;

use crate::{error::ModelError, mechanism::Model};

mod parser;

/// Read and parse a model description file.
pub fn load_model(path: impl AsRef<Path>) -> Result<Model, ModelError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model = load_model_from_str(&xml)?;
    info!(
        path = %path.display(),
        model = %model.name,
        bodies = model.bodies.len() - 1,
        nq = model.nq(),
        nu = model.nu(),
        "loaded model"
    );
    Ok(model)
}

/// Parse a model description held in memory.
pub fn load_model_from_str(xml: &str) -> Result<Model, ModelError> {
    MjcfParser::new(xml).parse()
}
