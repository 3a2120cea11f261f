//! Blueprint locations.
//!
//! A blueprint URI has the form `<source>//<subfolder>`; only the subfolder is
//! parsed locally, fetching the source is left to the caller.

use crate::parse::ConfigError;
use std::path::Path;

/// The local subfolder named by a blueprint URI.
pub fn blueprint_folder(uri: &str) -> Result<String, ConfigError> {
    let parts: Vec<&str> = uri.split("//").collect();
    match parts.as_slice() {
        [_, folder] => Ok((*folder).to_owned()),
        _ => Err(ConfigError::InvalidBlueprintUri(uri.to_owned())),
    }
}

/// True for `/...` or `./...` paths that exist on disk.
pub fn is_local_folder(path: &str) -> bool {
    (path.starts_with('/') || path.starts_with("./")) && Path::new(path).exists()
}
