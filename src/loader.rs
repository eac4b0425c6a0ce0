//! Spec file loader.
//!
//! Loads test records from disk into a [`TestCatalog`].

use crate::catalog::TestCatalog;
use crate::schema::{TestRecord, TomlSpec};
use serde::Deserialize;
use std::path::Path;

/// Error type for spec loading operations.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Failed to read the file.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Failed to parse TOML.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    /// Unsupported file extension.
    #[error("unsupported file format: {0} (expected .yaml, .yml, or .toml)")]
    UnsupportedFormat(String),
}

/// Load a spec file into a catalog.
///
/// Load errors are logged, not returned: the catalog keeps every case added
/// before the failure.
pub fn load_catalog(path: &Path) -> TestCatalog {
    let mut catalog = TestCatalog::new();
    if let Err(e) = load_into(path, &mut catalog) {
        tracing::error!(path = %path.display(), error = %e, "failed to load spec file");
    }
    tracing::debug!(path = %path.display(), cases = catalog.len(), "loaded spec file");
    catalog
}

/// Append the records of a spec file to `catalog`, stopping at the first error.
pub fn load_into(path: &Path, catalog: &mut TestCatalog) -> Result<(), LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let contents = std::fs::read_to_string(path)?;

    match ext {
        "yaml" | "yml" => {
            for document in serde_yaml::Deserializer::from_str(&contents) {
                // Empty documents (a leading `---`, a trailing separator) carry no record.
                if let Some(record) = Option::<TestRecord>::deserialize(document)? {
                    catalog.add_record(record);
                }
            }
            Ok(())
        }
        "toml" => {
            let spec: TomlSpec = toml::from_str(&contents)?;
            spec.tests.into_iter().for_each(|r| catalog.add_record(r));
            Ok(())
        }
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}
