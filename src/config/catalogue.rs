//! Immutable registry of configuration templates and parameter sets.
//!
//! The catalogue maps a base-config key to template text and a
//! parameter-set key to an opaque parameter blob, with `(class, id)`
//! classification tables on top. It is populated once at process start
//! (built-ins, optionally extended from a TOML manifest) and read-only
//! afterwards, so concurrent lookups need no locking.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::builtin;

/// Errors raised while assembling the catalogue.
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// Error reading a manifest file
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing manifest TOML
    #[error("failed to parse manifest TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two entries registered under the same key
    #[error("duplicate catalogue entry: {key}")]
    Duplicate { key: Uuid },

    /// Two bindings registered for the same class/id pair
    #[error("duplicate binding for class {class}, id {id}")]
    DuplicateBinding { class: u16, id: u16 },

    /// A binding references a key with no registered entry
    #[error("binding for class {class}, id {id} references unknown key {key}")]
    UnknownKey { class: u16, id: u16, key: Uuid },
}

/// A `(class, id)` pair resolved to its catalogue keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub class: u16,
    pub id: u16,
    pub base: Uuid,
    pub parameters: Uuid,
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    templates: Vec<ManifestTemplate>,
    #[serde(default)]
    parameters: Vec<ManifestParameters>,
    #[serde(default)]
    bindings: Vec<ManifestBinding>,
}

#[derive(Deserialize)]
struct ManifestTemplate {
    key: Uuid,
    text: String,
}

#[derive(Deserialize)]
struct ManifestParameters {
    key: Uuid,
    values: String,
}

#[derive(Deserialize)]
struct ManifestBinding {
    class: u16,
    id: u16,
    base: Uuid,
    parameters: Uuid,
}

/// The template store.
#[derive(Debug, Default)]
pub struct Catalogue {
    bases: HashMap<Uuid, String>,
    parameters: HashMap<Uuid, String>,
    base_bindings: HashMap<(u16, u16), Uuid>,
    parameter_bindings: HashMap<(u16, u16), Uuid>,
}

impl Catalogue {
    /// An empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalogue with the bundled entries: class 0, id 0 is the S2013
    /// adult patient on the built-in base template.
    pub fn builtin() -> Self {
        let mut catalogue = Self::new();
        catalogue
            .bases
            .insert(builtin::BASE_S2013, builtin::BASE_S2013_TEMPLATE.to_string());
        catalogue.parameters.insert(
            builtin::PARAMS_S2013_ADULT_1,
            builtin::PARAMS_S2013_ADULT_1_TEXT.to_string(),
        );
        catalogue.base_bindings.insert((0, 0), builtin::BASE_S2013);
        catalogue
            .parameter_bindings
            .insert((0, 0), builtin::PARAMS_S2013_ADULT_1);
        catalogue
    }

    /// Base-config key for a classification pair.
    pub fn base_key(&self, class: u16, id: u16) -> Option<Uuid> {
        self.base_bindings.get(&(class, id)).copied()
    }

    /// Parameter-set key for a classification pair.
    pub fn parameter_key(&self, class: u16, id: u16) -> Option<Uuid> {
        self.parameter_bindings.get(&(class, id)).copied()
    }

    /// Template text registered under `key`.
    pub fn base(&self, key: Uuid) -> Option<&str> {
        self.bases.get(&key).map(|s| s.as_str())
    }

    /// Parameter blob registered under `key`.
    pub fn parameters(&self, key: Uuid) -> Option<&str> {
        self.parameters.get(&key).map(|s| s.as_str())
    }

    /// All known classification bindings, ordered by `(class, id)`.
    pub fn bindings(&self) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self
            .base_bindings
            .iter()
            .filter_map(|(&(class, id), &base)| {
                let parameters = self.parameter_key(class, id)?;
                Some(Binding {
                    class,
                    id,
                    base,
                    parameters,
                })
            })
            .collect();
        bindings.sort_by_key(|b| (b.class, b.id));
        bindings
    }

    /// Extend the catalogue from a TOML manifest file before freezing it.
    pub fn load_manifest(&mut self, path: &Path) -> Result<(), CatalogueError> {
        let content = std::fs::read_to_string(path)?;
        self.apply_manifest(&content)
    }

    /// Extend the catalogue from manifest text.
    pub fn apply_manifest(&mut self, content: &str) -> Result<(), CatalogueError> {
        let manifest: Manifest = toml::from_str(content)?;

        for template in manifest.templates {
            if self.bases.contains_key(&template.key) {
                return Err(CatalogueError::Duplicate { key: template.key });
            }
            self.bases.insert(template.key, template.text);
        }

        for parameters in manifest.parameters {
            if self.parameters.contains_key(&parameters.key) {
                return Err(CatalogueError::Duplicate {
                    key: parameters.key,
                });
            }
            self.parameters.insert(parameters.key, parameters.values);
        }

        for binding in manifest.bindings {
            let pair = (binding.class, binding.id);
            if self.base_bindings.contains_key(&pair) {
                return Err(CatalogueError::DuplicateBinding {
                    class: binding.class,
                    id: binding.id,
                });
            }
            if !self.bases.contains_key(&binding.base) {
                return Err(CatalogueError::UnknownKey {
                    class: binding.class,
                    id: binding.id,
                    key: binding.base,
                });
            }
            if !self.parameters.contains_key(&binding.parameters) {
                return Err(CatalogueError::UnknownKey {
                    class: binding.class,
                    id: binding.id,
                    key: binding.parameters,
                });
            }
            self.base_bindings.insert(pair, binding.base);
            self.parameter_bindings.insert(pair, binding.parameters);
            debug!(class = binding.class, id = binding.id, "manifest binding registered");
        }

        Ok(())
    }
}
