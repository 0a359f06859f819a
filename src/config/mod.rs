//! Configuration assembly: template store, directive parsing and
//! purpose-gated template expansion.

pub mod builtin;
pub mod catalogue;
pub mod compiler;
pub mod meta;

use thiserror::Error;
use uuid::Uuid;

pub use catalogue::{Binding, Catalogue, CatalogueError};
pub use compiler::{
    expand, MetaKind, MetaObserver, Purpose, TemplateContext, PLACEHOLDER_FILTER_IDX,
    PLACEHOLDER_LOG_SOURCE, PLACEHOLDER_LOG_TARGET, PLACEHOLDER_PARAMETERS, PLACEHOLDER_STEPPING,
};
pub use meta::{parse_directives, DirectiveSet};

/// Failures resolving a configuration from the catalogue.
///
/// Expansion itself never fails; only the key lookups do, and a miss is
/// reported before any template text is touched, so no partial document is
/// ever produced and no observer callback fires.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no base configuration registered for class {class}, id {id}")]
    UnknownConfig { class: u16, id: u16 },

    #[error("no parameter set registered for class {class}, id {id}")]
    UnknownParameters { class: u16, id: u16 },

    #[error("catalogue has no base entry under key {key}")]
    MissingBase { key: Uuid },

    #[error("catalogue has no parameter entry under key {key}")]
    MissingParameters { key: Uuid },
}

/// Resolve the `(class, id)` pair through the catalogue and expand the base
/// template for one purpose.
///
/// `stepping` is the model stepping interval in rat time; `input_log` and
/// `output_log` are the recorded-session paths substituted into the log
/// sections that survive the purpose gating.
#[allow(clippy::too_many_arguments)]
pub fn build_config(
    catalogue: &Catalogue,
    class: u16,
    id: u16,
    stepping: f64,
    input_log: &str,
    output_log: &str,
    purpose: Purpose,
    observer: Option<&mut dyn MetaObserver>,
) -> Result<String, ConfigError> {
    let base_key = catalogue
        .base_key(class, id)
        .ok_or(ConfigError::UnknownConfig { class, id })?;
    let parameter_key = catalogue
        .parameter_key(class, id)
        .ok_or(ConfigError::UnknownParameters { class, id })?;

    let template = catalogue
        .base(base_key)
        .ok_or(ConfigError::MissingBase { key: base_key })?;
    let parameters = catalogue
        .parameters(parameter_key)
        .ok_or(ConfigError::MissingParameters { key: parameter_key })?;

    let context = TemplateContext {
        patient_parameters: parameters,
        stepping,
        input_log,
        output_log,
    };

    Ok(expand(template, &context, purpose, observer))
}

/// Expand the fixed one-section replay template for a recorded session.
/// No purpose gating, no observer.
pub fn replay_only_config(input_log: &str) -> String {
    let context = TemplateContext {
        patient_parameters: "",
        stepping: 0.0,
        input_log,
        output_log: "",
    };
    expand(
        builtin::REPLAY_ONLY_TEMPLATE,
        &context,
        Purpose::Replay,
        None,
    )
}
