//! Declarative patch configuration: TOML schema, loader, and applicator.

mod applicator;
mod loader;
mod schema;

pub use applicator::{apply_patches, check_patches, ApplicationError, PatchResult};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    Metadata, Operation, PatchConfig, PatchDefinition, Query, ValidationError, ValidationIssue,
    Verify,
};
