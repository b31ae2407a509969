pub mod loader;
pub mod schema;

pub use loader::{ConfigError, load_line_definition};
pub use schema::{LineDefinition, PartBatch, RunSpec, StageKindSpec, StageSpec};
