pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod query;
pub mod registry;
pub mod schema;

use crate::error::Result;

pub use compiler::timeseries::period_boundaries;
pub use compiler::{CompiledQuery, SqlCompiler, TimeDimensionGranularity};
pub use config::StrataConfig;
pub use dialect::{dialect_for, Dialect};
pub use error::StrataError;
pub use query::{Granularity, Query};
pub use registry::CubeRegistry;
pub use schema::Cube;

/// Compile `query` for a registered dialect with default configuration.
pub fn compile(
    registry: &CubeRegistry,
    query: &Query,
    dialect_name: &str,
) -> Result<CompiledQuery> {
    SqlCompiler::default().compile(registry, query, dialect_name)
}
