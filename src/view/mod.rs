//! Row building and materialization

pub mod diff;
pub mod plain;

pub use diff::{DiffBuilder, DiffRow, RenderContext};
pub use plain::render_rows;
