//! crit-diff - diff line model and row layout for code review
//!
//! Server diff chunks are processed into groups of lines, collapsed around
//! the changes, and laid out as side-by-side or unified rows with comment
//! threads and annotation layers attached. Rendering is incremental so a
//! host can interleave it with input handling.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod annotation;
pub mod config;
pub mod diff;
pub mod error;
pub mod layout;
pub mod model;
pub mod render;
pub mod syntax;
pub mod text;
pub mod view;

pub use annotation::{AnnotationLayer, Annotations, LayerRegistry};
pub use config::{CritDiffConfig, DiffPreferences, RenderPreferences};
pub use diff::{DiffGroup, DiffInfo, DiffLine, DiffProcessor, GroupType, LineType, Side};
pub use error::DiffError;
pub use model::{DiffViewMode, ViewModeState};
pub use render::{DiffRenderer, ExpandOutcome, RenderPass, StepOutcome};
pub use syntax::Highlighter;
pub use view::{DiffBuilder, DiffRow, RenderContext};
