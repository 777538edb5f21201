//! Diff data model and processing

mod content;
mod group;
mod line;
mod parse;
mod processor;

pub use content::{DiffContent, DiffInfo, FileMeta, MoveDetails, MoveRange};
pub use group::{
    hide_in_context_control, DeltaKind, DiffGroup, GroupOptions, GroupType, LinePair, LineRange,
    SideRange,
};
pub use line::{DiffLine, Highlight, LineType, NewlineFlags, Side};
pub use parse::{ParsedPatch, PatchHunk, PatchLine, PatchLineKind};
pub use processor::{convert_intraline_infos, DiffProcessor, KeyLocations, ProcessTask};
