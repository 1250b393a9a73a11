//! Core library of the mania toolkit.
//!
//! Reads and writes osu!mania charts and provides the two chart
//! transformations: key-count conversion ([`KeyRemapper`]) and tap/hold
//! density changes ([`HoldNoteTransformer`]). Both draw from a seeded
//! [`RandomSequencer`] so a run can be reproduced from its seed phrase.

pub mod batch;
pub mod beatmap;
pub mod codec;
pub mod config;
pub mod error;
pub mod holds;
pub mod layout;
pub mod random;
pub mod rating;
pub mod remap;
pub mod timing;

pub use batch::{BatchOptions, BatchReport, FileOutcome, FileStatus, Job, Progress};
pub use beatmap::{
    Beatmap, ChartSummary, Colour, Difficulty, General, HitObject, Metadata, TimingPoint,
};
pub use config::{BlendProfile, HoldNoteParams, KeyRemapParams, ToolkitConfig};
pub use error::{Result, ToolkitError};
pub use holds::{HoldNoteTransformer, HoldOutcome};
pub use layout::ColumnLayout;
pub use random::{RandomSequencer, Seed};
pub use rating::StarRatingEstimator;
pub use remap::KeyRemapper;
pub use timing::TimingIndex;
