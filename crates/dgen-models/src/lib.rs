//! Data model for the draft generator.
//!
//! This crate provides:
//! - Serde types for project, track and segment descriptions
//! - Schema validation of raw JSON input
//! - Timeline assembly into a [`Project`] ready for persistence
//!
//! Everything here is pure: no filesystem or network access.

pub mod error;
pub mod kinds;
pub mod media;
pub mod project;
pub mod segment;
pub mod time;
pub mod timeline;
pub mod validation;

// Re-export common types
pub use error::{AssemblyError, AssemblyResult, ValidationError, ValidationReason, ValidationResult};
pub use kinds::{SegmentKind, TrackKind};
pub use media::{MediaKind, MediaResource};
pub use project::{input_schema, DraftDocument, DraftEntry, ProjectDescription, ProjectHeader, TrackDescription};
pub use segment::{
    Animation, AnimationKind, AudioPayload, Crop, EffectPayload, Fade, FilterPayload, FilterRef, ImagePayload,
    Keyframe, KeyframeProperty, SegmentDescription, SegmentPayload, StickerPayload, TextAlign, TextPayload,
    TextStyle, Transform, Transition, VideoPayload,
};
pub use time::TimeRange;
pub use timeline::{assemble, AssembledSegment, AssembledTrack, Project, SegmentId, SegmentView};
pub use validation::{validate, validate_document, validate_value};
