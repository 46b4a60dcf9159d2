//! Beat-aware automatic DJ mix engine.
//!
//! Pipeline: per-track analysis (tempo, beat grid, key, structure) feeds a
//! mix planner (ordering + transition design), whose plan a PCM canvas
//! renderer turns into one encoded mix plus a timeline sidecar. All codec
//! work runs through an external tool; everything else is native.

/// Per-track decoding and feature analysis, with a content-addressed cache.
pub mod analysis;
/// Application directory resolution.
pub mod app_dirs;
/// Adapter over the external codec process.
pub mod ffmpeg;
/// Tracing subscriber setup.
pub mod logging;
/// Ordering, transition candidates, and scenario selection.
pub mod plan;
/// PCM canvas rendering and the audition clip path.
pub mod render;
/// Play bounds and the two-pass fade envelope.
pub mod timeline;
/// User preference weights.
pub mod weights;
