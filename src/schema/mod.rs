//! Authored and derived data shapes. No behaviour beyond loading lives here.

pub mod action;
pub mod content;
pub mod legacy;
pub mod logic;
pub mod predicate;
pub mod scenario;

use ron::extensions::Extensions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid content: {0}")]
    Invalid(String),
}

/// RON options shared by every content loader.
///
/// `implicit_some` lets authors write `next_scene_id: "b"` instead of
/// `next_scene_id: Some("b")`.
pub(crate) fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME)
}
