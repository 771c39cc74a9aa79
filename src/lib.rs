//! Scenario Engine: composition and traversal of branching, localized dialogue.
//!
//! A scenario is authored twice: once as a language-neutral logic graph
//! (scenes, choices, conditions, actions) and once per language as a content
//! pack of display text. The engine merges the two into a playable scenario,
//! then walks the player through it one scene at a time, gating choices on
//! player state, resolving skill checks and applying world mutations.

pub mod core;
pub mod schema;
