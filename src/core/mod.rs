pub mod actions;
pub mod audit;
pub mod condition;
pub mod config;
pub mod dice;
pub mod localization;
pub mod registry;
pub mod runtime;
pub mod traversal;
