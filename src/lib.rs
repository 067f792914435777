// toxwatch: toxicity detection for Reddit users and text datasets.
//
// This is the library root. Each module corresponds to one subsystem:
// text normalization feeds the classifier, the classifier feeds per-user
// analysis and batch scoring, and the monitor drives analysis from an inbox.

pub mod analysis;
pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod monitor;
pub mod output;
pub mod platform;
pub mod text;
pub mod toxicity;

#[cfg(feature = "web")]
pub mod web;
