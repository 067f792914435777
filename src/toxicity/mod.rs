// Toxicity scoring: the oracle trait, its backends, and the classifier
// that turns oracle output into labels.
//
// The ToxicityScorer trait is the swap point. OnnxToxicityScorer runs a
// local model (fetched by `download`); KeywordScorer is the no-model
// fallback. Everything above this module only sees ToxicityClassifier.

pub mod classifier;
pub mod download;
pub mod keyword;
pub mod onnx;
pub mod traits;

pub use classifier::{Classification, Label, ToxicityClassifier};
