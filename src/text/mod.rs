// Text normalization: the cleaning transform that feeds the classifier.
//
// Everything in here is pure: no I/O, no shared mutable state. The stop word
// set and compiled patterns are built once and only read afterwards.

pub mod lemma;
pub mod normalize;

pub use normalize::normalize;
