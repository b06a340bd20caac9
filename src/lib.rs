//! Maximum-entropy sequence tagger: feature templates over a context window,
//! support-thresholded feature indexing, improved iterative scaling and exact
//! windowed Viterbi decoding.

pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod maxent;
pub mod quark;

pub use dataset::{Dataset, TaggedSentence};
pub use error::{Error, Result};
pub use evaluation::{Estimation, Evaluation};
pub use maxent::{Model, Scoring, TaggerConfig, Tagger, Tagging, Trainer, TrainingReport};
