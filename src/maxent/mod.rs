pub mod config;
pub mod dict;
pub mod extractor;
pub mod extractors;
pub mod history;
pub mod indexer;
pub mod lambda_solve;
pub mod model;
pub mod tagger;
pub mod tags;
pub mod trainer;
pub mod viterbi;

pub use config::{Scoring, SupportFilter, TaggerConfig};
pub use dict::{Dictionary, TagDictionary};
pub use extractor::{Architecture, Extractor};
pub use extractors::ExtractorSet;
pub use model::Model;
pub use tagger::{Tagger, Tagging};
pub use tags::TagInventory;
pub use trainer::{Trainer, TrainingReport};
