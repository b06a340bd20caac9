use std::{fs::File, io::BufReader, path::Path};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

bitflags! {
    /// Filters narrowing the training examples that count toward a feature's support.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "u32", into = "u32")]
    pub struct SupportFilter: u32 {
        /// Drop examples whose word was never seen with the feature's tag.
        const OCCURRING_TAGS_ONLY = 0b01;
        /// Drop examples whose word cannot take the feature's tag, after tag expansion.
        const POSSIBLE_TAGS_ONLY = 0b10;
    }
}

impl From<u32> for SupportFilter {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<SupportFilter> for u32 {
    fn from(filter: SupportFilter) -> Self {
        filter.bits()
    }
}

impl Default for SupportFilter {
    fn default() -> Self {
        Self::empty()
    }
}

/// How the decoder scores the candidate tags of a position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Scoring {
    /// Score every tag and normalize over the whole inventory.
    #[default]
    Exact,
    /// Score only the candidate tags; each excluded tag contributes `default_score`
    /// to the normalizer.
    Approximate { default_score: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    pub arch: String,
    pub rare_word_thresh: usize,
    pub cur_word_min_feature_thresh: usize,
    pub min_feature_thresh: usize,
    pub rare_word_min_feature_thresh: usize,
    pub min_words_lock_tags: usize,
    /// `count >= min_words_lock_tags` locks a word to its dictionary tags when set,
    /// `count > min_words_lock_tags` otherwise.
    pub lock_tags_inclusive: bool,
    pub all_tags: bool,
    pub support_filter: SupportFilter,
    pub open_class_tags: Vec<String>,
    pub closed_class_tags: Vec<String>,
    pub learn_closed_class_tags: bool,
    pub closed_class_tag_threshold: usize,
    pub tag_equivalences: Vec<Vec<String>>,
    pub iterations: usize,
    pub epsilon: f64,
    pub lambda_bound: f64,
    pub tolerance: f64,
    pub scoring: Scoring,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            arch: "left3words,naacl2003unknowns".to_string(),
            rare_word_thresh: 5,
            cur_word_min_feature_thresh: 2,
            min_feature_thresh: 5,
            rare_word_min_feature_thresh: 10,
            min_words_lock_tags: 1,
            lock_tags_inclusive: true,
            all_tags: false,
            support_filter: SupportFilter::empty(),
            open_class_tags: Vec::new(),
            closed_class_tags: Vec::new(),
            learn_closed_class_tags: false,
            closed_class_tag_threshold: 40,
            tag_equivalences: Vec::new(),
            iterations: 100,
            epsilon: 1e-4,
            lambda_bound: 200.0,
            tolerance: 1e-3,
            scoring: Scoring::Exact,
        }
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_parameter(name, value))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl TaggerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets one parameter from its string form, as given on the command line.
    ///
    /// The configuration is left unchanged when the result would not validate.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        next.assign(name, value)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn assign(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "arch" => self.arch = value.to_string(),
            "rare_word_thresh" => self.rare_word_thresh = parse(name, value)?,
            "cur_word_min_feature_thresh" => self.cur_word_min_feature_thresh = parse(name, value)?,
            "min_feature_thresh" => self.min_feature_thresh = parse(name, value)?,
            "rare_word_min_feature_thresh" => self.rare_word_min_feature_thresh = parse(name, value)?,
            "min_words_lock_tags" => self.min_words_lock_tags = parse(name, value)?,
            "lock_tags_inclusive" => self.lock_tags_inclusive = parse(name, value)?,
            "all_tags" => self.all_tags = parse(name, value)?,
            "occurring_tags_only" => {
                let on: bool = parse(name, value)?;
                self.support_filter.set(SupportFilter::OCCURRING_TAGS_ONLY, on);
            }
            "possible_tags_only" => {
                let on: bool = parse(name, value)?;
                self.support_filter.set(SupportFilter::POSSIBLE_TAGS_ONLY, on);
            }
            "open_class_tags" => self.open_class_tags = parse_list(value),
            "closed_class_tags" => self.closed_class_tags = parse_list(value),
            "learn_closed_class_tags" => self.learn_closed_class_tags = parse(name, value)?,
            "closed_class_tag_threshold" => self.closed_class_tag_threshold = parse(name, value)?,
            "tag_equivalences" => {
                self.tag_equivalences = value
                    .split(';')
                    .map(parse_list)
                    .filter(|group| group.len() > 1)
                    .collect()
            }
            "iterations" => self.iterations = parse(name, value)?,
            "epsilon" => self.epsilon = parse(name, value)?,
            "lambda_bound" => self.lambda_bound = parse(name, value)?,
            "tolerance" => self.tolerance = parse(name, value)?,
            "default_score" => {
                let score: f64 = parse(name, value)?;
                self.scoring = if score > 0.0 {
                    Scoring::Approximate { default_score: score }
                } else {
                    Scoring::Exact
                };
            }
            _ => return Err(Error::invalid_parameter(name, value)),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.open_class_tags.is_empty() && !self.closed_class_tags.is_empty() {
            return Err(Error::config(
                "open_class_tags and closed_class_tags are mutually exclusive",
            ));
        }
        if !(self.epsilon > 0.0) {
            return Err(Error::invalid_parameter("epsilon", &self.epsilon.to_string()));
        }
        if !(self.lambda_bound > 0.0) {
            return Err(Error::invalid_parameter(
                "lambda_bound",
                &self.lambda_bound.to_string(),
            ));
        }
        if let Scoring::Approximate { default_score } = self.scoring {
            if !(default_score > 0.0) || !default_score.is_finite() {
                return Err(Error::invalid_parameter(
                    "default_score",
                    &default_score.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether a word seen `count` times is restricted to its dictionary tags.
    pub fn locks_tags(&self, count: usize) -> bool {
        if count == 0 {
            return false;
        }
        if self.lock_tags_inclusive {
            count >= self.min_words_lock_tags
        } else {
            count > self.min_words_lock_tags
        }
    }
}
