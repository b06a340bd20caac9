use std::time::Instant;

use crate::{
    error::{Error, Result},
    quark::{Quark, TextVectorizer},
};

use super::{
    config::TaggerConfig,
    dict::Dictionary,
    extractor::Architecture,
    extractors::ExtractorSet,
    indexer::{FeatureIndexer, IndexStats, IndexedCorpus, TrainingCorpus},
    lambda_solve::{CorrectnessCheck, LambdaSolve, SolverParams, SolverReport},
    model::Model,
    tags::TagInventory,
};

/// Diagnostics of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub stats: IndexStats,
    pub solver: SolverReport,
    pub check: CorrectnessCheck,
    /// Zero-weight features removed from the final model.
    pub dropped_features: usize,
}

impl TrainingReport {
    pub fn is_suspect(&self) -> bool {
        self.solver.is_suspect() || !self.check.passed()
    }
}

/// Collects tagged sentences and trains a [`Model`] from them.
#[derive(Debug, Default)]
pub struct Trainer {
    config: TaggerConfig,
    corpus: TrainingCorpus,
}

/// Training-side structures derived from the corpus before featurization.
struct Prepared {
    dict: Dictionary,
    tags: TagInventory,
    general: ExtractorSet,
    rare: ExtractorSet,
}

impl Trainer {
    pub fn new(config: TaggerConfig) -> Self {
        Self {
            config,
            corpus: TrainingCorpus::new(),
        }
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    /// Sets a configuration parameter by name, as in `-p name=value`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.config.set(name, value)
    }

    pub fn append<S: AsRef<str>, T: AsRef<str>>(&mut self, words: &[S], tags: &[T]) -> Result<()> {
        self.corpus.push_sentence(words, tags)
    }

    pub fn clear(&mut self) {
        self.corpus = TrainingCorpus::new();
    }

    pub fn num_sentences(&self) -> usize {
        self.corpus.num_sentences()
    }

    fn prepare(&self) -> Result<Prepared> {
        if self.corpus.is_empty() {
            return Err(Error::EmptyDataset);
        }
        self.config.validate()?;

        let pairs = self.corpus.pairs();
        let mut dict = Dictionary::new(self.config.rare_word_thresh);
        let mut names = Quark::default();
        for i in 0..pairs.len() {
            dict.add(pairs.word(i), pairs.tag(i));
            names.find_or_insert(pairs.tag(i));
        }
        let tags = TagInventory::build(names, &dict, &self.config)?;
        let arch = Architecture::parse(&self.config.arch, &tags)?;
        let general = ExtractorSet::new(arch.general)?;
        let rare = ExtractorSet::new(arch.rare)?;
        log::info!(
            "{} sentences, {} word types, {} tags, {} general and {} rare extractors",
            self.corpus.num_sentences(),
            dict.len(),
            tags.len(),
            general.len(),
            rare.len()
        );
        Ok(Prepared {
            dict,
            tags,
            general,
            rare,
        })
    }

    fn featurize(&self, prepared: &Prepared) -> Result<IndexedCorpus> {
        FeatureIndexer {
            config: &self.config,
            dict: &prepared.dict,
            tags: &prepared.tags,
            general: &prepared.general,
            rare: &prepared.rare,
        }
        .index(&self.corpus)
    }

    /// Runs featurization only.
    pub fn index(&self) -> Result<IndexedCorpus> {
        let prepared = self.prepare()?;
        self.featurize(&prepared)
    }

    pub fn train(&self) -> Result<Model> {
        self.train_with_report().map(|(model, _)| model)
    }

    pub fn train_with_report(&self) -> Result<(Model, TrainingReport)> {
        let begin = Instant::now();
        let prepared = self.prepare()?;
        let indexed = self.featurize(&prepared)?;

        let solver = LambdaSolve::new(&indexed.problem, SolverParams::from(&self.config));
        let (lambda, solver_report, check) = solver.solve();

        let Prepared {
            dict,
            tags,
            general,
            rare,
        } = prepared;
        let mut model = Model::new(
            self.config.clone(),
            tags,
            dict,
            general,
            rare,
            indexed.table,
            lambda,
        )?;
        let dropped_features = model.simplify();
        log::info!(
            "trained {} features in {:?}",
            model.num_features(),
            begin.elapsed()
        );
        let report = TrainingReport {
            stats: indexed.stats,
            solver: solver_report,
            check,
            dropped_features,
        };
        if report.is_suspect() {
            log::warn!("training run is suspect, see the training report");
        }
        Ok((model, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainer() -> Trainer {
        let mut config = TaggerConfig::default();
        config.arch = "words(-1,1),order(1)".to_string();
        config.cur_word_min_feature_thresh = 0;
        config.min_feature_thresh = 0;
        config.rare_word_min_feature_thresh = 0;
        let mut t = Trainer::new(config);
        t.append(&["the", "dog", "runs"], &["DT", "NN", "VBZ"]).unwrap();
        t.append(&["a", "cat", "sleeps"], &["DT", "NN", "VBZ"]).unwrap();
        t
    }

    #[test]
    fn empty_corpus() {
        let t = Trainer::new(TaggerConfig::default());
        assert!(matches!(t.train(), Err(Error::EmptyDataset)));
    }

    #[test]
    fn length_mismatch() {
        let mut t = Trainer::default();
        assert!(matches!(
            t.append(&["a", "b"], &["DT"]),
            Err(Error::LengthMismatch { words: 2, tags: 1 })
        ));
        assert_eq!(t.num_sentences(), 0);
    }

    #[test]
    fn bad_parameter_is_rejected() {
        let mut t = trainer();
        assert!(matches!(
            t.set("epsilon", "-1"),
            Err(Error::InvalidParameter { .. })
        ));
        t.set("iterations", "20").unwrap();
        assert_eq!(t.config().iterations, 20);
    }

    #[test]
    fn trains_consistent_model() {
        let (model, report) = trainer().train_with_report().unwrap();
        assert_eq!(model.tags().len(), 4);
        assert_eq!(model.windows(), (1, 0));
        assert!(report.stats.features > 0);
        assert!(report.check.unnormalized_rows.is_empty(), "{report:?}");
        assert!(report.solver.log_likelihood > 0.25f64.ln());
        assert!(model.num_features() <= report.stats.features);
        model.validate().unwrap();
    }

    #[test]
    fn index_reports_stats() {
        let indexed = trainer().index().unwrap();
        assert_eq!(indexed.stats.tokens, 8);
        assert_eq!(indexed.keys.len(), indexed.problem.num_features());
    }
}
