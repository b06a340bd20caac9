use std::{
    collections::{BTreeMap, HashMap},
    time::Instant,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{
    config::{SupportFilter, TaggerConfig},
    dict::{Dictionary, TagDictionary},
    extractor::NO_FEATURE,
    extractors::ExtractorSet,
    history::{History, PairsHolder, EOS_TAG, EOS_WORD},
    tags::TagInventory,
};

/// Tagged sentences laid end to end, each closed by the end-of-sentence token.
#[derive(Debug, Default, Clone)]
pub struct TrainingCorpus {
    pairs: PairsHolder,
    sentences: Vec<(usize, usize)>,
}

impl TrainingCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sentence<S: AsRef<str>, T: AsRef<str>>(&mut self, words: &[S], tags: &[T]) -> Result<()> {
        if words.len() != tags.len() {
            return Err(Error::LengthMismatch {
                words: words.len(),
                tags: tags.len(),
            });
        }
        if words.is_empty() {
            return Ok(());
        }
        let start = self.pairs.len();
        for (w, t) in words.iter().zip(tags) {
            self.pairs.push(w.as_ref(), t.as_ref());
        }
        self.pairs.push(EOS_WORD, EOS_TAG);
        self.sentences.push((start, self.pairs.len() - 1));
        Ok(())
    }

    pub fn num_sentences(&self) -> usize {
        self.sentences.len()
    }

    /// Number of tokens, end-of-sentence tokens included.
    pub fn num_tokens(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub(crate) fn pairs(&self) -> &PairsHolder {
        &self.pairs
    }

    pub(crate) fn histories(&self) -> impl Iterator<Item = History<'_>> {
        self.sentences.iter().flat_map(move |&(start, end)| {
            (start..=end).map(move |cur| History::new(&self.pairs, start, end, cur))
        })
    }
}

/// A candidate feature: template id, extracted value and tag index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    pub extractor: usize,
    pub value: String,
    pub tag: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub tag: usize,
    /// Support range in [`TrainingProblem::x_indexed`].
    pub start: usize,
    pub end: usize,
    /// Empirical expectation.
    pub ftilde: f64,
}

/// History classes, their tag counts and the features defined over them.
///
/// This is all the weight solver needs; it borrows nothing from the corpus.
#[derive(Debug, Clone)]
pub struct TrainingProblem {
    y_size: usize,
    num_tokens: usize,
    px: Vec<usize>,
    pxy: Vec<Vec<usize>>,
    fnum: Vec<Vec<u32>>,
    x_indexed: Vec<usize>,
    features: Vec<Feature>,
}

impl TrainingProblem {
    /// Builds a problem from per-class tag counts.
    ///
    /// `pxy[x][y]` counts class `x` seen with tag `y`. `supports` lists the
    /// class sets features are defined over, and each `(support, tag)` pair
    /// in `features` defines one feature.
    pub fn new(
        y_size: usize,
        pxy: Vec<Vec<usize>>,
        supports: &[Vec<usize>],
        features: &[(usize, usize)],
    ) -> Result<Self> {
        let x_size = pxy.len();
        if let Some(row) = pxy.iter().find(|row| row.len() != y_size) {
            return Err(Error::config(format!(
                "tag count row has {} entries, expected {y_size}",
                row.len()
            )));
        }
        if supports.iter().flatten().any(|&x| x >= x_size) {
            return Err(Error::config("feature support refers to an unknown history"));
        }

        let px: Vec<usize> = pxy.iter().map(|row| row.iter().sum()).collect();
        let num_tokens: usize = px.iter().sum();

        let mut ranges = Vec::with_capacity(supports.len());
        let mut x_indexed = Vec::new();
        for xs in supports {
            let start = x_indexed.len();
            x_indexed.extend_from_slice(xs);
            ranges.push((start, x_indexed.len()));
        }

        let mut fnum = vec![vec![0u32; y_size]; x_size];
        let mut out = Vec::with_capacity(features.len());
        for &(support, tag) in features {
            let &(start, end) = ranges
                .get(support)
                .ok_or_else(|| Error::config(format!("unknown support set {support}")))?;
            if tag >= y_size {
                return Err(Error::config(format!("feature tag {tag} out of range")));
            }
            let mut count = 0;
            for &x in &x_indexed[start..end] {
                fnum[x][tag] += 1;
                count += pxy[x][tag];
            }
            let ftilde = if num_tokens == 0 {
                0.0
            } else {
                count as f64 / num_tokens as f64
            };
            out.push(Feature {
                tag,
                start,
                end,
                ftilde,
            });
        }

        Ok(Self {
            y_size,
            num_tokens,
            px,
            pxy,
            fnum,
            x_indexed,
            features: out,
        })
    }

    pub fn x_size(&self) -> usize {
        self.px.len()
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, f: usize) -> &Feature {
        &self.features[f]
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn x_indexed(&self) -> &[usize] {
        &self.x_indexed
    }

    /// History classes feature `f` is active on.
    pub fn support(&self, f: usize) -> &[usize] {
        let feat = &self.features[f];
        &self.x_indexed[feat.start..feat.end]
    }

    /// Empirical probability of history class `x`.
    pub fn ptilde_x(&self, x: usize) -> f64 {
        self.px[x] as f64 / self.num_tokens as f64
    }

    /// Empirical probability of `(x, y)`.
    pub fn ptilde_xy(&self, x: usize, y: usize) -> f64 {
        self.pxy[x][y] as f64 / self.num_tokens as f64
    }

    /// Number of features active on `(x, y)`.
    pub fn fnum(&self, x: usize, y: usize) -> u32 {
        self.fnum[x][y]
    }

    /// The common active-feature count when it is the same for every `(x, y)`.
    pub fn fixed_fnum(&self) -> Option<u32> {
        let first = *self.fnum.first()?.first()?;
        if first > 0 && self.fnum.iter().flatten().all(|&n| n == first) {
            Some(first)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureTableRepr {
    num_tags: usize,
    templates: Vec<Vec<(String, Vec<i32>)>>,
}

/// Decode-time lookup: template id, then value, then tag gives a feature
/// number, or -1 when there is no such feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FeatureTableRepr", into = "FeatureTableRepr")]
pub struct FeatureTable {
    num_tags: usize,
    templates: Vec<HashMap<String, Vec<i32>>>,
}

impl From<FeatureTableRepr> for FeatureTable {
    fn from(repr: FeatureTableRepr) -> Self {
        Self {
            num_tags: repr.num_tags,
            templates: repr
                .templates
                .into_iter()
                .map(|t| t.into_iter().collect())
                .collect(),
        }
    }
}

impl From<FeatureTable> for FeatureTableRepr {
    fn from(table: FeatureTable) -> Self {
        let templates = table
            .templates
            .into_iter()
            .map(|t| {
                let mut rows: Vec<_> = t.into_iter().collect();
                rows.sort_by(|a, b| a.0.cmp(&b.0));
                rows
            })
            .collect();
        Self {
            num_tags: table.num_tags,
            templates,
        }
    }
}

impl FeatureTable {
    pub fn new(num_templates: usize, num_tags: usize) -> Self {
        Self {
            num_tags,
            templates: vec![HashMap::new(); num_templates],
        }
    }

    pub fn num_templates(&self) -> usize {
        self.templates.len()
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    pub fn insert(&mut self, template: usize, value: &str, tag: usize, feature: usize) {
        let num_tags = self.num_tags;
        let row = self.templates[template]
            .entry(value.to_string())
            .or_insert_with(|| vec![-1; num_tags]);
        row[tag] = feature as i32;
    }

    pub fn get(&self, template: usize, value: &str) -> Option<&[i32]> {
        self.templates
            .get(template)
            .and_then(|t| t.get(value))
            .map(|row| row.as_slice())
    }

    pub(crate) fn templates(&self) -> &[HashMap<String, Vec<i32>>] {
        &self.templates
    }

    pub(crate) fn templates_mut(&mut self) -> &mut [HashMap<String, Vec<i32>>] {
        &mut self.templates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub tokens: usize,
    pub histories: usize,
    pub candidate_keys: usize,
    pub features: usize,
}

/// Output of featurization.
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    pub problem: TrainingProblem,
    /// Feature keys in feature-number order.
    pub keys: Vec<FeatureKey>,
    pub table: FeatureTable,
    pub stats: IndexStats,
}

/// Turns a tagged corpus into numbered features over history classes.
pub struct FeatureIndexer<'a> {
    pub config: &'a TaggerConfig,
    pub dict: &'a Dictionary,
    pub tags: &'a TagInventory,
    pub general: &'a ExtractorSet,
    pub rare: &'a ExtractorSet,
}

impl<'a> FeatureIndexer<'a> {
    fn threshold(&self, extractor: usize) -> usize {
        if extractor == 0 {
            self.config.cur_word_min_feature_thresh
        } else if extractor < self.general.len() {
            self.config.min_feature_thresh
        } else {
            self.config.rare_word_min_feature_thresh
        }
    }

    fn precondition(&self, extractor: usize, tag: usize) -> bool {
        let ex = if extractor < self.general.len() {
            self.general.get(extractor)
        } else {
            self.rare.get(extractor - self.general.len())
        };
        match (ex, self.tags.tag_at(tag)) {
            (Some(ex), Some(name)) => ex.precondition(name),
            _ => false,
        }
    }

    /// Whether history class `x`, whose current word is `word`, counts toward
    /// the support of a feature tied to `tag`.
    fn admits(&self, word: &str, tag: usize) -> bool {
        let filter = self.config.support_filter;
        let name = self.tags.tag_at(tag).unwrap_or_default();
        if filter.contains(SupportFilter::OCCURRING_TAGS_ONLY) && self.dict.count(word, name) == 0 {
            return false;
        }
        if filter.contains(SupportFilter::POSSIBLE_TAGS_ONLY) {
            let attested: Vec<usize> = self
                .dict
                .tags_for(word)
                .into_iter()
                .filter_map(|t| self.tags.index_of(t))
                .collect();
            if !self.tags.expand_tags(&attested).contains(&tag) {
                return false;
            }
        }
        true
    }

    pub fn index(&self, corpus: &TrainingCorpus) -> Result<IndexedCorpus> {
        let begin = Instant::now();
        let y_size = self.tags.len();
        let n_general = self.general.len();
        let pairs = corpus.pairs();

        // group positions into history classes by their extracted values
        let mut classes: HashMap<Vec<String>, usize> = HashMap::new();
        let mut x_values: Vec<Vec<String>> = Vec::new();
        let mut pxy: Vec<Vec<usize>> = Vec::new();
        for h in corpus.histories() {
            let Some(y) = self.tags.index_of(pairs.tag(h.current)) else {
                log::warn!("skipping token with unknown tag: {}", pairs.tag(h.current));
                continue;
            };
            let word = h.word(0);
            let mut values: Vec<String> = (0..n_general)
                .map(|i| self.general.extract(i, &h, self.dict))
                .collect();
            if self.dict.is_rare(word) {
                values.extend((0..self.rare.len()).map(|i| self.rare.extract(i, &h, self.dict)));
            }
            let x = match classes.get(&values) {
                Some(&x) => x,
                None => {
                    let x = x_values.len();
                    classes.insert(values.clone(), x);
                    x_values.push(values);
                    pxy.push(vec![0; y_size]);
                    x
                }
            };
            pxy[x][y] += 1;
        }
        drop(classes);
        if x_values.is_empty() {
            return Err(Error::EmptyDataset);
        }
        log::info!(
            "histories: {} classes over {} tokens, tags: {}",
            x_values.len(),
            corpus.num_tokens(),
            y_size
        );

        // every history class each (template, value) occurs in
        let mut occurrences: BTreeMap<(usize, &str), Vec<usize>> = BTreeMap::new();
        for (x, values) in x_values.iter().enumerate() {
            for (i, v) in values.iter().enumerate() {
                if v != NO_FEATURE {
                    occurrences.entry((i, v.as_str())).or_default().push(x);
                }
            }
        }

        let filtered = !self.config.support_filter.is_empty();
        let mut supports: Vec<Vec<usize>> = Vec::new();
        let mut features: Vec<(usize, usize)> = Vec::new();
        let mut keys: Vec<FeatureKey> = Vec::new();
        let mut table = FeatureTable::new(n_general + self.rare.len(), y_size);
        let mut candidate_keys = 0;

        for (&(i, value), xs) in &occurrences {
            let candidates: Vec<usize> = (0..y_size)
                .filter(|&y| self.config.all_tags || xs.iter().any(|&x| pxy[x][y] > 0))
                .filter(|&y| self.precondition(i, y))
                .collect();
            candidate_keys += candidates.len();

            let threshold = self.threshold(i);
            let mut shared: Option<usize> = None;
            for y in candidates {
                let support: Vec<usize> = if filtered {
                    xs.iter()
                        .copied()
                        .filter(|&x| self.admits(&x_values[x][0], y))
                        .collect()
                } else {
                    xs.clone()
                };
                let weight: usize = support.iter().map(|&x| pxy[x].iter().sum::<usize>()).sum();
                if weight <= threshold {
                    continue;
                }
                let support_id = match shared {
                    Some(id) if !filtered => id,
                    _ => {
                        supports.push(support);
                        let id = supports.len() - 1;
                        shared = Some(id);
                        id
                    }
                };
                table.insert(i, value, y, features.len());
                features.push((support_id, y));
                keys.push(FeatureKey {
                    extractor: i,
                    value: value.to_string(),
                    tag: y,
                });
            }
        }

        let problem = TrainingProblem::new(y_size, pxy, &supports, &features)?;
        let stats = IndexStats {
            tokens: problem.num_tokens(),
            histories: problem.x_size(),
            candidate_keys,
            features: problem.num_features(),
        };
        log::info!(
            "number of features: {} of {} candidates, time cost: {:?}",
            stats.features,
            stats.candidate_keys,
            begin.elapsed()
        );
        Ok(IndexedCorpus {
            problem,
            keys,
            table,
            stats,
        })
    }
}
