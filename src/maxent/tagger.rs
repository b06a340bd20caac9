//! Sentence decoding against a trained [`Model`].
//!
//! A [`Tagger`] only borrows the model, so any number of them can decode in
//! parallel. All mutable state lives in a per-sentence scorer.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::{
    config::Scoring,
    dict::TagDictionary,
    extractor::NO_FEATURE,
    extractors::ExtractorSet,
    history::{History, PairsHolder, EOS_TAG, EOS_WORD, NA},
    model::Model,
    viterbi::{best_sequence, SequenceModel, PAD},
};

/// Best tag sequence of a sentence and its total log score.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagging {
    pub tags: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct Tagger<'m> {
    model: &'m Model,
    open_tags: Vec<usize>,
    eos: usize,
    left: usize,
    right: usize,
    scoring: Scoring,
}

impl<'m> Tagger<'m> {
    pub fn new(model: &'m Model) -> Result<Self> {
        let eos = model
            .tags()
            .index_of(EOS_TAG)
            .ok_or_else(|| Error::invalid_model("no end-of-sentence tag"))?;
        let open_tags = model.tags().open_tags();
        if open_tags.is_empty() {
            return Err(Error::invalid_model("no open tags"));
        }
        let (left, right) = model.windows();
        Ok(Self {
            model,
            open_tags,
            eos,
            left,
            right,
            scoring: model.config().scoring,
        })
    }

    /// Overrides the scoring strategy stored in the model.
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    pub fn left_window(&self) -> usize {
        self.left
    }

    pub fn right_window(&self) -> usize {
        self.right
    }

    pub fn tag<S: AsRef<str>>(&self, words: &[S]) -> Result<Vec<String>> {
        Ok(self.tag_sentence(words, &[])?.tags)
    }

    /// Decodes `words`. `pinned` is either empty or has one entry per word;
    /// a `Some` entry fixes that word's tag.
    pub fn tag_sentence<S: AsRef<str>>(&self, words: &[S], pinned: &[Option<&str>]) -> Result<Tagging> {
        if words.is_empty() {
            return Ok(Tagging {
                tags: Vec::new(),
                score: 0.0,
            });
        }
        let mut scorer = self.scorer(words, pinned)?;
        let (best, score) = best_sequence(&mut scorer);
        Ok(Tagging {
            tags: self.tag_names(&best[self.left..self.left + words.len()]),
            score,
        })
    }

    /// For every word, its candidate tags with log-probabilities given the
    /// best path around it, most probable first.
    pub fn tag_probabilities<S: AsRef<str>>(&self, words: &[S]) -> Result<Vec<Vec<(String, f64)>>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let mut scorer = self.scorer(words, &[])?;
        let (best, _) = best_sequence(&mut scorer);
        let mut out = Vec::with_capacity(words.len());
        for j in 0..words.len() {
            let pos = j + self.left;
            let scores = scorer.scores_of(&best, pos);
            let mut dist: Vec<(String, f64)> = scorer.candidates[pos]
                .iter()
                .zip(scores)
                .map(|(&y, s)| (self.tag_name(y), s))
                .collect();
            dist.sort_by(|a, b| b.1.total_cmp(&a.1));
            out.push(dist);
        }
        Ok(out)
    }

    fn tag_name(&self, y: usize) -> String {
        self.model.tags().tag_at(y).unwrap_or(NA).to_string()
    }

    fn tag_names(&self, tags: &[usize]) -> Vec<String> {
        tags.iter().map(|&y| self.tag_name(y)).collect()
    }

    fn scorer<S: AsRef<str>>(&self, words: &[S], pinned: &[Option<&str>]) -> Result<SentenceScorer<'m>> {
        if !pinned.is_empty() && pinned.len() != words.len() {
            return Err(Error::LengthMismatch {
                words: words.len(),
                tags: pinned.len(),
            });
        }
        let mut pairs = PairsHolder::from_words(words);
        pairs.push(EOS_WORD, NA);
        let size = pairs.len();

        let pad_length = size + self.left + self.right;
        let mut candidates = Vec::with_capacity(pad_length);
        for pos in 0..pad_length {
            if pos < self.left || pos >= size + self.left {
                candidates.push(vec![PAD]);
                continue;
            }
            let j = pos - self.left;
            let tags = match pinned.get(j).copied().flatten() {
                Some(tag) => vec![self
                    .model
                    .tags()
                    .index_of(tag)
                    .ok_or_else(|| Error::UnknownTag(tag.to_string()))?],
                None if j == size - 1 => vec![self.eos],
                None => self.possible_tags(pairs.word(j)),
            };
            candidates.push(tags);
        }

        Ok(SentenceScorer {
            model: self.model,
            scoring: self.scoring,
            left: self.left,
            right: self.right,
            pairs,
            candidates,
            local_scores: HashMap::new(),
            context_scores: vec![None; size],
        })
    }

    /// Dictionary tags for words seen often enough, open tags otherwise,
    /// closed over tag equivalences.
    fn possible_tags(&self, word: &str) -> Vec<usize> {
        let dict = self.model.dict();
        let tags = self.model.tags();
        let mut base: Vec<usize> = Vec::new();
        if self.model.config().locks_tags(dict.sum(word)) {
            base = dict
                .tags_for(word)
                .into_iter()
                .filter_map(|t| tags.index_of(t))
                .collect();
        }
        if base.is_empty() {
            base = self.open_tags.clone();
        }
        tags.expand_tags(&base)
    }
}

fn log_sum(scores: &[f64]) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln()
}

fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Adds the weights of the features fired by the extractors `select` picks
/// out of each applicable set, for every tag in `scored`.
fn add_scores(
    model: &Model,
    h: &History,
    select: fn(&ExtractorSet) -> &[usize],
    scored: &[usize],
    out: &mut [f64],
) {
    let dict = model.dict();
    let general = model.general();
    let rare = model.rare();
    let sets = std::iter::once((general, 0))
        .chain(dict.is_rare(h.word(0)).then_some((rare, general.len())));
    for (set, offset) in sets {
        for &i in select(set) {
            let value = set.extract(i, h, dict);
            if value == NO_FEATURE {
                continue;
            }
            let Some(row) = model.table().get(offset + i, &value) else {
                continue;
            };
            for (s, &y) in out.iter_mut().zip(scored) {
                let f = row[y];
                if f >= 0 {
                    *s += model.lambda()[f as usize];
                }
            }
        }
    }
}

/// Per-sentence decoding state: the sentence with its tag overlay, the
/// candidate tags of each padded position, and score caches.
struct SentenceScorer<'m> {
    model: &'m Model,
    scoring: Scoring,
    left: usize,
    right: usize,
    pairs: PairsHolder,
    candidates: Vec<Vec<usize>>,
    /// Current-word scores by word.
    local_scores: HashMap<String, (Vec<usize>, Vec<f64>)>,
    /// Current-word plus surrounding-word scores by position.
    context_scores: Vec<Option<Vec<f64>>>,
}

impl<'m> SentenceScorer<'m> {
    fn history(&self, j: usize) -> History<'_> {
        History::new(&self.pairs, 0, self.pairs.len() - 1, j)
    }

    /// Writes the window's tags into the sentence so dynamic extractors see them.
    fn set_history(&mut self, tags: &[usize], pos: usize) {
        let size = self.pairs.len();
        for k in pos - self.left..=pos + self.right {
            if k < self.left || k >= size + self.left {
                continue;
            }
            let name = self.model.tags().tag_at(tags[k]).unwrap_or(NA);
            self.pairs.set_tag(k - self.left, name);
        }
    }

    /// Tags whose raw scores are computed at `pos`.
    fn scored_tags(&self, pos: usize) -> Vec<usize> {
        match self.scoring {
            Scoring::Exact => (0..self.model.tags().len()).collect(),
            Scoring::Approximate { .. } => self.candidates[pos].clone(),
        }
    }

    fn local(&mut self, j: usize, scored: &[usize]) -> Vec<f64> {
        let word = self.pairs.word(j);
        if let Some((tags, scores)) = self.local_scores.get(word) {
            if tags.as_slice() == scored {
                return scores.clone();
            }
        }
        let mut scores = vec![0.0; scored.len()];
        add_scores(self.model, &self.history(j), ExtractorSet::local, scored, &mut scores);
        self.local_scores
            .insert(word.to_string(), (scored.to_vec(), scores.clone()));
        scores
    }

    fn local_context(&mut self, j: usize, scored: &[usize]) -> Vec<f64> {
        if let Some(scores) = &self.context_scores[j] {
            if scores.len() == scored.len() {
                return scores.clone();
            }
        }
        let mut scores = self.local(j, scored);
        add_scores(self.model, &self.history(j), ExtractorSet::local_context, scored, &mut scores);
        self.context_scores[j] = Some(scores.clone());
        scores
    }
}

impl<'m> SequenceModel for SentenceScorer<'m> {
    fn length(&self) -> usize {
        self.pairs.len()
    }

    fn left_window(&self) -> usize {
        self.left
    }

    fn right_window(&self) -> usize {
        self.right
    }

    fn possible_values(&self, pos: usize) -> &[usize] {
        &self.candidates[pos]
    }

    fn scores_of(&mut self, tags: &[usize], pos: usize) -> Vec<f64> {
        let j = pos - self.left;
        self.set_history(tags, pos);
        let scored = self.scored_tags(pos);
        let mut scores = self.local_context(j, &scored);
        add_scores(self.model, &self.history(j), ExtractorSet::dynamic, &scored, &mut scores);

        match self.scoring {
            Scoring::Exact => {
                let norm = log_sum(&scores);
                self.candidates[pos].iter().map(|&y| scores[y] - norm).collect()
            }
            Scoring::Approximate { default_score } => {
                let inactive = self.model.tags().len().saturating_sub(scored.len());
                let mut norm = log_sum(&scores);
                if inactive > 0 {
                    norm = log_add(norm, (inactive as f64 * default_score).ln());
                }
                scores.iter().map(|s| s - norm).collect()
            }
        }
    }
}
