use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Word/tag co-occurrence statistics the extractors and decoder consult.
pub trait TagDictionary {
    /// Total number of times `word` was seen.
    fn sum(&self, word: &str) -> usize;

    /// Number of times `word` was seen with `tag`.
    fn count(&self, word: &str, tag: &str) -> usize;

    /// Tags attested for `word`, in first-seen order.
    fn tags_for(&self, word: &str) -> Vec<&str>;

    /// Most frequent tag of `word`.
    fn first_tag(&self, word: &str) -> Option<&str>;

    fn is_rare(&self, word: &str) -> bool;

    fn is_unknown(&self, word: &str) -> bool {
        self.sum(word) == 0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct WordEntry {
    tags: Vec<(String, usize)>,
    total: usize,
}

impl WordEntry {
    fn add(&mut self, tag: &str) {
        self.total += 1;
        match self.tags.iter_mut().find(|(t, _)| t == tag) {
            Some((_, n)) => *n += 1,
            None => self.tags.push((tag.to_string(), 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DictionaryRepr {
    rare_word_thresh: usize,
    entries: Vec<(String, WordEntry)>,
}

/// Tag dictionary collected from a tagged corpus.
///
/// A word is rare when its total count is below `rare_word_thresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DictionaryRepr", into = "DictionaryRepr")]
pub struct Dictionary {
    rare_word_thresh: usize,
    words: HashMap<String, WordEntry>,
}

impl From<DictionaryRepr> for Dictionary {
    fn from(repr: DictionaryRepr) -> Self {
        Self {
            rare_word_thresh: repr.rare_word_thresh,
            words: repr.entries.into_iter().collect(),
        }
    }
}

impl From<Dictionary> for DictionaryRepr {
    fn from(dict: Dictionary) -> Self {
        let mut entries: Vec<_> = dict.words.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            rare_word_thresh: dict.rare_word_thresh,
            entries,
        }
    }
}

impl Dictionary {
    pub fn new(rare_word_thresh: usize) -> Self {
        Self {
            rare_word_thresh,
            words: HashMap::new(),
        }
    }

    pub fn add(&mut self, word: &str, tag: &str) {
        self.words.entry(word.to_string()).or_default().add(tag);
    }

    /// Number of distinct words seen in the dictionary.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of distinct words that were seen with `tag`.
    pub fn word_types_for(&self, tag: &str) -> usize {
        self.words
            .values()
            .filter(|e| e.tags.iter().any(|(t, _)| t == tag))
            .count()
    }

    pub fn rare_word_thresh(&self) -> usize {
        self.rare_word_thresh
    }
}

impl TagDictionary for Dictionary {
    fn sum(&self, word: &str) -> usize {
        self.words.get(word).map_or(0, |e| e.total)
    }

    fn count(&self, word: &str, tag: &str) -> usize {
        self.words
            .get(word)
            .and_then(|e| e.tags.iter().find(|(t, _)| t == tag))
            .map_or(0, |(_, n)| *n)
    }

    fn tags_for(&self, word: &str) -> Vec<&str> {
        self.words
            .get(word)
            .map(|e| e.tags.iter().map(|(t, _)| t.as_str()).collect())
            .unwrap_or_default()
    }

    fn first_tag(&self, word: &str) -> Option<&str> {
        let entry = self.words.get(word)?;
        let mut best: Option<&(String, usize)> = None;
        for pair in &entry.tags {
            if best.map_or(true, |b| pair.1 > b.1) {
                best = Some(pair);
            }
        }
        best.map(|(t, _)| t.as_str())
    }

    fn is_rare(&self, word: &str) -> bool {
        self.sum(word) < self.rare_word_thresh
    }
}
