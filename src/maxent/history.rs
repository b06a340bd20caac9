//! Token/tag storage and the context window extractors read through.

/// Returned for any position outside the current sentence.
pub const NA: &str = "NA";

/// Word and tag of the end-of-sentence token appended to every sentence.
pub const EOS_WORD: &str = ".$$.";
pub const EOS_TAG: &str = ".$$.";

/// Flat store of (word, tag) pairs for one or many sentences.
///
/// Tags are mutable so the decoder can overlay hypothesized tags on a
/// sentence before each scoring call.
#[derive(Debug, Default, Clone)]
pub struct PairsHolder {
    words: Vec<String>,
    tags: Vec<String>,
}

impl PairsHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A holder for words whose tags are not known yet; every tag reads as [`NA`].
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            words: words.iter().map(|w| w.as_ref().to_string()).collect(),
            tags: vec![NA.to_string(); words.len()],
        }
    }

    pub fn push(&mut self, word: &str, tag: &str) {
        self.words.push(word.to_string());
        self.tags.push(tag.to_string());
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, i: usize) -> &str {
        self.words.get(i).map_or(NA, |s| s.as_str())
    }

    pub fn tag(&self, i: usize) -> &str {
        self.tags.get(i).map_or(NA, |s| s.as_str())
    }

    pub fn set_tag(&mut self, i: usize, tag: &str) {
        if let Some(slot) = self.tags.get_mut(i) {
            slot.clear();
            slot.push_str(tag);
        }
    }
}

/// A view of one position inside one sentence.
///
/// `start..=end` bounds the sentence inside the backing store and
/// `current` is the position being tagged. Reads at an offset that falls
/// outside the sentence return [`NA`] instead of panicking.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pairs: &'a PairsHolder,
    pub start: usize,
    pub end: usize,
    pub current: usize,
}

impl<'a> History<'a> {
    /// # Panics
    ///
    /// Panics unless `start <= current <= end`.
    pub fn new(pairs: &'a PairsHolder, start: usize, end: usize, current: usize) -> Self {
        assert!(
            start <= current && current <= end,
            "history out of bounds: start={start} current={current} end={end}"
        );
        Self {
            pairs,
            start,
            end,
            current,
        }
    }

    fn resolve(&self, offset: isize) -> Option<usize> {
        let p = self.current as isize + offset;
        if p < self.start as isize || p > self.end as isize {
            None
        } else {
            Some(p as usize)
        }
    }

    pub fn word(&self, offset: isize) -> &'a str {
        self.resolve(offset).map_or(NA, |p| self.pairs.word(p))
    }

    pub fn tag(&self, offset: isize) -> &'a str {
        self.resolve(offset).map_or(NA, |p| self.pairs.tag(p))
    }

    /// Position of the current token relative to the sentence start.
    pub fn position(&self) -> usize {
        self.current - self.start
    }

    pub fn sentence_len(&self) -> usize {
        self.end - self.start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> PairsHolder {
        let mut pairs = PairsHolder::new();
        for (w, t) in [("a", "X"), ("the", "DT"), ("dog", "NN"), ("runs", "VBZ"), ("b", "Y")] {
            pairs.push(w, t);
        }
        pairs
    }

    #[test]
    fn reads_inside_window() {
        let pairs = holder();
        let h = History::new(&pairs, 1, 3, 2);
        assert_eq!(h.word(0), "dog");
        assert_eq!(h.word(-1), "the");
        assert_eq!(h.tag(1), "VBZ");
        assert_eq!(h.position(), 1);
        assert_eq!(h.sentence_len(), 3);
    }

    #[test]
    fn reads_outside_sentence_are_sentinel() {
        let pairs = holder();
        let h = History::new(&pairs, 1, 3, 2);
        // neighbours exist in the store but belong to other sentences
        assert_eq!(h.word(-2), NA);
        assert_eq!(h.tag(2), NA);
        assert_eq!(h.word(isize::MIN / 2), NA);
        assert_eq!(h.tag(isize::MAX / 2), NA);
    }

    #[test]
    fn set_tag_overwrites() {
        let mut pairs = PairsHolder::from_words(&["x", "y"]);
        assert_eq!(pairs.tag(0), NA);
        pairs.set_tag(0, "NN");
        pairs.set_tag(7, "NN");
        assert_eq!(pairs.tag(0), "NN");
        assert_eq!(pairs.tag(1), NA);
    }
}
