use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{dict::TagDictionary, extractor::Extractor, history::History};

/// An ordered list of templates, partitioned once by what they depend on.
///
/// Local templates see only the current word, local-context templates see
/// other words but no tags, dynamic templates read neighbouring tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Extractor>", into = "Vec<Extractor>")]
pub struct ExtractorSet {
    extractors: Vec<Extractor>,
    local: Vec<usize>,
    local_context: Vec<usize>,
    dynamic: Vec<usize>,
}

impl ExtractorSet {
    pub fn new(extractors: Vec<Extractor>) -> Result<Self> {
        let mut set = Self::default();
        for (i, ex) in extractors.iter().enumerate() {
            ex.validate()?;
            match (ex.is_local(), ex.is_dynamic()) {
                (true, true) => {
                    return Err(Error::config(format!("{ex:?} is both local and dynamic")))
                }
                (true, false) => set.local.push(i),
                (false, false) => set.local_context.push(i),
                (false, true) => set.dynamic.push(i),
            }
        }
        set.extractors = extractors;
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Extractor> {
        self.extractors.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Extractor> {
        self.extractors.iter()
    }

    /// # Panics
    ///
    /// Panics if `i` is not a template index of this set.
    pub fn extract(&self, i: usize, h: &History, dict: &dyn TagDictionary) -> String {
        self.extractors[i].extract(h, dict)
    }

    pub fn local(&self) -> &[usize] {
        &self.local
    }

    pub fn local_context(&self) -> &[usize] {
        &self.local_context
    }

    pub fn dynamic(&self) -> &[usize] {
        &self.dynamic
    }

    /// Largest number of preceding tags any template reads.
    pub fn max_left_context(&self) -> usize {
        self.dynamic
            .iter()
            .map(|&i| self.extractors[i].left_context())
            .max()
            .unwrap_or(0)
    }

    /// Largest number of following tags any template reads.
    pub fn max_right_context(&self) -> usize {
        self.dynamic
            .iter()
            .map(|&i| self.extractors[i].right_context())
            .max()
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<Extractor>> for ExtractorSet {
    type Error = Error;

    fn try_from(extractors: Vec<Extractor>) -> Result<Self> {
        Self::new(extractors)
    }
}

impl From<ExtractorSet> for Vec<Extractor> {
    fn from(set: ExtractorSet) -> Self {
        set.extractors
    }
}

/// Decoder window `(left, right)` covering both the general and rare-word sets.
pub fn windows(general: &ExtractorSet, rare: &ExtractorSet) -> (usize, usize) {
    (
        general.max_left_context().max(rare.max_left_context()),
        general.max_right_context().max(rare.max_right_context()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maxent::{dict::Dictionary, history::PairsHolder};

    #[test]
    fn partitions_by_dependency() {
        let set = ExtractorSet::new(vec![
            Extractor::Word(0),
            Extractor::Word(-1),
            Extractor::Tag(-1),
            Extractor::Suffix { len: 2, position: 0 },
            Extractor::TwoTags(-2, 1),
        ])
        .unwrap();
        assert_eq!(set.local(), &[0, 3]);
        assert_eq!(set.local_context(), &[1]);
        assert_eq!(set.dynamic(), &[2, 4]);
        assert_eq!(set.max_left_context(), 2);
        assert_eq!(set.max_right_context(), 1);
    }

    #[test]
    fn window_from_tag_offsets() {
        let set = ExtractorSet::new(vec![
            Extractor::Word(0),
            Extractor::Tag(-2),
            Extractor::Tag(-1),
            Extractor::Tag(1),
            // word offsets never widen the window
            Extractor::Word(3),
        ])
        .unwrap();
        let rare = ExtractorSet::new(vec![Extractor::StartSentenceCap]).unwrap();
        assert_eq!(windows(&set, &rare), (2, 1));
        assert_eq!(windows(&set, &ExtractorSet::default()), (2, 1));
    }

    #[test]
    fn invalid_template_is_a_config_error() {
        assert!(matches!(
            ExtractorSet::new(vec![Extractor::Word(0), Extractor::Tag(0)]),
            Err(Error::Config(..))
        ));
    }

    #[test]
    fn extract_by_index() {
        let mut pairs = PairsHolder::new();
        pairs.push("a", "DT");
        pairs.push("dog", "NN");
        let dict = Dictionary::new(5);
        let set = ExtractorSet::new(vec![Extractor::Word(0), Extractor::Tag(-1)]).unwrap();
        let h = History::new(&pairs, 0, 1, 1);
        assert_eq!(set.extract(0, &h, &dict), "dog");
        assert_eq!(set.extract(1, &h, &dict), "DT");
    }

    #[test]
    fn serialized_as_template_list() {
        let set = ExtractorSet::new(vec![Extractor::Word(0), Extractor::Tag(-1)]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: ExtractorSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<ExtractorSet>(r#"[{"Tag":0}]"#).is_err());
    }
}
