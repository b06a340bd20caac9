use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    quark::{Quark, StringTable, TextVectorizer},
};

use super::{
    config::TaggerConfig,
    dict::Dictionary,
    history::EOS_TAG,
};

/// The tag set of a model: names, open/closed status and equivalence groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagInventory {
    tags: Quark,
    closed: Vec<bool>,
    /// Groups of tags that expand into each other when building candidate sets.
    equivalences: Vec<Vec<usize>>,
}

impl TagInventory {
    /// Builds the inventory from the tags seen in training, in first-seen order.
    ///
    /// The end-of-sentence tag is always closed. Other tags are closed when
    /// listed in `closed_class_tags`, when `open_class_tags` is given and does
    /// not list them, or (with `learn_closed_class_tags`) when fewer than
    /// `closed_class_tag_threshold` distinct words were seen with them.
    pub fn build(tags: Quark, dict: &Dictionary, config: &TaggerConfig) -> Result<Self> {
        for name in config.open_class_tags.iter().chain(&config.closed_class_tags) {
            if tags.to_id(name).is_none() {
                return Err(Error::config(format!("unknown tag in open/closed tag list: {name}")));
            }
        }

        let closed = tags
            .iter()
            .map(|name| {
                if name == EOS_TAG || config.closed_class_tags.iter().any(|t| t == name) {
                    return true;
                }
                if !config.open_class_tags.is_empty() {
                    return !config.open_class_tags.iter().any(|t| t == name);
                }
                config.learn_closed_class_tags
                    && dict.word_types_for(name) < config.closed_class_tag_threshold
            })
            .collect();

        let mut equivalences = Vec::new();
        for group in &config.tag_equivalences {
            let ids: Vec<usize> = group
                .iter()
                .filter_map(|name| {
                    let id = tags.to_id(name);
                    if id.is_none() {
                        log::warn!("ignoring unknown tag in equivalence group: {name}");
                    }
                    id
                })
                .collect();
            if ids.len() > 1 {
                equivalences.push(ids);
            }
        }

        let inventory = Self {
            tags,
            closed,
            equivalences,
        };
        inventory.validate()?;
        log::info!(
            "tags: {}, open: {}",
            inventory.len(),
            inventory.open_tags().len()
        );
        Ok(inventory)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.closed.len() != self.tags.len() {
            return Err(Error::invalid_model("open/closed flags do not match tag count"));
        }
        if self.equivalences.iter().flatten().any(|&t| t >= self.tags.len()) {
            return Err(Error::invalid_model("tag equivalence refers to unknown tag"));
        }
        if self.open_tags().is_empty() {
            return Err(Error::config("the open tag set is empty"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.tags.to_id(tag)
    }

    pub fn tag_at(&self, index: usize) -> Option<&str> {
        self.tags.to_str(index)
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.closed.get(index).copied().unwrap_or(true)
    }

    /// Tags that may be assigned to words the dictionary does not lock.
    pub fn open_tags(&self) -> Vec<usize> {
        (0..self.len()).filter(|&t| !self.is_closed(t)).collect()
    }

    /// Closes `tags` over the equivalence groups.
    ///
    /// The input order is kept and additions follow in group order, so the
    /// result is the same for the same input.
    pub fn expand_tags(&self, tags: &[usize]) -> Vec<usize> {
        let mut out = tags.to_vec();
        let mut i = 0;
        while i < out.len() {
            let t = out[i];
            for group in self.equivalences.iter().filter(|g| g.contains(&t)) {
                for &u in group {
                    if !out.contains(&u) {
                        out.push(u);
                    }
                }
            }
            i += 1;
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(names: &[&str], closed: &[&str]) -> Self {
        let mut tags = Quark::default();
        for name in names {
            tags.find_or_insert(name);
        }
        let closed = names.iter().map(|n| closed.contains(n)).collect();
        Self {
            tags,
            closed,
            equivalences: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> (Quark, Dictionary) {
        let mut tags = Quark::default();
        let mut dict = Dictionary::new(5);
        for (w, t) in [
            ("the", "DT"),
            ("dog", "NN"),
            ("cat", "NN"),
            ("runs", "VBZ"),
            (".$$.", EOS_TAG),
            ("NN-VB", "NN|VB"),
        ] {
            tags.find_or_insert(t);
            dict.add(w, t);
        }
        (tags, dict)
    }

    #[test]
    fn eos_is_always_closed() {
        let (tags, dict) = corpus();
        let inventory = TagInventory::build(tags, &dict, &TaggerConfig::default()).unwrap();
        let eos = inventory.index_of(EOS_TAG).unwrap();
        assert!(inventory.is_closed(eos));
        assert_eq!(inventory.open_tags().len(), inventory.len() - 1);
    }

    #[test]
    fn closed_tags_from_config_and_learning() {
        let (tags, dict) = corpus();
        let config = TaggerConfig {
            closed_class_tags: vec!["DT".to_string()],
            ..Default::default()
        };
        let inventory = TagInventory::build(tags.clone(), &dict, &config).unwrap();
        assert!(inventory.is_closed(inventory.index_of("DT").unwrap()));
        assert!(!inventory.is_closed(inventory.index_of("NN").unwrap()));

        let config = TaggerConfig {
            learn_closed_class_tags: true,
            closed_class_tag_threshold: 2,
            ..Default::default()
        };
        let inventory = TagInventory::build(tags, &dict, &config).unwrap();
        let open: Vec<_> = inventory
            .open_tags()
            .into_iter()
            .filter_map(|t| inventory.tag_at(t))
            .collect();
        assert_eq!(open, vec!["NN"]);
    }

    #[test]
    fn empty_open_set_is_an_error() {
        let (tags, dict) = corpus();
        let config = TaggerConfig {
            learn_closed_class_tags: true,
            closed_class_tag_threshold: 100,
            ..Default::default()
        };
        assert!(matches!(
            TagInventory::build(tags, &dict, &config),
            Err(Error::Config(..))
        ));
    }

    #[test]
    fn unknown_open_tag_is_an_error() {
        let (tags, dict) = corpus();
        let config = TaggerConfig {
            open_class_tags: vec!["JJ".to_string()],
            ..Default::default()
        };
        assert!(TagInventory::build(tags, &dict, &config).is_err());
    }

    #[test]
    fn expansion_is_deterministic() {
        let (tags, dict) = corpus();
        let config = TaggerConfig {
            tag_equivalences: vec![
                vec!["NN|VB".to_string(), "NN".to_string()],
                vec!["NN".to_string(), "VBZ".to_string(), "XX".to_string()],
            ],
            ..Default::default()
        };
        let inventory = TagInventory::build(tags, &dict, &config).unwrap();
        let id = |t: &str| inventory.index_of(t).unwrap();
        assert_eq!(
            inventory.expand_tags(&[id("NN|VB")]),
            vec![id("NN|VB"), id("NN"), id("VBZ")]
        );
        assert_eq!(inventory.expand_tags(&[id("DT")]), vec![id("DT")]);
        assert_eq!(
            inventory.expand_tags(&[id("VBZ"), id("DT")]),
            vec![id("VBZ"), id("DT"), id("NN"), id("NN|VB")]
        );
    }
}
