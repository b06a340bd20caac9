use std::{
    convert::TryFrom,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use crate::error::{Error, Result};

/// One sentence of a two-column corpus.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub tags: Vec<String>,
}

impl TaggedSentence {
    pub fn push(&mut self, word: &str, tag: &str) {
        self.words.push(word.to_string());
        self.tags.push(tag.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

/// Sentences read from `word<TAB>tag` lines, separated by blank lines.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    pub v: Vec<TaggedSentence>,
}

impl Dataset {
    pub fn read<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut sentence = TaggedSentence::default();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                if !sentence.is_empty() {
                    self.v.push(std::mem::take(&mut sentence));
                }
                continue;
            }
            match line.split_once('\t') {
                Some((word, tag)) if !word.is_empty() && !tag.trim().is_empty() => {
                    sentence.push(word, tag.trim())
                }
                _ => log::warn!("invalid line: {line}"),
            }
        }
        if !sentence.is_empty() {
            self.v.push(sentence);
        }
        Ok(())
    }

    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.read(File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.v.iter().map(TaggedSentence::len).sum()
    }

    pub fn max_length(&self) -> usize {
        self.v.iter().map(TaggedSentence::len).max().unwrap_or_default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaggedSentence> {
        self.v.iter()
    }

    /// Fails with [`Error::EmptyDataset`] when nothing was read.
    pub fn non_empty(self) -> Result<Self> {
        if self.is_empty() {
            Err(Error::EmptyDataset)
        } else {
            Ok(self)
        }
    }
}

impl TryFrom<File> for Dataset {
    type Error = Error;

    fn try_from(file: File) -> Result<Self> {
        let mut ds = Self::default();
        ds.read(file)?;
        Ok(ds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sentences() {
        let text = "the\tDT\ndog\tNN\n\n\na\tDT\r\ncat\tNN\nbroken line\nsleeps\tVBZ";
        let mut ds = Dataset::default();
        ds.read(text.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.v[0].words, vec!["the", "dog"]);
        assert_eq!(ds.v[1].tags, vec!["DT", "NN", "VBZ"]);
        assert_eq!(ds.total_items(), 5);
        assert_eq!(ds.max_length(), 3);
    }

    #[test]
    fn empty_input() {
        let mut ds = Dataset::default();
        ds.read("\n\n".as_bytes()).unwrap();
        assert!(matches!(ds.non_empty(), Err(Error::EmptyDataset)));
    }
}
