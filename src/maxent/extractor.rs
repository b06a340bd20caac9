//! Feature templates.
//!
//! An [`Extractor`] reads a [`History`] and produces a symbolic value; the
//! value paired with a candidate tag forms a feature. Values equal to
//! [`NO_FEATURE`] never produce a feature.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{
    dict::TagDictionary,
    history::{History, NA},
    tags::TagInventory,
};

/// Extracted value meaning "this template does not fire here".
pub const NO_FEATURE: &str = "0";

/// Affix value for words shorter than the affix.
const TOO_SHORT: &str = "######";

const COMPANY_NAME_WINDOW: isize = 3;

const COMPANY_NAME_ENDS: &[&str] = &[
    "Company", "COMPANY", "Co.", "Co", "Cos.", "CO.", "COS.", "Corporation", "CORPORATION",
    "Corp.", "Corp", "CORP.", "Incorporated", "INCORPORATED", "Inc.", "Inc", "INC.",
    "Association", "ASSOCIATION", "Assn", "ASSN", "Limited", "LIMITED", "Ltd.", "LTD.", "L.P.",
];

/// Minimum count of the capitalized word with the tag for [`Extractor::CapitalizedSeenAs`].
const SEEN_AS_CUTOFF: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Extractor {
    /// The word at an offset.
    Word(isize),
    LowerCaseWord(isize),
    /// The tag at a non-zero offset.
    Tag(isize),
    TwoWords(isize, isize),
    TwoTags(isize, isize),
    ThreeTags(isize, isize, isize),
    WordTag { word: isize, tag: isize },
    WordTwoTags { word: isize, left: isize, right: isize },
    /// All tags between the current position and the offset, exclusive of 0.
    TagRun(isize),
    WordShape(isize),
    WordShapeConjunction(isize, isize),
    Suffix { len: usize, position: isize },
    Prefix { len: usize, position: isize },
    /// Current word contains an uppercase letter.
    UpperCase,
    HasDigit,
    HasDash,
    NoLowerCase,
    AllUpperCase,
    LetterDigitDash,
    UpperDigitDash,
    CompanyName,
    CaselessCompanyName,
    /// Distance from a capitalized word back to the nearest lowercase word.
    CapDistance,
    CapitalizedSeenAs(String),
    StartSentenceCap,
    MidSentenceCap,
    MidSentenceCapC,
    NonAlphanumeric,
    Numeric,
    Conjunction(Box<Extractor>, Box<Extractor>),
}

fn flag(b: bool) -> String {
    let v = if b { "1" } else { NO_FEATURE };
    v.to_string()
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().map_or(false, char::is_uppercase)
}

fn starts_lower(s: &str) -> bool {
    s.chars().next().map_or(false, char::is_lowercase)
}

fn has_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase)
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || ",./-".contains(c))
}

/// Collapses a word into character classes: `X` upper, `x` lower, `d` digit.
///
/// Words longer than four characters keep the classes of their first and
/// last two characters and the sorted set of classes in between.
pub fn word_shape(word: &str) -> String {
    let classes: Vec<char> = word
        .chars()
        .map(|c| {
            if c.is_uppercase() {
                'X'
            } else if c.is_lowercase() {
                'x'
            } else if c.is_numeric() {
                'd'
            } else {
                c
            }
        })
        .collect();
    let n = classes.len();
    if n <= 4 {
        return classes.into_iter().collect();
    }
    let mut middle = classes[2..n - 2].to_vec();
    middle.sort_unstable();
    middle.dedup();
    classes[..2]
        .iter()
        .chain(middle.iter())
        .chain(classes[n - 2..].iter())
        .collect()
}

impl Extractor {
    pub fn extract(&self, h: &History, dict: &dyn TagDictionary) -> String {
        match self {
            Self::Word(p) => h.word(*p).to_string(),
            Self::LowerCaseWord(p) => h.word(*p).to_lowercase(),
            Self::Tag(p) => h.tag(*p).to_string(),
            Self::TwoWords(a, b) => format!("{}!{}", h.word(*a), h.word(*b)),
            Self::TwoTags(a, b) => format!("{}!{}", h.tag(*a), h.tag(*b)),
            Self::ThreeTags(a, b, c) => format!("{}!{}!{}", h.tag(*a), h.tag(*b), h.tag(*c)),
            Self::WordTag { word, tag } => format!("{}!{}", h.tag(*tag), h.word(*word)),
            Self::WordTwoTags { word, left, right } => {
                format!("{}!{}!{}", h.tag(*left), h.word(*word), h.tag(*right))
            }
            Self::TagRun(p) => {
                let offsets: Vec<isize> = if *p < 0 {
                    (*p..0).collect()
                } else {
                    (1..=*p).rev().collect()
                };
                offsets.iter().map(|&o| h.tag(o)).collect::<Vec<_>>().join("!")
            }
            Self::WordShape(p) => word_shape(h.word(*p)),
            Self::WordShapeConjunction(a, b) => (*a..=*b)
                .map(|o| word_shape(h.word(o)))
                .collect::<Vec<_>>()
                .join("|"),
            Self::Suffix { len, position } => {
                let word = h.word(*position);
                let n = word.chars().count();
                if n < *len {
                    TOO_SHORT.to_string()
                } else {
                    word.chars().skip(n - len).collect()
                }
            }
            Self::Prefix { len, position } => {
                let word = h.word(*position);
                if word.chars().count() < *len {
                    TOO_SHORT.to_string()
                } else {
                    word.chars().take(*len).collect()
                }
            }
            Self::UpperCase => flag(has_upper(h.word(0))),
            Self::HasDigit => flag(has_digit(h.word(0))),
            Self::HasDash => flag(h.word(0).contains('-')),
            Self::NoLowerCase => flag(!h.word(0).chars().any(char::is_lowercase)),
            Self::AllUpperCase => flag(h.word(0).chars().all(char::is_uppercase)),
            Self::LetterDigitDash => {
                let w = h.word(0);
                flag(w.chars().any(char::is_alphabetic) && w.contains('-') && has_digit(w))
            }
            Self::UpperDigitDash => {
                let w = h.word(0);
                flag(has_upper(w) && w.contains('-') && has_digit(w))
            }
            Self::CompanyName => flag(
                starts_upper(h.word(0))
                    && (0..=COMPANY_NAME_WINDOW).any(|o| COMPANY_NAME_ENDS.contains(&h.word(o))),
            ),
            Self::CaselessCompanyName => flag((0..=COMPANY_NAME_WINDOW).any(|o| {
                let w = h.word(o);
                COMPANY_NAME_ENDS.iter().any(|end| end.to_lowercase() == w)
            })),
            Self::CapDistance => cap_distance(h),
            Self::CapitalizedSeenAs(tag) => {
                let dist = cap_distance(h);
                if dist == NO_FEATURE {
                    dist
                } else if dict.count(h.word(0), tag) > SEEN_AS_CUTOFF {
                    dist + tag
                } else {
                    NO_FEATURE.to_string()
                }
            }
            Self::StartSentenceCap => {
                let w = h.word(0);
                if h.tag(-1) != NA || !starts_upper(w) {
                    return NO_FEATURE.to_string();
                }
                lower_case_first_tag(w, dict)
            }
            Self::MidSentenceCap => flag(h.tag(-1) == NA && has_upper(h.word(0))),
            Self::MidSentenceCapC => {
                let w = h.word(0);
                if h.tag(-1) == NA || !starts_upper(w) {
                    return NO_FEATURE.to_string();
                }
                lower_case_first_tag(w, dict)
            }
            Self::NonAlphanumeric => flag(!h.word(0).chars().any(char::is_alphanumeric)),
            Self::Numeric => {
                let w = h.word(0);
                flag(has_digit(w) && is_numeric(w))
            }
            Self::Conjunction(a, b) => {
                let left = a.extract(h, dict);
                if left == NO_FEATURE {
                    return left;
                }
                let right = b.extract(h, dict);
                if right == NO_FEATURE {
                    return right;
                }
                format!("{left}:{right}")
            }
        }
    }

    /// Whether a feature of this template may be tied to `tag`.
    pub fn precondition(&self, tag: &str) -> bool {
        match self {
            Self::CapitalizedSeenAs(t) => t == tag,
            Self::Conjunction(a, b) => a.precondition(tag) && b.precondition(tag),
            _ => true,
        }
    }

    /// Offsets of the tags this template reads.
    fn tag_offsets(&self) -> Vec<isize> {
        match self {
            Self::Tag(p) => vec![*p],
            Self::TwoTags(a, b) => vec![*a, *b],
            Self::ThreeTags(a, b, c) => vec![*a, *b, *c],
            Self::WordTag { tag, .. } => vec![*tag],
            Self::WordTwoTags { left, right, .. } => vec![*left, *right],
            Self::TagRun(p) => vec![*p],
            Self::StartSentenceCap | Self::MidSentenceCap | Self::MidSentenceCapC => vec![-1],
            Self::Conjunction(a, b) => {
                let mut v = a.tag_offsets();
                v.extend(b.tag_offsets());
                v
            }
            _ => Vec::new(),
        }
    }

    /// Depends only on the current word.
    pub fn is_local(&self) -> bool {
        match self {
            Self::Word(p) | Self::LowerCaseWord(p) | Self::WordShape(p) => *p == 0,
            Self::Suffix { position, .. } | Self::Prefix { position, .. } => *position == 0,
            Self::UpperCase
            | Self::HasDigit
            | Self::HasDash
            | Self::NoLowerCase
            | Self::AllUpperCase
            | Self::LetterDigitDash
            | Self::UpperDigitDash
            | Self::NonAlphanumeric
            | Self::Numeric => true,
            Self::Conjunction(a, b) => a.is_local() && b.is_local(),
            _ => false,
        }
    }

    /// Depends on tags assigned elsewhere in the sentence.
    pub fn is_dynamic(&self) -> bool {
        !self.tag_offsets().is_empty()
    }

    pub fn left_context(&self) -> usize {
        self.tag_offsets()
            .into_iter()
            .map(|o| (-o).max(0) as usize)
            .max()
            .unwrap_or(0)
    }

    pub fn right_context(&self) -> usize {
        self.tag_offsets()
            .into_iter()
            .map(|o| o.max(0) as usize)
            .max()
            .unwrap_or(0)
    }

    /// Rejects templates that are internally inconsistent.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_local() && self.is_dynamic() {
            return Err(Error::config(format!("{self:?} is both local and dynamic")));
        }
        if self.tag_offsets().contains(&0) {
            return Err(Error::config(format!("{self:?} reads the tag being predicted")));
        }
        match self {
            Self::Suffix { len: 0, .. } | Self::Prefix { len: 0, .. } => {
                Err(Error::config(format!("{self:?} has zero length")))
            }
            Self::WordShapeConjunction(a, b) if a > b => {
                Err(Error::config(format!("{self:?} has an empty window")))
            }
            Self::Conjunction(a, b) => {
                a.validate()?;
                b.validate()
            }
            _ => Ok(()),
        }
    }
}

fn cap_distance(h: &History) -> String {
    let word = h.word(0);
    if !starts_upper(word) {
        return NO_FEATURE.to_string();
    }
    let prefix = if word.chars().all(char::is_uppercase) {
        "all:"
    } else {
        "start"
    };
    let mut offset = -1;
    loop {
        let prev = h.word(offset);
        if starts_lower(prev) {
            return format!("{prefix}{}", -offset);
        }
        if prev == NA || prev == "``" {
            return format!("{prefix}infinity");
        }
        offset -= 1;
    }
}

fn lower_case_first_tag(word: &str, dict: &dyn TagDictionary) -> String {
    let lower = word.to_lowercase();
    dict.first_tag(&lower)
        .map_or_else(|| NO_FEATURE.to_string(), |t| t.to_string())
}

/// Splits an architecture string at commas outside parentheses.
fn split_arch(arch: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in arch.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(arch[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(arch[start..].trim());
    parts.into_iter().filter(|s| !s.is_empty()).collect()
}

struct Frame<'a> {
    name: String,
    args: Vec<&'a str>,
    raw: &'a str,
}

impl<'a> Frame<'a> {
    fn parse(raw: &'a str) -> Result<Self> {
        let (name, args) = match raw.find('(') {
            Some(open) => {
                let close = raw
                    .rfind(')')
                    .filter(|&c| c > open)
                    .ok_or_else(|| Error::config(format!("unbalanced parentheses in {raw}")))?;
                let args = raw[open + 1..close]
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                (&raw[..open], args)
            }
            None => (raw, Vec::new()),
        };
        Ok(Self {
            name: name.trim().to_lowercase(),
            args,
            raw,
        })
    }

    /// The `i`th numeric argument, 0 when absent.
    fn num(&self, i: usize) -> Result<isize> {
        match self.args.get(i) {
            None => Ok(0),
            Some(s) => s
                .parse()
                .map_err(|_| Error::config(format!("malformed argument {s:?} in {}", self.raw))),
        }
    }

    fn len(&self, i: usize) -> Result<usize> {
        let n = self.num(i)?;
        usize::try_from(n).map_err(|_| Error::config(format!("negative length in {}", self.raw)))
    }
}

const KNOWN_FRAMES: &[&str] = &[
    "words",
    "tags",
    "lowercasewords",
    "biwords",
    "biword",
    "twotags",
    "threetags",
    "order",
    "wordtag",
    "wordtwotags",
    "allwordshapes",
    "allwordshapeconjunction",
    "naacl2003unknowns",
    "lnaacl2003unknowns",
    "caselessnaacl2003unknowns",
    "naacl2003conjunctions",
    "motleyunknown",
    "wordshapes",
    "wordshapeconjunction",
    "suffix",
    "prefix",
    "prefixsuffix",
    "capitalizationsuffix",
    "lctagfeatures",
    "nonalphanumeric",
    "numeric",
];

fn macro_expansion(name: &str) -> Option<&'static str> {
    match name {
        "left3words" => Some("words(-1,1),order(2)"),
        "left5words" => Some("words(-2,2),order(2)"),
        "generic" => Some("words(-1,1),order(2),biwords(-1,0),wordTag(0,-1)"),
        "bidirectional" => {
            Some("words(-1,1),order(-2,2),twoTags(-1,1),wordTag(0,-1),wordTag(0,1),biwords(-1,1)")
        }
        "bidirectional5words" => {
            Some("words(-2,2),order(-2,2),twoTags(-1,1),wordTag(0,-1),wordTag(0,1),biwords(-1,1)")
        }
        _ => None,
    }
}

fn motley(with_company: bool) -> Vec<Extractor> {
    let mut v = vec![
        Extractor::UpperCase,
        Extractor::HasDigit,
        Extractor::HasDash,
        Extractor::NoLowerCase,
        Extractor::LetterDigitDash,
    ];
    if with_company {
        v.push(Extractor::CompanyName);
    }
    v.push(Extractor::AllUpperCase);
    v.push(Extractor::UpperDigitDash);
    v
}

fn affixes(max: usize, position: isize) -> impl Iterator<Item = Extractor> {
    (1..=max)
        .map(move |len| Extractor::Suffix { len, position })
        .chain((1..=max).map(move |len| Extractor::Prefix { len, position }))
}

fn sentence_position_caps() -> Vec<Extractor> {
    vec![
        Extractor::StartSentenceCap,
        Extractor::MidSentenceCapC,
        Extractor::MidSentenceCap,
    ]
}

fn conjoin(a: Extractor, b: Extractor) -> Extractor {
    Extractor::Conjunction(Box::new(a), Box::new(b))
}

/// General and rare-word templates parsed from an architecture string.
#[derive(Debug, Default)]
pub struct Architecture {
    pub general: Vec<Extractor>,
    pub rare: Vec<Extractor>,
}

impl Architecture {
    /// Parses a comma-separated architecture description.
    ///
    /// The current-word template is always general template 0. Unrecognized
    /// frame names are logged and skipped.
    pub fn parse(arch: &str, tags: &TagInventory) -> Result<Self> {
        let mut out = Self {
            general: vec![Extractor::Word(0)],
            rare: Vec::new(),
        };
        out.parse_into(arch, tags)?;
        log::debug!(
            "architecture {arch:?}: {} general, {} rare templates",
            out.general.len(),
            out.rare.len()
        );
        Ok(out)
    }

    fn parse_into(&mut self, arch: &str, tags: &TagInventory) -> Result<()> {
        for raw in split_arch(arch) {
            let frame = Frame::parse(raw)?;
            if let Some(expansion) = macro_expansion(&frame.name) {
                self.parse_into(expansion, tags)?;
                continue;
            }
            if !KNOWN_FRAMES.contains(&frame.name.as_str()) {
                log::warn!("unrecognized architecture frame (ignored): {raw}");
                continue;
            }
            let (a, b) = (frame.num(0)?, frame.num(1)?);
            match frame.name.as_str() {
                "words" => self
                    .general
                    .extend((a..=b).filter(|&i| i != 0).map(Extractor::Word)),
                "tags" => self
                    .general
                    .extend((a..=b).filter(|&i| i != 0).map(Extractor::Tag)),
                "lowercasewords" => self.general.extend((a..=b).map(Extractor::LowerCaseWord)),
                "biwords" => self
                    .general
                    .extend((a..b).map(|i| Extractor::TwoWords(i, i + 1))),
                "biword" => self.general.push(Extractor::TwoWords(a.min(b), a.max(b))),
                "twotags" => self.general.push(Extractor::TwoTags(a.min(b), a.max(b))),
                "threetags" => {
                    let mut p = [a, b, frame.num(2)?];
                    p.sort_unstable();
                    self.general.push(Extractor::ThreeTags(p[0], p[1], p[2]));
                }
                "order" => {
                    let left = -a.abs();
                    if b < 0 {
                        return Err(Error::config(format!(
                            "right order must be non-negative in {raw}"
                        )));
                    }
                    for idx in left..=b {
                        match idx {
                            0 => {}
                            -1 | 1 => self.general.push(Extractor::Tag(idx)),
                            _ => self.general.push(Extractor::TagRun(idx)),
                        }
                    }
                }
                "wordtag" => self.general.push(Extractor::WordTag { word: a, tag: b }),
                "wordtwotags" => {
                    let c = frame.num(2)?;
                    self.general.push(Extractor::WordTwoTags {
                        word: a,
                        left: b.min(c),
                        right: b.max(c),
                    });
                }
                "allwordshapes" => self.general.extend((a..=b).map(Extractor::WordShape)),
                "allwordshapeconjunction" => {
                    self.general.push(Extractor::WordShapeConjunction(a, b))
                }
                "naacl2003unknowns" => {
                    self.rare.extend(motley(true));
                    self.rare.extend(sentence_position_caps());
                    self.rare.extend(affixes(10, 0));
                }
                "lnaacl2003unknowns" => {
                    self.rare.extend(motley(false));
                    self.rare.extend(sentence_position_caps());
                    self.rare.extend(affixes(10, 0));
                }
                "caselessnaacl2003unknowns" => {
                    self.rare.extend([
                        Extractor::HasDigit,
                        Extractor::HasDash,
                        Extractor::LetterDigitDash,
                        Extractor::CaselessCompanyName,
                    ]);
                    self.rare.extend(affixes(10, 0));
                }
                "naacl2003conjunctions" => {
                    let heads = [
                        Extractor::UpperCase,
                        Extractor::NoLowerCase,
                        Extractor::MidSentenceCap,
                        Extractor::StartSentenceCap,
                        Extractor::MidSentenceCapC,
                        Extractor::CapDistance,
                    ];
                    for head in heads {
                        for len in 1..=4 {
                            self.rare
                                .push(conjoin(head.clone(), Extractor::Suffix { len, position: 0 }));
                        }
                    }
                }
                "motleyunknown" => self.rare.extend(motley(true)),
                "wordshapes" => self.rare.extend((a..=b).map(Extractor::WordShape)),
                "wordshapeconjunction" => self.rare.push(Extractor::WordShapeConjunction(a, b)),
                "suffix" => {
                    let max = frame.len(0)?;
                    self.rare
                        .extend((1..=max).map(|len| Extractor::Suffix { len, position: b }));
                }
                "prefix" => {
                    let max = frame.len(0)?;
                    self.rare
                        .extend((1..=max).map(|len| Extractor::Prefix { len, position: b }));
                }
                "prefixsuffix" => {
                    for len in 1..=frame.len(0)? {
                        self.rare.push(conjoin(
                            Extractor::Prefix { len, position: 0 },
                            Extractor::Suffix { len, position: 0 },
                        ));
                    }
                }
                "capitalizationsuffix" => {
                    for len in 1..=frame.len(0)? {
                        self.rare.push(conjoin(
                            Extractor::UpperCase,
                            Extractor::Suffix { len, position: 0 },
                        ));
                    }
                }
                "lctagfeatures" => self.rare.extend(
                    tags.iter()
                        .map(|t| Extractor::CapitalizedSeenAs(t.to_string())),
                ),
                "nonalphanumeric" => self.rare.push(Extractor::NonAlphanumeric),
                "numeric" => self.rare.push(Extractor::Numeric),
                _ => log::warn!("unrecognized architecture frame (ignored): {raw}"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maxent::{dict::Dictionary, history::PairsHolder};

    fn sentence(words: &[(&str, &str)]) -> PairsHolder {
        let mut pairs = PairsHolder::new();
        for (w, t) in words {
            pairs.push(w, t);
        }
        pairs
    }

    fn inventory() -> TagInventory {
        TagInventory::for_tests(&["DT", "NN", "VBZ", ".$$."], &[".$$."])
    }

    #[test]
    fn word_and_tag_templates() {
        let pairs = sentence(&[("The", "DT"), ("dog", "NN"), ("runs", "VBZ")]);
        let dict = Dictionary::new(5);
        let h = History::new(&pairs, 0, 2, 1);
        assert_eq!(Extractor::Word(-1).extract(&h, &dict), "The");
        assert_eq!(Extractor::LowerCaseWord(-1).extract(&h, &dict), "the");
        assert_eq!(Extractor::Tag(-1).extract(&h, &dict), "DT");
        assert_eq!(Extractor::TwoTags(-1, 1).extract(&h, &dict), "DT!VBZ");
        assert_eq!(Extractor::TagRun(-2).extract(&h, &dict), "NA!DT");
        assert_eq!(Extractor::TagRun(2).extract(&h, &dict), "NA!VBZ");
        assert_eq!(
            Extractor::WordTag { word: 0, tag: -1 }.extract(&h, &dict),
            "DT!dog"
        );
        assert_eq!(Extractor::TwoWords(-1, 0).extract(&h, &dict), "The!dog");
    }

    #[test]
    fn rare_templates() {
        let pairs = sentence(&[("the", "DT"), ("Acme", "NNP"), ("Corp.", "NNP"), ("X-15", "NN")]);
        let mut dict = Dictionary::new(5);
        dict.add("acme", "NN");
        dict.add("Acme", "NNP");
        dict.add("Acme", "NNP");
        let h = History::new(&pairs, 0, 3, 1);
        assert_eq!(Extractor::CompanyName.extract(&h, &dict), "1");
        assert_eq!(Extractor::UpperCase.extract(&h, &dict), "1");
        assert_eq!(Extractor::HasDigit.extract(&h, &dict), NO_FEATURE);
        assert_eq!(Extractor::CapDistance.extract(&h, &dict), "start1");
        assert_eq!(
            Extractor::CapitalizedSeenAs("NNP".into()).extract(&h, &dict),
            "start1NNP"
        );
        assert_eq!(Extractor::MidSentenceCapC.extract(&h, &dict), "NN");
        assert_eq!(Extractor::StartSentenceCap.extract(&h, &dict), NO_FEATURE);
        assert_eq!(
            Extractor::Suffix { len: 2, position: 0 }.extract(&h, &dict),
            "me"
        );
        assert_eq!(
            Extractor::Prefix { len: 5, position: 0 }.extract(&h, &dict),
            "######"
        );

        let h = History::new(&pairs, 0, 3, 3);
        assert_eq!(Extractor::UpperDigitDash.extract(&h, &dict), "1");
        assert_eq!(Extractor::Numeric.extract(&h, &dict), NO_FEATURE);
        assert_eq!(Extractor::CapDistance.extract(&h, &dict), "start3");
    }

    #[test]
    fn conjunction_short_circuits_on_no_feature() {
        let pairs = sentence(&[("walks", "VBZ")]);
        let dict = Dictionary::new(5);
        let h = History::new(&pairs, 0, 0, 0);
        let upper = conjoin(Extractor::UpperCase, Extractor::Suffix { len: 1, position: 0 });
        assert_eq!(upper.extract(&h, &dict), NO_FEATURE);
        let dash = conjoin(
            Extractor::NonAlphanumeric,
            Extractor::Suffix { len: 1, position: 0 },
        );
        assert_eq!(dash.extract(&h, &dict), NO_FEATURE);
        let both = conjoin(
            Extractor::Prefix { len: 1, position: 0 },
            Extractor::Suffix { len: 1, position: 0 },
        );
        assert_eq!(both.extract(&h, &dict), "w:s");
        assert!(both.is_local());
    }

    #[test]
    fn locality_and_windows() {
        assert!(Extractor::Word(0).is_local());
        assert!(!Extractor::Word(1).is_local());
        assert!(!Extractor::Word(1).is_dynamic());
        assert!(Extractor::Tag(-2).is_dynamic());
        assert_eq!(Extractor::Tag(-2).left_context(), 2);
        assert_eq!(Extractor::Tag(-2).right_context(), 0);
        assert_eq!(Extractor::ThreeTags(-2, -1, 1).right_context(), 1);
        assert_eq!(Extractor::TagRun(3).right_context(), 3);
        assert!(Extractor::StartSentenceCap.is_dynamic());
        assert!(!Extractor::CapDistance.is_local());
        assert!(!Extractor::CapDistance.is_dynamic());
        assert!(conjoin(Extractor::MidSentenceCap, Extractor::UpperCase).is_dynamic());
    }

    #[test]
    fn validation() {
        assert!(Extractor::Tag(0).validate().is_err());
        assert!(Extractor::Suffix { len: 0, position: 0 }.validate().is_err());
        assert!(Extractor::WordShapeConjunction(1, -1).validate().is_err());
        assert!(Extractor::TagRun(-2).validate().is_ok());
    }

    #[test]
    fn word_shapes() {
        assert_eq!(word_shape("Dog"), "Xxx");
        assert_eq!(word_shape("1984"), "dddd");
        assert_eq!(word_shape("McDonald-Smith"), "Xx-Xxxx");
        assert_eq!(word_shape("a.b."), "x.x.");
    }

    #[test]
    fn parse_macros() {
        let arch = Architecture::parse("left3words,naacl2003unknowns", &inventory()).unwrap();
        assert_eq!(
            arch.general,
            vec![
                Extractor::Word(0),
                Extractor::Word(-1),
                Extractor::Word(1),
                Extractor::TagRun(-2),
                Extractor::Tag(-1),
            ]
        );
        assert_eq!(arch.rare.len(), 8 + 3 + 20);
        assert_eq!(arch.rare[0], Extractor::UpperCase);
    }

    #[test]
    fn parse_frames() {
        let arch = Architecture::parse(
            "tags(-2,1), biwords(-1,1), wordTwoTags(0,1,-1), suffix(3), lctagfeatures, bogus(1)",
            &inventory(),
        )
        .unwrap();
        assert_eq!(
            arch.general,
            vec![
                Extractor::Word(0),
                Extractor::Tag(-2),
                Extractor::Tag(-1),
                Extractor::Tag(1),
                Extractor::TwoWords(-1, 0),
                Extractor::TwoWords(0, 1),
                Extractor::WordTwoTags { word: 0, left: -1, right: 1 },
            ]
        );
        assert_eq!(arch.rare.len(), 3 + 4);
        assert_eq!(arch.rare[3], Extractor::CapitalizedSeenAs("DT".into()));
        assert!(arch.rare[3].precondition("DT"));
        assert!(!arch.rare[3].precondition("NN"));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            Architecture::parse("order(-1,-1)", &inventory()),
            Err(Error::Config(..))
        ));
        assert!(matches!(
            Architecture::parse("words(-1,x)", &inventory()),
            Err(Error::Config(..))
        ));
        assert!(matches!(
            Architecture::parse("words(-1,1", &inventory()),
            Err(Error::Config(..))
        ));
    }
}
