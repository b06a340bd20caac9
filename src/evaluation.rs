use std::{collections::BTreeMap, fmt::Display, iter::zip};

/// Tag-wise performance values.
#[derive(Debug, Default, Clone, PartialEq)]
struct TagMeasure {
    /// Number of correct predictions.
    num_correct: usize,
    /// Occurrences of the tag in the reference.
    num_observation: usize,
    num_prediction: usize,
    precision: f64,
    recall: f64,
    fmeasure: f64,
}

/// Overall performance of a tagger against reference tags.
#[derive(Debug, Default, Clone)]
pub struct Evaluation {
    tbl: BTreeMap<String, TagMeasure>,

    item_total_correct: usize,
    item_total_num: usize,
    item_accuracy: f64,

    /// Tokens whose word the model never saw.
    unknown_total_correct: usize,
    unknown_total_num: usize,
    unknown_accuracy: f64,

    inst_total_correct: usize,
    inst_total_num: usize,
    inst_accuracy: f64,

    macro_precision: f64,
    macro_recall: f64,
    macro_fmeasure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimation {
    pub item_accuracy: f64,
    pub unknown_accuracy: f64,
    pub sentence_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl Evaluation {
    /// Adds one sentence. `unknown` marks words absent from the model's
    /// dictionary; it may be empty.
    pub fn accumulate<R: AsRef<str>, P: AsRef<str>>(&mut self, reference: &[R], prediction: &[P], unknown: &[bool]) {
        let mut matched = 0;
        for (i, (r, p)) in zip(reference, prediction).enumerate() {
            let (r, p) = (r.as_ref(), p.as_ref());
            self.tbl.entry(r.to_string()).or_default().num_observation += 1;
            self.tbl.entry(p.to_string()).or_default().num_prediction += 1;
            let correct = r == p;
            if correct {
                self.tbl.entry(r.to_string()).or_default().num_correct += 1;
                matched += 1;
                self.item_total_correct += 1;
            }
            if unknown.get(i).copied().unwrap_or(false) {
                self.unknown_total_num += 1;
                if correct {
                    self.unknown_total_correct += 1;
                }
            }
            self.item_total_num += 1;
        }

        if matched == reference.len() && reference.len() == prediction.len() {
            self.inst_total_correct += 1;
        }
        self.inst_total_num += 1;
    }

    pub fn evaluate(&mut self) -> Estimation {
        self.macro_precision = 0.0;
        self.macro_recall = 0.0;
        self.macro_fmeasure = 0.0;
        let mut num_tags = 0;
        for lev in self.tbl.values_mut() {
            lev.precision = 0.0;
            lev.recall = 0.0;
            lev.fmeasure = 0.0;
            if lev.num_observation == 0 {
                continue;
            }
            num_tags += 1;
            if lev.num_prediction > 0 {
                lev.precision = lev.num_correct as f64 / lev.num_prediction as f64;
            }
            lev.recall = lev.num_correct as f64 / lev.num_observation as f64;
            if lev.precision + lev.recall > 0.0 {
                lev.fmeasure = lev.precision * lev.recall * 2.0 / (lev.precision + lev.recall);
            }
            self.macro_precision += lev.precision;
            self.macro_recall += lev.recall;
            self.macro_fmeasure += lev.fmeasure;
        }
        if num_tags > 0 {
            self.macro_precision /= num_tags as f64;
            self.macro_recall /= num_tags as f64;
            self.macro_fmeasure /= num_tags as f64;
        }

        self.item_accuracy = ratio(self.item_total_correct, self.item_total_num);
        self.unknown_accuracy = ratio(self.unknown_total_correct, self.unknown_total_num);
        self.inst_accuracy = ratio(self.inst_total_correct, self.inst_total_num);
        Estimation {
            item_accuracy: self.item_accuracy,
            unknown_accuracy: self.unknown_accuracy,
            sentence_accuracy: self.inst_accuracy,
            precision: self.macro_precision,
            recall: self.macro_recall,
            fmeasure: self.macro_fmeasure,
        }
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Performance by tag (#match, #model, #ref) (precision, recall, F1):")?;
        for (tag, lev) in &self.tbl {
            if lev.num_observation == 0 {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) (******, ******, ******)",
                    tag, lev.num_correct, lev.num_prediction, lev.num_observation
                )?;
            } else {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    tag,
                    lev.num_correct,
                    lev.num_prediction,
                    lev.num_observation,
                    lev.precision,
                    lev.recall,
                    lev.fmeasure
                )?;
            }
        }
        writeln!(
            f,
            "Macro-average precision, recall, F1: ({:.4}, {:.4}, {:.4})",
            self.macro_precision, self.macro_recall, self.macro_fmeasure
        )?;
        writeln!(
            f,
            "Item accuracy: {}/{} => {:.4}",
            self.item_total_correct, self.item_total_num, self.item_accuracy
        )?;
        writeln!(
            f,
            "Unknown word accuracy: {}/{} => {:.4}",
            self.unknown_total_correct, self.unknown_total_num, self.unknown_accuracy
        )?;
        writeln!(
            f,
            "Sequence accuracy: {}/{} => {:.4}",
            self.inst_total_correct, self.inst_total_num, self.inst_accuracy
        )
    }
}
