use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{
    config::TaggerConfig,
    dict::Dictionary,
    extractor::Extractor,
    extractors::{windows, ExtractorSet},
    indexer::FeatureTable,
    tags::TagInventory,
    tagger::Tagger,
};

/// A trained tagger: everything decoding needs and nothing from training.
///
/// Feature numbers in `table` index into `lambda` and only mean something
/// together with the exact extractor lists they were produced with, so the
/// whole struct is persisted as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    config: TaggerConfig,
    tags: TagInventory,
    dict: Dictionary,
    general: ExtractorSet,
    rare: ExtractorSet,
    table: FeatureTable,
    lambda: Vec<f64>,
}

impl Model {
    pub fn new(
        config: TaggerConfig,
        tags: TagInventory,
        dict: Dictionary,
        general: ExtractorSet,
        rare: ExtractorSet,
        table: FeatureTable,
        lambda: Vec<f64>,
    ) -> Result<Self> {
        let model = Self {
            config,
            tags,
            dict,
            general,
            rare,
            table,
            lambda,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = std::fs::read(path)?;
        let model = Self::from_memory(&buffer)?;
        log::info!(
            "loaded model from {}: {} tags, {} features",
            path.display(),
            model.tags.len(),
            model.num_features()
        );
        Ok(model)
    }

    /// Reads a BSON or JSON model and validates it.
    pub fn from_memory(buffer: &[u8]) -> Result<Self> {
        let model: Self = match bson::from_slice(buffer) {
            Ok(model) => model,
            Err(bson_err) => match serde_json::from_slice(buffer) {
                Ok(model) => model,
                Err(json_err) => {
                    return Err(Error::invalid_model(format!(
                        "neither BSON ({bson_err}) nor JSON ({json_err})"
                    )))
                }
            },
        };
        model.validate()?;
        Ok(model)
    }

    /// Writes JSON when `path` ends in `.json`, BSON otherwise.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        } else {
            std::fs::write(path, bson::to_vec(self)?)?;
        }
        log::info!("model saved to {}", path.display());
        Ok(())
    }

    /// Structural checks run on every load.
    pub fn validate(&self) -> Result<()> {
        let templates = self.general.len() + self.rare.len();
        if self.general.is_empty() {
            return Err(Error::invalid_model("no general extractors"));
        }
        if self.table.num_templates() != templates {
            return Err(Error::invalid_model(format!(
                "lookup table has {} templates, extractors define {templates}",
                self.table.num_templates()
            )));
        }
        if self.table.num_tags() != self.tags.len() {
            return Err(Error::invalid_model(format!(
                "lookup table is built for {} tags, inventory has {}",
                self.table.num_tags(),
                self.tags.len()
            )));
        }
        let num_features = self.lambda.len() as i64;
        for (template, rows) in self.table.templates().iter().enumerate() {
            for (value, row) in rows {
                if row.len() != self.tags.len() {
                    return Err(Error::invalid_model(format!(
                        "row {template}/{value:?} has {} slots, expected {}",
                        row.len(),
                        self.tags.len()
                    )));
                }
                if let Some(&f) = row.iter().find(|&&f| f < -1 || i64::from(f) >= num_features) {
                    return Err(Error::invalid_model(format!(
                        "row {template}/{value:?} refers to feature {f}, model has {num_features}"
                    )));
                }
            }
        }
        if let Some(f) = self.lambda.iter().position(|l| !l.is_finite()) {
            return Err(Error::invalid_model(format!("weight {f} is not finite")));
        }
        self.tags
            .validate()
            .map_err(|e| Error::invalid_model(e.to_string()))?;
        self.config
            .validate()
            .map_err(|e| Error::invalid_model(e.to_string()))?;
        Ok(())
    }

    /// Drops zero-weight features and lookup rows left without features,
    /// renumbering the survivors. Returns the number of features dropped.
    pub fn simplify(&mut self) -> usize {
        let mut remap = vec![-1i32; self.lambda.len()];
        let mut kept = Vec::with_capacity(self.lambda.len());
        for (f, &l) in self.lambda.iter().enumerate() {
            if l != 0.0 {
                remap[f] = kept.len() as i32;
                kept.push(l);
            }
        }
        for rows in self.table.templates_mut() {
            rows.retain(|_, row| {
                for f in row.iter_mut() {
                    if *f >= 0 {
                        *f = remap[*f as usize];
                    }
                }
                row.iter().any(|&f| f >= 0)
            });
        }
        let dropped = self.lambda.len() - kept.len();
        self.lambda = kept;
        if dropped > 0 {
            log::info!("simplified model: dropped {dropped} zero-weight features");
        }
        dropped
    }

    /// Writes one `extractor<TAB>value<TAB>tag<TAB>weight` line per feature.
    pub fn dump<W: Write>(&self, mut writer: W) -> Result<()> {
        for (template, rows) in self.table.templates().iter().enumerate() {
            let extractor = self
                .extractor(template)
                .map_or_else(|| template.to_string(), |ex| format!("{ex:?}"));
            let mut values: Vec<_> = rows.iter().collect();
            values.sort_by(|a, b| a.0.cmp(b.0));
            for (value, row) in values {
                for (y, &f) in row.iter().enumerate() {
                    if f < 0 {
                        continue;
                    }
                    let tag = self.tags.tag_at(y).unwrap_or_default();
                    writeln!(writer, "{extractor}\t{value}\t{tag}\t{:.6}", self.lambda[f as usize])?;
                }
            }
        }
        Ok(())
    }

    /// Template `i` of the combined numbering: general first, then rare.
    pub fn extractor(&self, i: usize) -> Option<&Extractor> {
        if i < self.general.len() {
            self.general.get(i)
        } else {
            self.rare.get(i - self.general.len())
        }
    }

    pub fn tagger(&self) -> Result<Tagger<'_>> {
        Tagger::new(self)
    }

    /// Decoder window `(left, right)`.
    pub fn windows(&self) -> (usize, usize) {
        windows(&self.general, &self.rare)
    }

    pub fn num_features(&self) -> usize {
        self.lambda.len()
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn tags(&self) -> &TagInventory {
        &self.tags
    }

    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn general(&self) -> &ExtractorSet {
        &self.general
    }

    pub fn rare(&self) -> &ExtractorSet {
        &self.rare
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maxent::history::EOS_TAG;

    fn model() -> Model {
        let tags = TagInventory::for_tests(&["DT", "NN", EOS_TAG], &[EOS_TAG]);
        let mut dict = Dictionary::new(5);
        dict.add("the", "DT");
        dict.add("dog", "NN");
        let general = ExtractorSet::new(vec![Extractor::Word(0), Extractor::Tag(-1)]).unwrap();
        let rare = ExtractorSet::new(vec![Extractor::Suffix { len: 1, position: 0 }]).unwrap();
        let mut table = FeatureTable::new(3, 3);
        table.insert(0, "the", 0, 0);
        table.insert(0, "dog", 1, 1);
        table.insert(1, "DT", 1, 2);
        table.insert(2, "g", 1, 3);
        Model::new(
            TaggerConfig::default(),
            tags,
            dict,
            general,
            rare,
            table,
            vec![1.5, 0.0, 0.25, -0.5],
        )
        .unwrap()
    }

    #[test]
    fn simplify_drops_zero_weights() {
        let mut m = model();
        assert_eq!(m.simplify(), 1);
        assert_eq!(m.lambda(), &[1.5, 0.25, -0.5]);
        assert!(m.table().get(0, "dog").is_none());
        assert_eq!(m.table().get(1, "DT"), Some(&[-1, 1, -1][..]));
        assert_eq!(m.table().get(2, "g"), Some(&[-1, 2, -1][..]));
        m.validate().unwrap();
    }

    #[test]
    fn dump_lists_features() {
        let m = model();
        let mut out = Vec::new();
        m.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Word(0)\tdog\tNN\t0.000000");
        assert_eq!(lines[1], "Word(0)\tthe\tDT\t1.500000");
        assert!(lines[3].ends_with("\tg\tNN\t-0.500000"));
    }

    #[test]
    fn memory_round_trip() {
        let m = model();
        let bson = bson::to_vec(&m).unwrap();
        assert_eq!(Model::from_memory(&bson).unwrap(), m);
        let json = serde_json::to_vec(&m).unwrap();
        assert_eq!(Model::from_memory(&json).unwrap(), m);
    }

    #[test]
    fn rejects_out_of_range_feature() {
        let m = model();
        let mut json: serde_json::Value = serde_json::to_value(&m).unwrap();
        json["lambda"] = serde_json::json!([1.0]);
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(Model::from_memory(&bytes), Err(Error::InvalidModel(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Model::from_memory(b"definitely not a model"),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn windows_cover_both_sets() {
        assert_eq!(model().windows(), (1, 0));
    }
}
