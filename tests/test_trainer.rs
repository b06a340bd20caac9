use maxent_tagger::{
    maxent::{extractor::Extractor, indexer::FeatureKey},
    Dataset, Error, TaggerConfig, Trainer,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(arch: &str) -> TaggerConfig {
    TaggerConfig {
        arch: arch.to_string(),
        cur_word_min_feature_thresh: 0,
        min_feature_thresh: 0,
        rare_word_min_feature_thresh: 0,
        ..Default::default()
    }
}

fn trainer(config: TaggerConfig) -> Trainer {
    init_logger();
    let mut trainer = Trainer::new(config);
    trainer
        .append(&["the", "dog", "runs"], &["DT", "NN", "VBZ"])
        .unwrap();
    trainer
        .append(&["the", "cat", "sleeps"], &["DT", "NN", "VBZ"])
        .unwrap();
    trainer
}

fn has_key(keys: &[FeatureKey], extractor: usize, value: &str) -> bool {
    keys.iter().any(|k| k.extractor == extractor && k.value == value)
}

#[test]
fn test_current_word_threshold_is_strict() {
    // "the" occurs twice
    let indexed = trainer(TaggerConfig {
        cur_word_min_feature_thresh: 1,
        ..config("")
    })
    .index()
    .unwrap();
    assert!(has_key(&indexed.keys, 0, "the"));
    assert!(!has_key(&indexed.keys, 0, "dog"));

    let indexed = trainer(TaggerConfig {
        cur_word_min_feature_thresh: 2,
        ..config("")
    })
    .index()
    .unwrap();
    assert!(!has_key(&indexed.keys, 0, "the"));
    assert!(indexed.keys.is_empty());
}

#[test]
fn test_general_threshold_does_not_touch_current_word() {
    let indexed = trainer(TaggerConfig {
        min_feature_thresh: 1,
        ..config("words(-1,0)")
    })
    .index()
    .unwrap();
    // "the" precedes both nouns and both sentences start outside the text
    let prev: Vec<_> = indexed
        .keys
        .iter()
        .filter(|k| k.extractor == 1)
        .map(|k| k.value.as_str())
        .collect();
    assert_eq!(prev, ["NA", "the"]);
    assert!(has_key(&indexed.keys, 0, "dog"));
}

#[test]
fn test_feature_numbering_is_sorted() {
    let indexed = trainer(config("words(-1,1),order(1)")).index().unwrap();
    assert!(indexed.keys.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(indexed.keys.len(), indexed.stats.features);
    for (f, key) in indexed.keys.iter().enumerate() {
        let row = indexed.table.get(key.extractor, &key.value).unwrap();
        assert_eq!(row[key.tag], f as i32);
    }
}

#[test]
fn test_all_tags_training_converges() {
    init_logger();
    let mut trainer = Trainer::new(TaggerConfig {
        all_tags: true,
        ..config("")
    });
    trainer.append(&["a", "b", "a"], &["X", "Y", "Y"]).unwrap();
    trainer.append(&["b", "a", "b"], &["X", "X", "Y"]).unwrap();
    let (model, report) = trainer.train_with_report().unwrap();

    // 3 word types (end-of-sentence included) times 3 tags
    assert_eq!(report.stats.features, 9);
    assert!(report.check.passed(), "{report:?}");
    assert!(report.solver.converged);
    // tags never seen with a word are pushed to the bound
    assert!(!report.solver.clamped_features.is_empty());
    assert!(report.is_suspect());
    model.validate().unwrap();
}

#[test]
fn test_unknown_closed_tag() {
    let result = trainer(TaggerConfig {
        closed_class_tags: vec!["ZZ".to_string()],
        ..config("")
    })
    .train();
    assert!(matches!(result, Err(Error::Config(..))));
}

#[test]
fn test_no_open_tags() {
    let result = trainer(TaggerConfig {
        closed_class_tags: vec!["DT".to_string(), "NN".to_string(), "VBZ".to_string()],
        ..config("")
    })
    .train();
    assert!(matches!(result, Err(Error::Config(..))));
}

#[test]
fn test_malformed_architecture() {
    let result = trainer(config("words(-1,1")).train();
    assert!(matches!(result, Err(Error::Config(..))));
    let result = trainer(config("order(1,-1)")).train();
    assert!(matches!(result, Err(Error::Config(..))));
}

#[test]
fn test_unknown_frame_is_ignored() {
    let model = trainer(config("words(-1,1),noSuchFrame(3)")).train().unwrap();
    assert_eq!(
        model.general().iter().cloned().collect::<Vec<_>>(),
        vec![Extractor::Word(0), Extractor::Word(-1), Extractor::Word(1)]
    );
}

#[test]
fn test_train_from_dataset() {
    init_logger();
    let text = "the\tDT\ndog\tNN\nruns\tVBZ\n\nthe\tDT\ncat\tNN\nsleeps\tVBZ\n";
    let mut ds = Dataset::default();
    ds.read(text.as_bytes()).unwrap();
    let mut trainer = Trainer::new(config("left3words"));
    for sentence in ds.iter() {
        trainer.append(&sentence.words, &sentence.tags).unwrap();
    }
    assert_eq!(trainer.num_sentences(), 2);
    let model = trainer.train().unwrap();
    assert_eq!(model.windows(), (2, 0));
    let tags = model.tagger().unwrap().tag(&["the", "cat", "runs"]).unwrap();
    assert_eq!(tags, ["DT", "NN", "VBZ"]);
}
