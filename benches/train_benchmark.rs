use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maxent_tagger::{TaggerConfig, Trainer};

const DT: [&str; 3] = ["the", "a", "this"];
const NN: [&str; 6] = ["dog", "cat", "bird", "horse", "child", "farmer"];
const VBZ: [&str; 5] = ["runs", "sleeps", "sings", "jumps", "reads"];

/// Deterministic `DT NN VBZ (DT NN)` sentences.
fn synthetic_corpus(n: usize) -> Vec<(Vec<&'static str>, Vec<&'static str>)> {
    (0..n)
        .map(|i| {
            let mut words = vec![DT[i % DT.len()], NN[i % NN.len()], VBZ[i % VBZ.len()]];
            let mut tags = vec!["DT", "NN", "VBZ"];
            if i % 2 == 0 {
                words.push(DT[(i / 2) % DT.len()]);
                words.push(NN[(i / 3) % NN.len()]);
                tags.extend(["DT", "NN"]);
            }
            (words, tags)
        })
        .collect()
}

fn train(corpus: &[(Vec<&str>, Vec<&str>)]) {
    let mut trainer = Trainer::new(TaggerConfig {
        arch: "left3words".to_string(),
        iterations: 50,
        ..Default::default()
    });
    for (words, tags) in corpus {
        trainer.append(words, tags).expect("failed to append sentence");
    }
    trainer.train().expect("failed to train");
}

fn train_benchmark(c: &mut Criterion) {
    let corpus = synthetic_corpus(200);
    c.bench_function("train", |b| b.iter(|| train(black_box(&corpus))));
}

criterion_group! {
    name = benchmarks;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = train_benchmark
}
criterion_main!(benchmarks);
