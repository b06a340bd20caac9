use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{Parser, Subcommand};
use maxent_tagger::{
    maxent::TagDictionary, Dataset, Error, Evaluation, Model, Result, Scoring, TaggerConfig,
    Trainer,
};

#[derive(Debug, Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
struct Argv {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a model from `word<TAB>tag` files
    Train {
        /// write the model to this file (MODEL); `.json` selects JSON
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
        /// read the configuration from a JSON file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// set a configuration parameter
        #[arg(short, value_name = "NAME=VALUE")]
        parameters: Vec<String>,
        #[arg(required = true, value_name = "FILE")]
        datasets: Vec<PathBuf>,
    },
    /// Tag files with one word per line and blank lines between sentences
    Tag {
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
        /// score only candidate tags, giving every other tag this score
        #[arg(long, value_name = "SCORE")]
        approximate: Option<f64>,
        /// print the log score of each sentence
        #[arg(short, long)]
        probability: bool,
        #[arg(required = true, value_name = "FILE")]
        datasets: Vec<PathBuf>,
    },
    /// Report the performance of a model on `word<TAB>tag` files
    Test {
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
        #[arg(required = true, value_name = "FILE")]
        datasets: Vec<PathBuf>,
    },
    /// List every feature of a model with its weight
    Dump {
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
    },
}

fn read_words(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut sentences = Vec::new();
    let mut words = Vec::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        let word = line.split('\t').next().unwrap_or_default().trim();
        if word.is_empty() {
            if !words.is_empty() {
                sentences.push(std::mem::take(&mut words));
            }
        } else {
            words.push(word.to_string());
        }
    }
    if !words.is_empty() {
        sentences.push(words);
    }
    Ok(sentences)
}

fn train(
    model: &Path,
    config: Option<&Path>,
    parameters: &[String],
    datasets: &[PathBuf],
) -> Result<()> {
    let config = match config {
        Some(path) => TaggerConfig::from_file(path)?,
        None => TaggerConfig::default(),
    };
    let mut trainer = Trainer::new(config);
    for s in parameters {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| Error::invalid_parameter(s, ""))?;
        trainer.set(name.trim(), value.trim())?;
    }
    for path in datasets {
        let mut ds = Dataset::default();
        ds.read_file(path)?;
        log::info!("{}: {} sentences", path.display(), ds.len());
        for sentence in ds.iter() {
            trainer.append(&sentence.words, &sentence.tags)?;
        }
    }
    let (m, report) = trainer.train_with_report()?;
    log::info!("{report:?}");
    m.save(model)
}

fn tag(model: &Path, approximate: Option<f64>, probability: bool, datasets: &[PathBuf]) -> Result<()> {
    let model = Model::open(model)?;
    let mut tagger = model.tagger()?;
    if let Some(default_score) = approximate {
        if !(default_score > 0.0) {
            return Err(Error::invalid_parameter("approximate", &default_score.to_string()));
        }
        tagger = tagger.with_scoring(Scoring::Approximate { default_score });
    }
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for path in datasets {
        for words in read_words(path)? {
            let tagging = tagger.tag_sentence(&words, &[])?;
            if probability {
                writeln!(out, "@score\t{:.6}", tagging.score)?;
            }
            for (word, tag) in words.iter().zip(&tagging.tags) {
                writeln!(out, "{word}/{tag}")?;
            }
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn test(model: &Path, datasets: &[PathBuf]) -> Result<()> {
    let model = Model::open(model)?;
    let tagger = model.tagger()?;
    let mut evaluation = Evaluation::default();
    let begin = Instant::now();
    let mut n = 0;
    for path in datasets {
        let mut ds = Dataset::default();
        ds.read_file(path)?;
        for sentence in ds.iter() {
            let prediction = tagger.tag(&sentence.words)?;
            let unknown: Vec<bool> = sentence
                .words
                .iter()
                .map(|w| model.dict().is_unknown(w))
                .collect();
            evaluation.accumulate(&sentence.tags, &prediction, &unknown);
            n += 1;
        }
    }
    evaluation.evaluate();
    println!("{evaluation}");
    let sec = begin.elapsed().as_secs_f64();
    println!("Elapsed time: {sec:.3} [sec] ({:.1} [instance/sec])", n as f64 / sec);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let argv = Argv::parse();
    log::debug!("argv: {:?}", argv);
    match argv.command {
        Command::Train {
            model,
            config,
            parameters,
            datasets,
        } => train(&model, config.as_deref(), &parameters, &datasets),
        Command::Tag {
            model,
            approximate,
            probability,
            datasets,
        } => tag(&model, approximate, probability, &datasets),
        Command::Test { model, datasets } => test(&model, &datasets),
        Command::Dump { model } => {
            let model = Model::open(model)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            model.dump(&mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}
