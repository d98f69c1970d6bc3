use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use glide_decoder::layout::KeyLayout;
use glide_decoder::lexicon::{LanguageTag, Lexicon, MemoryLearnedStore};
use glide_decoder::{trace_word, CancelToken, SwipeDecoder};
use glide_types::{DecodeError, Prediction, RawPoint};

#[derive(Parser, Debug)]
#[command(author, version, about = "Swipe-gesture word decoder")]
struct Args {
    /// Word to trace as a synthetic gesture and decode back
    word: Option<String>,

    /// Decode a gesture from a JSON file of {"x","y","t_ms"} points
    #[arg(short, long)]
    gesture: Option<PathBuf>,

    /// # of suggestions to show
    #[arg(short, long, default_value_t = 5)]
    limit: usize,

    /// Frequency list, word<TAB>count per line
    #[arg(short, long, default_value = "word_freq.txt")]
    freq: PathBuf,

    /// Key pitch of the synthetic QWERTY grid, px
    #[arg(long, default_value_t = 100.0)]
    pitch: f32,

    /// Tracing speed for synthetic gestures, px/ms
    #[arg(long, default_value_t = 5.0)]
    speed: f32,

    /// Decode budget in milliseconds (0 = none)
    #[arg(long, default_value_t = 0)]
    deadline_ms: u64,
}

fn load_lexicon(path: &PathBuf) -> Result<Lexicon> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open frequency file: {path:?}"))?;
    let mut text = String::new();
    for line in io::BufReader::new(file).lines() {
        text.push_str(&line?);
        text.push('\n');
    }
    let mut lexicon = Lexicon::new();
    lexicon.load_from_text(&text);
    Ok(lexicon)
}

fn load_gesture(path: &PathBuf) -> Result<Vec<RawPoint>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open gesture file: {path:?}"))?;
    let points = serde_json::from_reader(io::BufReader::new(file))
        .with_context(|| format!("Failed to parse gesture JSON: {path:?}"))?;
    Ok(points)
}

struct Session {
    decoder: SwipeDecoder,
    layout: KeyLayout,
    lexicon: Lexicon,
    learned: MemoryLearnedStore,
    token: CancelToken,
    limit: usize,
    deadline: Option<Duration>,
}

impl Session {
    fn decode(&mut self, label: &str, raw: &[RawPoint]) {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let result = self.decoder.decode(
            raw,
            &self.layout,
            &self.lexicon,
            &self.learned,
            LanguageTag::En,
            deadline,
            &self.token,
        );

        match result {
            Ok(decoded) => {
                print_table(label, &decoded.candidates, self.limit);
                println!(
                    "{}",
                    format!(
                        "confidence {:.2}, {} candidates, {} ms",
                        decoded.diagnostics.path_confidence,
                        decoded.diagnostics.candidate_count,
                        decoded.diagnostics.elapsed_ms
                    )
                    .dimmed()
                );
            }
            Err(DecodeError::DeadlineExceeded { partial }) => {
                println!("{}", "Deadline exceeded, partial results:".yellow());
                print_table(label, &partial, self.limit);
            }
            Err(DecodeError::NotASwipe) => {
                println!("{}", "Not a swipe (too short).".red());
            }
            Err(DecodeError::NoViableCandidate) => {
                println!("{}", "No candidate survived scoring.".red());
            }
            Err(e) => println!("{}", format!("Decode failed: {e}").red()),
        }
    }
}

fn print_table(label: &str, predictions: &[Prediction], limit: usize) {
    println!("\n{}", format!("Candidates for '{label}'").bold().cyan());
    println!("{}", "-".repeat(48));
    println!("{:<5} | {:<15} | {:<12} | {:<6}", "Rank", "Word", "Score", "Freq");
    println!("{}", "-".repeat(48));

    for (i, p) in predictions.iter().take(limit).enumerate() {
        let word = if p.is_ambiguous {
            format!("{:<15}", format!("{} *", p.word)).magenta()
        } else {
            format!("{:<15}", p.word).magenta()
        };
        println!(
            "{} | {} | {} | {}",
            format!("{:<5}", i + 1).yellow(),
            word,
            format!("{:<12.6}", p.score).green(),
            format!("{:<6}", p.freq).cyan()
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if !args.freq.exists() {
        println!(
            "{}",
            format!("Warning: frequency file {:?} not found.", args.freq).red()
        );
    }
    let lexicon = load_lexicon(&args.freq)?;
    println!(
        "{}",
        format!("Loaded {} words", lexicon.len()).dimmed()
    );

    let mut session = Session {
        decoder: SwipeDecoder::new(),
        layout: KeyLayout::qwerty(args.pitch),
        lexicon,
        learned: MemoryLearnedStore::new(),
        token: CancelToken::new(),
        limit: args.limit,
        deadline: (args.deadline_ms > 0).then(|| Duration::from_millis(args.deadline_ms)),
    };

    if let Some(path) = args.gesture {
        let raw = load_gesture(&path)?;
        session.decode(&path.display().to_string(), &raw);
        return Ok(());
    }

    if let Some(word) = args.word {
        let raw = trace_word(&word, &session.layout, args.speed);
        session.decode(&word, &raw);
        return Ok(());
    }

    println!(
        "{}",
        "Interactive mode: type a word to trace it as a gesture. 'exit' to stop."
            .yellow()
            .bold()
    );
    loop {
        print!("{}", "word> ".blue().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input == "exit" || input == "quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let raw = trace_word(&input, &session.layout, args.speed);
        session.decode(&input, &raw);
    }

    Ok(())
}
