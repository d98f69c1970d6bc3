//! End-to-end decode scenarios on the 1000x400 QWERTY grid.

use glide_decoder::layout::KeyLayout;
use glide_decoder::lexicon::{LanguageTag, Lexicon, MemoryLearnedStore};
use glide_decoder::{trace_word, CancelToken, SwipeDecoder};
use glide_types::{Decoded, RawPoint};

const FIVE_WORDS: &str = "hello\t5000\nworld\t4000\nhelp\t3500\ntest\t3000\nword\t1800\n";

fn grid() -> KeyLayout {
    KeyLayout::qwerty(100.0)
}

fn lexicon(text: &str) -> Lexicon {
    let mut lex = Lexicon::new();
    lex.load_from_text(text);
    lex
}

fn decode(raw: &[RawPoint], lex: &Lexicon, learned: &MemoryLearnedStore) -> Decoded {
    let layout = grid();
    let mut decoder = SwipeDecoder::new();
    decoder
        .decode(
            raw,
            &layout,
            lex,
            learned,
            LanguageTag::En,
            None,
            &CancelToken::new(),
        )
        .expect("decodes")
}

fn words(decoded: &Decoded) -> Vec<&str> {
    decoded
        .candidates
        .iter()
        .map(|p| p.word.as_str())
        .collect()
}

#[test]
fn smooth_hello_wins_unambiguously() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();
    let raw = trace_word("hello", &grid(), 5.0);

    let decoded = decode(&raw, &lex, &learned);

    assert_eq!(decoded.candidates[0].word, "hello");
    assert!(!decoded.candidates[0].is_ambiguous);
    // Start-anchor gate: nothing far from h ever appears.
    assert!(!words(&decoded).contains(&"test"));
    assert!(!words(&decoded).contains(&"world"));
    if let Some(runner) = decoded.candidates.get(1) {
        assert!(decoded.candidates[0].score / runner.score > 1.15);
    }
}

#[test]
fn fast_start_short_of_h_still_decodes_hello() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();

    // Finger already moving when tracking starts: first report lands 20 px
    // left of h, en route to e.
    let mut raw = trace_word("hello", &grid(), 5.0);
    raw[0] = RawPoint::new(580.0, 150.0, 0);

    let decoded = decode(&raw, &lex, &learned);
    assert_eq!(decoded.candidates[0].word, "hello");
}

#[test]
fn dwell_on_i_yields_hi_and_gates_long_words() {
    let lex = lexicon("hello\t5000\nworld\t4000\nhelp\t3500\ntest\t3000\nword\t1800\nhi\t1200\n");
    let learned = MemoryLearnedStore::new();

    // h -> i, then a ~150 ms hover on i.
    let mut raw = trace_word("hi", &grid(), 5.0);
    let t0 = raw.last().unwrap().t_ms;
    for k in 1..=15u32 {
        raw.push(RawPoint::new(
            750.0 + (k % 2) as f32,
            50.0,
            t0 + k * 10,
        ));
    }

    let decoded = decode(&raw, &lex, &learned);
    assert_eq!(decoded.candidates[0].word, "hi");
    for p in &decoded.candidates {
        assert!(p.word.len() < 4, "{} survived the length gates", p.word);
    }
}

#[test]
fn noisy_world_beats_word() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();

    let mut raw = trace_word("world", &grid(), 5.0);
    // Two spurious loops mid-path.
    for at in [8usize, 30] {
        let at = at.min(raw.len() - 2);
        let p = raw[at];
        let loop_pts = [
            (p.x + 18.0, p.y - 18.0),
            (p.x + 25.0, p.y + 7.0),
            (p.x + 7.0, p.y + 18.0),
        ];
        for (k, (x, y)) in loop_pts.iter().enumerate() {
            raw.insert(at + 1 + k, RawPoint::new(*x, *y, p.t_ms + 1 + k as u32 * 3));
        }
    }
    // Re-stamp times monotonically after the inserts.
    for (i, p) in raw.iter_mut().enumerate() {
        p.t_ms = i as u32 * 10;
    }

    let decoded = decode(&raw, &lex, &learned);
    assert_eq!(decoded.candidates[0].word, "world");
}

#[test]
fn release_between_l_and_p_recovers_help() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();

    // h -> e -> l, then release drifting onto p's side.
    let mut raw = trace_word("hel", &grid(), 5.0);
    let t0 = raw.last().unwrap().t_ms;
    raw.push(RawPoint::new(920.0, 110.0, t0 + 10));
    raw.push(RawPoint::new(940.0, 70.0, t0 + 20));

    let decoded = decode(&raw, &lex, &learned);
    assert_eq!(decoded.candidates[0].word, "help");
    // A same-region reading is still offered.
    assert!(decoded.candidates.len() >= 2);
}

#[test]
fn blacklist_snapshot_applies_from_next_gesture() {
    let lex = lexicon(FIVE_WORDS);
    let mut learned = MemoryLearnedStore::new();
    let raw = trace_word("world", &grid(), 5.0);

    let first = decode(&raw, &lex, &learned);
    assert!(words(&first).contains(&"world"));

    learned.blacklist_word("world");
    let second = decode(&raw, &lex, &learned);
    assert!(!words(&second).contains(&"world"));
    assert_eq!(second.candidates[0].word, "word");
}

#[test]
fn decoding_is_deterministic() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();
    let raw = trace_word("hello", &grid(), 5.0);

    let a = decode(&raw, &lex, &learned);
    let b = decode(&raw, &lex, &learned);

    let fingerprint = |d: &Decoded| -> Vec<(String, u32)> {
        d.candidates
            .iter()
            .map(|p| (p.word.clone(), p.score.to_bits()))
            .collect()
    };
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn added_noise_never_raises_confidence() {
    let lex = lexicon(FIVE_WORDS);
    let learned = MemoryLearnedStore::new();

    let clean = trace_word("hello", &grid(), 5.0);
    let noisy: Vec<RawPoint> = clean
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let off = if i % 2 == 0 { 20.0 } else { -20.0 };
            RawPoint::new(p.x, p.y + off, p.t_ms)
        })
        .collect();

    let c_clean = decode(&clean, &lex, &learned).diagnostics.path_confidence;
    let c_noisy = decode(&noisy, &lex, &learned).diagnostics.path_confidence;
    assert!(c_noisy <= c_clean);
}

#[test]
fn learned_word_outranks_equal_geometry() {
    // "helio" is one key off "hello" on the same trajectory; once learned
    // heavily it must at least appear, and hello must still win on its own
    // exact trace.
    let lex = lexicon(FIVE_WORDS);
    let mut learned = MemoryLearnedStore::new();
    for _ in 0..50 {
        learned.learn("helio");
    }

    let decoded = decode(&trace_word("hello", &grid(), 5.0), &lex, &learned);
    assert_eq!(decoded.candidates[0].word, "hello");
    assert!(words(&decoded).contains(&"helio"));
}
