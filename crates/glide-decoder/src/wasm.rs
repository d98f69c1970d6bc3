//! Browser surface: a thread-local decoder driven through JSON strings.

use std::cell::RefCell;
use wasm_bindgen::prelude::*;

use crate::layout::KeyLayout;
use crate::lexicon::{LanguageTag, Lexicon, MemoryLearnedStore};
use crate::{CancelToken, SwipeDecoder};
use glide_types::{DecodeError, RawPoint};

struct WasmState {
    decoder: SwipeDecoder,
    layout: KeyLayout,
    lexicon: Lexicon,
    learned: MemoryLearnedStore,
    token: CancelToken,
}

thread_local! {
    static STATE: RefCell<Option<WasmState>> = const { RefCell::new(None) };
}

/// Load a `word<TAB>count` frequency list and reset decoder state.
#[wasm_bindgen]
pub fn init_dictionary(freq_text: &str) -> usize {
    let mut lexicon = Lexicon::new();
    lexicon.load_from_text(freq_text);
    let count = lexicon.len();

    STATE.with(|s| {
        *s.borrow_mut() = Some(WasmState {
            decoder: SwipeDecoder::new(),
            layout: KeyLayout::qwerty(100.0),
            lexicon,
            learned: MemoryLearnedStore::new(),
            token: CancelToken::new(),
        });
    });
    count
}

#[wasm_bindgen]
pub fn learn_word(word: &str) {
    STATE.with(|s| {
        if let Some(state) = s.borrow_mut().as_mut() {
            state.learned.learn(word);
        }
    });
}

#[wasm_bindgen]
pub fn blacklist_word(word: &str) {
    STATE.with(|s| {
        if let Some(state) = s.borrow_mut().as_mut() {
            state.learned.blacklist_word(word);
        }
    });
}

/// Decode a JSON array of `{"x":..,"y":..,"t_ms":..}` points into a JSON
/// predictions array.
#[wasm_bindgen]
pub fn decode_gesture(points_json: &str, limit: usize) -> String {
    let Ok(points) = serde_json::from_str::<Vec<RawPoint>>(points_json) else {
        return "[]".to_string();
    };

    STATE.with(|s| {
        let mut state = s.borrow_mut();
        let Some(state) = state.as_mut() else {
            return "[]".to_string();
        };

        let WasmState {
            decoder,
            layout,
            lexicon,
            learned,
            token,
        } = state;

        let candidates = match decoder.decode(
            &points,
            layout,
            lexicon,
            learned,
            LanguageTag::En,
            None,
            token,
        ) {
            Ok(decoded) => decoded.candidates,
            Err(DecodeError::DeadlineExceeded { partial }) => partial,
            Err(_) => Vec::new(),
        };

        let limited: Vec<_> = candidates.into_iter().take(limit).collect();
        serde_json::to_string(&limited).unwrap_or_else(|_| "[]".to_string())
    })
}
