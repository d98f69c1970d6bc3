//! C FFI surface over a process-global decoder.

use once_cell::sync::Lazy;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use crate::layout::KeyLayout;
use crate::lexicon::{LanguageTag, Lexicon, MemoryLearnedStore};
use crate::{CancelToken, SwipeDecoder};
use glide_types::{DecodeError, Prediction, RawPoint};

struct GlobalDecoder {
    decoder: SwipeDecoder,
    layout: KeyLayout,
    lexicon: Lexicon,
    learned: MemoryLearnedStore,
    token: CancelToken,
}

static ENGINE: Lazy<Mutex<GlobalDecoder>> = Lazy::new(|| {
    Mutex::new(GlobalDecoder {
        decoder: SwipeDecoder::new(),
        layout: KeyLayout::qwerty(100.0),
        lexicon: Lexicon::new(),
        learned: MemoryLearnedStore::new(),
        token: CancelToken::new(),
    })
});

unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Returns the number of words loaded, or -1 on error.
#[no_mangle]
pub extern "C" fn glide_decoder_load_dictionary_str(content: *const c_char) -> i32 {
    let Some(content) = (unsafe { c_str(content) }) else {
        return -1;
    };
    let Ok(mut engine) = ENGINE.lock() else {
        return -1;
    };
    engine.lexicon.load_from_text(content);
    engine.lexicon.len() as i32
}

#[no_mangle]
pub extern "C" fn glide_decoder_word_count() -> i32 {
    match ENGINE.lock() {
        Ok(e) => e.lexicon.len() as i32,
        Err(_) => -1,
    }
}

/// Install a layout from `letter<TAB>x<TAB>y` lines with the given half
/// pitch. Returns the number of keys, or -1 on error.
#[no_mangle]
pub extern "C" fn glide_decoder_set_layout(spec: *const c_char, half_pitch: f32) -> i32 {
    let Some(spec) = (unsafe { c_str(spec) }) else {
        return -1;
    };
    let mut centroids = Vec::new();
    for line in spec.lines() {
        let mut parts = line.split('\t');
        let (Some(letter), Some(x), Some(y)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let (Some(c), Ok(x), Ok(y)) = (letter.chars().next(), x.parse(), y.parse()) else {
            continue;
        };
        centroids.push((c, glide_types::Point::new(x, y)));
    }
    let count = centroids.len() as i32;
    let Ok(mut engine) = ENGINE.lock() else {
        return -1;
    };
    engine.layout = KeyLayout::from_centroids(centroids, half_pitch);
    count
}

#[no_mangle]
pub extern "C" fn glide_decoder_learn(word: *const c_char) {
    if let Some(word) = unsafe { c_str(word) } {
        if let Ok(mut engine) = ENGINE.lock() {
            engine.learned.learn(word);
        }
    }
}

#[no_mangle]
pub extern "C" fn glide_decoder_blacklist(word: *const c_char) {
    if let Some(word) = unsafe { c_str(word) } {
        if let Ok(mut engine) = ENGINE.lock() {
            engine.learned.blacklist_word(word);
        }
    }
}

/// Decode a gesture given as a JSON array of `{"x":..,"y":..,"t_ms":..}`
/// points. Returns a JSON predictions array; caller must free it with
/// [`glide_decoder_free_string`]. Null on hard errors; `"[]"` when the
/// gesture produced nothing usable.
#[no_mangle]
pub extern "C" fn glide_decoder_decode(points_json: *const c_char, limit: i32) -> *mut c_char {
    let Some(json) = (unsafe { c_str(points_json) }) else {
        return std::ptr::null_mut();
    };
    let Ok(points) = serde_json::from_str::<Vec<RawPoint>>(json) else {
        return std::ptr::null_mut();
    };
    let Ok(mut engine) = ENGINE.lock() else {
        return std::ptr::null_mut();
    };

    let GlobalDecoder {
        decoder,
        layout,
        lexicon,
        learned,
        token,
    } = &mut *engine;

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

    let limited: Vec<&Prediction> = candidates.iter().take(limit.max(0) as usize).collect();
    let json = serde_json::to_string(&limited).unwrap_or_else(|_| "[]".to_string());
    match CString::new(json) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn glide_decoder_free_string(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}
