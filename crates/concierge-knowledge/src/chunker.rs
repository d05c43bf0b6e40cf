//! Document chunking: overlapping fixed-size character windows.
//!
//! Window `i` starts at `i * (max_len - overlap)` characters, so the last
//! `overlap` characters of a window repeat at the start of the next one.
//! Lengths are counted in `char`s, never bytes, so multi-byte text is safe.

use concierge_core::error::{ConciergeError, Result};

fn check_params(max_len: usize, overlap: usize) -> Result<usize> {
    if max_len == 0 {
        return Err(ConciergeError::Config("chunk size must be > 0".into()));
    }
    if overlap >= max_len {
        return Err(ConciergeError::Config(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({max_len})"
        )));
    }
    Ok(max_len - overlap)
}

/// Raw, untrimmed windows over `body` as string slices.
pub fn windows(body: &str, max_len: usize, overlap: usize) -> Result<Vec<&str>> {
    let step = check_params(max_len, overlap)?;

    // Byte offset of every char boundary, plus the end of the string.
    let mut bounds: Vec<usize> = body.char_indices().map(|(i, _)| i).collect();
    let char_len = bounds.len();
    bounds.push(body.len());

    let mut out = Vec::with_capacity(char_len.div_ceil(step));
    let mut start = 0usize;
    while start < char_len {
        let end = (start + max_len).min(char_len);
        out.push(&body[bounds[start]..bounds[end]]);
        if end == char_len {
            break;
        }
        start += step;
    }
    Ok(out)
}

/// Split a body into trimmed, non-empty chunks of at most `max_len` chars.
pub fn chunk(body: &str, max_len: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(windows(body, max_len, overlap)?
        .into_iter()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect())
}
