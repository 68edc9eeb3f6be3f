//! Text segmentation: boundary-aware truncation and overlapping chunking.
//!
//! Long inputs are cut into overlapping chunks for map-reduce concept
//! extraction. Cuts always land on a natural boundary chosen from a tiered
//! priority list, and never inside a multi-byte codepoint.

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Fraction of the window (at its end) searched for a natural boundary.
const BOUNDARY_SEARCH_FRACTION: usize = 30;

/// Byte offset of the `n`-th character, or the end of the string.
fn byte_at_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// A period preceded by a 1–2 letter capitalized token (`Dr.`, `Mr.`, the
/// inner dots of `U.S.`) is an abbreviation, not a sentence end.
fn is_abbreviation(text: &str, dot_byte: usize) -> bool {
    let mut token_len = 0usize;
    let mut first_char = ' ';
    for c in text[..dot_byte].chars().rev() {
        if c.is_alphabetic() {
            token_len += 1;
            first_char = c;
            if token_len > 2 {
                return false;
            }
        } else {
            break;
        }
    }
    token_len >= 1 && token_len <= 2 && first_char.is_uppercase()
}

/// Return a prefix of up to `max_chars` characters that ends at the best
/// natural boundary found in the last 30% of the window.
///
/// Boundary priority: sentence terminator (`.!?` followed by whitespace,
/// abbreviation-filtered), paragraph break, heading line, newline, word
/// boundary, character boundary. The cut never splits a multi-byte
/// codepoint: all returned slices end on a char boundary by construction.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let total_chars = text.chars().count();
    if total_chars <= max_chars {
        return text;
    }

    let hard_end = byte_at_char(text, max_chars);
    let window_start_char = max_chars - (max_chars * BOUNDARY_SEARCH_FRACTION / 100).max(1);
    let window_start = byte_at_char(text, window_start_char);
    let window = &text[window_start..hard_end];

    // Tier 1: sentence terminator followed by whitespace.
    let mut sentence_end: Option<usize> = None;
    for (i, c) in window.char_indices() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let abs = window_start + i;
        let after = abs + c.len_utf8();
        let followed_by_ws = text[after..].chars().next().is_some_and(char::is_whitespace);
        if !followed_by_ws {
            continue;
        }
        if c == '.' && is_abbreviation(text, abs) {
            continue;
        }
        sentence_end = Some(after);
    }
    if let Some(end) = sentence_end {
        return &text[..end];
    }

    // Tier 2: paragraph break.
    if let Some(i) = window.rfind("\n\n") {
        return &text[..window_start + i + 2];
    }

    // Tier 3: heading line. Cut before the heading so it opens the next chunk.
    if let Some(i) = window.rfind("\n# ") {
        return &text[..window_start + i + 1];
    }

    // Tier 4: newline.
    if let Some(i) = window.rfind('\n') {
        return &text[..window_start + i + 1];
    }

    // Tier 5: word boundary.
    if let Some((i, _)) = window
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .next_back()
    {
        return &text[..window_start + i];
    }

    // Tier 6: plain character boundary.
    &text[..hard_end]
}

/// Partition `text` into overlapping chunks, each ending at a natural
/// boundary per [`truncate_at_boundary`].
///
/// The next chunk starts `overlap` characters before the previous chunk's
/// end, advanced rightward to the start of the next word so chunks open
/// cleanly. Every input character appears in at least one chunk; adjacent
/// chunks share at most `overlap` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);

    let mut chunks = Vec::new();
    let mut pos = 0usize;

    loop {
        let rest = &text[pos..];
        let rest_chars = rest.chars().count();
        if rest_chars <= chunk_size {
            chunks.push(rest.to_string());
            break;
        }

        let mut piece = truncate_at_boundary(rest, chunk_size);
        if piece.is_empty() {
            // Degenerate tiny window (leading whitespace, chunk_size of a few
            // chars): take one full character to keep making progress.
            piece = &rest[..rest.chars().next().map_or(0, char::len_utf8)];
        }
        chunks.push(piece.to_string());
        let end = pos + piece.len();

        let piece_chars = piece.chars().count();
        let back = overlap.min(piece_chars.saturating_sub(1));
        let mut start = pos + byte_at_char(piece, piece_chars - back);

        // Advance to the next word start inside the overlap region. Skipped
        // characters are already covered by the chunk just pushed.
        let opens_mid_word = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_whitespace());
        if opens_mid_word {
            if let Some(i) = text[start..end].find(char::is_whitespace) {
                let ws = start + i;
                start = text[ws..]
                    .char_indices()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(end, |(j, _)| ws + j)
                    .min(end);
            }
        }

        // start is always a char boundary in (pos, end]: progress holds even
        // when the overlap region is pure whitespace.
        pos = start;
    }

    chunks
}
