//! Byte-level helpers shared by chunks and cursors: UTF-8 stepping,
//! character classes for word motion, and display-width measurement.

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    Text,
    Whitespace,
    Punctuation,
}

/// Classify a single byte. Every byte of a multi-byte code point counts as text,
/// so a run of one class never ends inside a code point.
pub fn character_class(byte: u8) -> CharacterClass {
    if byte >= 0x80 || byte.is_ascii_alphanumeric() || byte == b'_' {
        CharacterClass::Text
    } else if byte.is_ascii_whitespace() {
        CharacterClass::Whitespace
    } else {
        CharacterClass::Punctuation
    }
}

pub fn is_continuation_byte(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Length in bytes of the code point starting with `lead`.
pub fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// Offset of the code point that ends right before `offset`.
pub fn prev_char_boundary(bytes: &[u8], offset: usize) -> usize {
    let mut position = offset.saturating_sub(1);
    while position > 0 && is_continuation_byte(bytes[position]) {
        position -= 1;
    }
    position
}

fn char_width(ch: char, column: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        tab_width - column % tab_width
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Display width of `text` in terminal cells, expanding tabs to `tab_width` stops.
pub fn display_width(text: &str, tab_width: usize) -> usize {
    text.chars()
        .fold(0, |column, ch| column + char_width(ch, column, tab_width))
}

/// Byte offset in `text` whose display column is closest to `target`.
pub fn offset_for_width(text: &str, target: usize, tab_width: usize) -> usize {
    let mut column = 0;
    for (offset, ch) in text.char_indices() {
        let width = char_width(ch, column, tab_width);
        if column + width > target {
            // Snap to whichever edge of this character is nearer
            return if target - column <= column + width - target {
                offset
            } else {
                offset + ch.len_utf8()
            };
        }
        column += width;
    }
    text.len()
}
