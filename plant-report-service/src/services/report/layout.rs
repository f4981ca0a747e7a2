//! Text shaping for the report: paragraph splitting, Helvetica metrics and
//! greedy word wrapping. Everything here is in PDF points.

/// Helvetica advance widths (1/1000 em) for the printable ASCII range
/// `0x20..=0x7e`, from the standard Adobe font metrics.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 222, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    222, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica widths for the Latin-1 half of WinAnsiEncoding, `0xa0..=0xff`.
/// These code points coincide with Unicode `U+00A0..=U+00FF`.
const HELVETICA_LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // NBSP..'¯'
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // '°'..'¿'
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 'À'..'Ï'
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 'Ð'..'ß'
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 'à'..'ï'
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 'ð'..'ÿ'
];

/// The `0x80..=0x9f` block of WinAnsiEncoding, which maps to scattered
/// Unicode code points, with their Helvetica widths.
const WIN_ANSI_EXTRAS: [(char, u16); 27] = [
    ('\u{20ac}', 556),  // €
    ('\u{201a}', 222),  // ‚
    ('\u{0192}', 556),  // ƒ
    ('\u{201e}', 333),  // „
    ('\u{2026}', 1000), // …
    ('\u{2020}', 556),  // †
    ('\u{2021}', 556),  // ‡
    ('\u{02c6}', 333),  // ˆ
    ('\u{2030}', 1000), // ‰
    ('\u{0160}', 667),  // Š
    ('\u{2039}', 333),  // ‹
    ('\u{0152}', 1000), // Œ
    ('\u{017d}', 611),  // Ž
    ('\u{2018}', 222),  // ‘
    ('\u{2019}', 222),  // ’
    ('\u{201c}', 333),  // “
    ('\u{201d}', 333),  // ”
    ('\u{2022}', 350),  // •
    ('\u{2013}', 556),  // –
    ('\u{2014}', 1000), // —
    ('\u{02dc}', 333),  // ˜
    ('\u{2122}', 1000), // ™
    ('\u{0161}', 500),  // š
    ('\u{203a}', 333),  // ›
    ('\u{0153}', 944),  // œ
    ('\u{017e}', 500),  // ž
    ('\u{0178}', 667),  // Ÿ
];

/// Width used for anything outside WinAnsiEncoding.
const FALLBACK_WIDTH: u16 = 556;

/// Helvetica ascender, used to place the baseline below a line's top edge.
pub const ASCENT: f32 = 0.718;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.156;

pub fn line_height(font_size: f32) -> f32 {
    font_size * LINE_HEIGHT
}

/// Rendered width of `text` at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    units as f32 * font_size / 1000.0
}

/// Advance width of `c` in 1/1000 em, or `None` when WinAnsiEncoding has
/// no slot for it.
fn win_ansi_width(c: char) -> Option<u16> {
    match c as u32 {
        code @ 0x20..=0x7e => Some(HELVETICA_WIDTHS[(code - 0x20) as usize]),
        code @ 0xa0..=0xff => Some(HELVETICA_LATIN1_WIDTHS[(code - 0xa0) as usize]),
        _ => WIN_ANSI_EXTRAS
            .iter()
            .find(|(extra, _)| *extra == c)
            .map(|(_, width)| *width),
    }
}

fn char_width(c: char) -> u16 {
    win_ansi_width(c).unwrap_or(FALLBACK_WIDTH)
}

/// Map text onto what the built-in Helvetica font can display.
///
/// Everything WinAnsiEncoding covers is kept, which includes Western
/// European letters and typographic punctuation. Other spaces and dashes
/// are folded to ASCII, and anything else becomes `?`.
pub fn to_printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push(c),
            // Non-breaking space would defeat word wrapping
            '\t' | '\u{a0}' | '\u{2000}'..='\u{200a}' | '\u{202f}' => out.push(' '),
            '\r' | '\u{ad}' | '\u{200b}'..='\u{200d}' | '\u{feff}' => {}
            c if win_ansi_width(c).is_some() => out.push(c),
            '\u{2032}' => out.push('\''),
            '\u{2033}' => out.push('"'),
            '\u{2010}'..='\u{2012}' | '\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2043}' | '\u{25aa}' | '\u{25cf}' => out.push('\u{2022}'),
            _ => out.push('?'),
        }
    }
    out
}

/// Normalise line endings, collapse runs of blank lines and split the
/// analysis text into paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let unified = text.replace("\r\n", "\n");

    let mut collapsed = String::with_capacity(unified.len());
    let mut newlines = 0;
    for c in unified.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        match newlines {
            0 => {}
            1 => collapsed.push('\n'),
            _ => collapsed.push_str("\n\n"),
        }
        newlines = 0;
        collapsed.push(c);
    }

    collapsed
        .trim()
        .split("\n\n")
        .map(str::to_string)
        .collect()
}

/// Break a paragraph into lines no wider than `max_width`.
///
/// Single newlines are hard breaks. Words are never split unless a single
/// word is wider than the whole line.
pub fn wrap_text(paragraph: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let space = text_width(" ", font_size);
    let mut lines = Vec::new();

    for hard_line in paragraph.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in hard_line.split_whitespace() {
            let word_width = text_width(word, font_size);

            if !current.is_empty() && current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
            } else {
                let mut pieces = break_word(word, font_size, max_width);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                current_width = text_width(&last, font_size);
                current = last;
            }
        }

        lines.push(current);
    }

    lines
}

fn break_word(word: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0.0;

    for c in word.chars() {
        let w = f32::from(char_width(c)) * font_size / 1000.0;
        if !piece.is_empty() && width + w > max_width {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    pieces.push(piece);
    pieces
}
