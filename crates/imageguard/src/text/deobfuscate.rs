//! Text de-obfuscation: homoglyph normalization, leetspeak and ROT13.
//!
//! Each transform is pure and idempotent on already-canonical text. The
//! combined obfuscation score is the maximum of the per-transform scores and
//! feeds the visible-text module's risk formula.

use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

/// Injection vocabulary used to decide whether a decoded form is more
/// suspicious than the input.
const INJECTION_KEYWORDS: [&str; 10] = [
    "ignore",
    "system",
    "prompt",
    "instruction",
    "bypass",
    "forget",
    "disregard",
    "pretend",
    "role",
    "jailbreak",
];

/// Writing system observed among alphabetic characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
    Fullwidth,
    Common,
    Other,
}

fn classify_script(c: char) -> Script {
    match c {
        'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => Script::Latin,
        '\u{0400}'..='\u{04FF}' => Script::Cyrillic,
        '\u{0370}'..='\u{03FF}' => Script::Greek,
        '\u{FF21}'..='\u{FF3A}' | '\u{FF41}'..='\u{FF5A}' => Script::Fullwidth,
        '\u{02B0}'..='\u{02FF}' => Script::Common,
        _ => Script::Other,
    }
}

/// Confusables table: visually Latin-like code points and their ASCII
/// equivalents. Zero-width code points map to the empty string.
static CONFUSABLES: Lazy<AHashMap<char, &'static str>> = Lazy::new(|| {
    let entries: &[(char, &str)] = &[
        // Cyrillic lowercase
        ('а', "a"),
        ('е', "e"),
        ('о', "o"),
        ('р', "p"),
        ('с', "c"),
        ('у', "y"),
        ('х', "x"),
        ('і', "i"),
        ('ј', "j"),
        ('ѕ', "s"),
        ('ԛ', "q"),
        ('ԝ', "w"),
        ('ь', "b"),
        // Cyrillic uppercase
        ('А', "A"),
        ('В', "B"),
        ('С', "C"),
        ('Е', "E"),
        ('Н', "H"),
        ('І', "I"),
        ('Ј', "J"),
        ('К', "K"),
        ('М', "M"),
        ('О', "O"),
        ('Р', "P"),
        ('Ѕ', "S"),
        ('Т', "T"),
        ('Х', "X"),
        ('У', "Y"),
        // Greek lowercase
        ('α', "a"),
        ('β', "b"),
        ('ε', "e"),
        ('η', "n"),
        ('ι', "i"),
        ('κ', "k"),
        ('ν', "v"),
        ('ο', "o"),
        ('ρ', "p"),
        ('τ', "t"),
        ('υ', "u"),
        ('χ', "x"),
        ('ω', "w"),
        // Greek uppercase
        ('Α', "A"),
        ('Β', "B"),
        ('Ε', "E"),
        ('Ζ', "Z"),
        ('Η', "H"),
        ('Ι', "I"),
        ('Κ', "K"),
        ('Μ', "M"),
        ('Ν', "N"),
        ('Ο', "O"),
        ('Ρ', "P"),
        ('Τ', "T"),
        ('Υ', "Y"),
        ('Χ', "X"),
        // Zero-width marks
        ('\u{200B}', ""),
        ('\u{200C}', ""),
        ('\u{200D}', ""),
        ('\u{2060}', ""),
        ('\u{FEFF}', ""),
        // Typographic dashes and quotes
        ('\u{2010}', "-"),
        ('\u{2011}', "-"),
        ('\u{2012}', "-"),
        ('\u{2013}', "-"),
        ('\u{2014}', "-"),
        ('\u{2015}', "-"),
        ('\u{2212}', "-"),
        ('\u{2018}', "'"),
        ('\u{2019}', "'"),
        ('\u{201A}', "'"),
        ('\u{201C}', "\""),
        ('\u{201D}', "\""),
        ('\u{201E}', "\""),
        // Dotless i/j
        ('ı', "i"),
        ('ȷ', "j"),
        // Small caps
        ('ᴀ', "a"),
        ('ʙ', "b"),
        ('ᴄ', "c"),
        ('ᴅ', "d"),
        ('ᴇ', "e"),
        ('ꜰ', "f"),
        ('ɢ', "g"),
        ('ʜ', "h"),
        ('ɪ', "i"),
        ('ᴊ', "j"),
        ('ᴋ', "k"),
        ('ʟ', "l"),
        ('ᴍ', "m"),
        ('ɴ', "n"),
        ('ᴏ', "o"),
        ('ᴘ', "p"),
        ('ʀ', "r"),
        ('ꜱ', "s"),
        ('ᴛ', "t"),
        ('ᴜ', "u"),
        ('ᴠ', "v"),
        ('ᴡ', "w"),
        ('ʏ', "y"),
        ('ᴢ', "z"),
        // Roman numerals
        ('Ⅰ', "I"),
        ('Ⅱ', "II"),
        ('Ⅲ', "III"),
        ('Ⅴ', "V"),
        ('Ⅹ', "X"),
        ('Ⅼ', "L"),
        ('Ⅽ', "C"),
        ('Ⅾ', "D"),
        ('Ⅿ', "M"),
        ('ⅰ', "i"),
        ('ⅱ', "ii"),
        ('ⅲ', "iii"),
        ('ⅴ', "v"),
        ('ⅹ', "x"),
    ];
    entries.iter().copied().collect()
});

/// Resolve a confusable code point to its ASCII form, covering the fullwidth
/// Latin block by offset rather than table entries.
fn confusable_replacement(c: char) -> Option<String> {
    if let Some(replacement) = CONFUSABLES.get(&c) {
        return Some((*replacement).to_string());
    }
    // Fullwidth ASCII block (letters, digits, punctuation) and ideographic space.
    if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
        let ascii = (c as u32 - 0xFEE0) as u8 as char;
        return Some(ascii.to_string());
    }
    if c == '\u{3000}' {
        return Some(" ".to_string());
    }
    None
}

/// One substituted code point.
#[derive(Debug, Clone, Serialize)]
pub struct HomoglyphFinding {
    /// Character index in the input.
    pub index: usize,
    pub original: char,
    pub replacement: String,
}

/// Homoglyph normalization output.
#[derive(Debug, Clone, Serialize)]
pub struct HomoglyphReport {
    pub normalized: String,
    pub findings: Vec<HomoglyphFinding>,
    /// Writing systems observed among alphabetic characters.
    pub scripts: BTreeSet<Script>,
    pub mixed_scripts: bool,
    pub score: f64,
}

/// Replace confusable code points with their ASCII equivalents.
///
/// Returns the normalized text, per-character findings, and the set of
/// scripts observed among alphabetic characters. Idempotent on ASCII.
pub fn normalize_homoglyphs(text: &str) -> HomoglyphReport {
    let mut normalized = String::with_capacity(text.len());
    let mut findings = Vec::new();
    let mut scripts = BTreeSet::new();

    let total_chars = text.chars().count();
    for (index, c) in text.chars().enumerate() {
        if c.is_alphabetic() {
            scripts.insert(classify_script(c));
        }
        match confusable_replacement(c) {
            Some(replacement) => {
                normalized.push_str(&replacement);
                findings.push(HomoglyphFinding {
                    index,
                    original: c,
                    replacement,
                });
            }
            None => normalized.push(c),
        }
    }

    let mixed_scripts = scripts.len() >= 2;
    let density = if total_chars == 0 {
        0.0
    } else {
        findings.len() as f64 / total_chars as f64
    };
    let keyword_hits = count_keyword_hits(&normalized);
    let mut score = (density * 2.0).min(0.4);
    if mixed_scripts {
        score += 0.3;
    }
    score += (keyword_hits as f64 * 0.1).min(0.3);

    HomoglyphReport {
        normalized,
        findings,
        scripts,
        mixed_scripts,
        score: score.min(1.0),
    }
}

fn count_keyword_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    INJECTION_KEYWORDS.iter().map(|k| lower.matches(k).count()).sum()
}

/// Leetspeak tokens in longest-match order. Single-character digits/symbols
/// also define the leet character class used for the trigger ratio.
static LEET_TOKENS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut tokens = vec![
        ("|_|", "u"),
        ("/\\", "a"),
        ("\\/", "v"),
        ("|2", "r"),
        ("|3", "b"),
        ("|)", "d"),
        ("4", "a"),
        ("@", "a"),
        ("3", "e"),
        ("0", "o"),
        ("1", "i"),
        ("!", "i"),
        ("5", "s"),
        ("$", "s"),
        ("7", "t"),
        ("+", "t"),
        ("8", "b"),
        ("6", "g"),
        ("9", "g"),
    ];
    tokens.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));
    tokens
});

const LEET_CHARS: &str = "43@01!5$7+869";

static LEET_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z]*[0-9@!$+]+[A-Za-z]*").expect("leet run regex pattern is valid and should compile")
});

/// Case-fold, then longest-match replace leetspeak tokens.
///
/// Idempotent on its own output: every replacement is plain lowercase ASCII,
/// which no token matches.
pub fn decode_leetspeak(text: &str) -> String {
    let folded = text.to_lowercase();
    let mut decoded = String::with_capacity(folded.len());
    let bytes = folded.as_bytes();
    let mut pos = 0;
    'outer: while pos < bytes.len() {
        for (token, replacement) in LEET_TOKENS.iter() {
            if folded[pos..].starts_with(token) {
                decoded.push_str(replacement);
                pos += token.len();
                continue 'outer;
            }
        }
        // No token starts here; copy one full character.
        let c = folded[pos..].chars().next().expect("pos is on a char boundary");
        decoded.push(c);
        pos += c.len_utf8();
    }
    decoded
}

/// Ratio of leet characters among `alpha + leet` characters.
pub fn leet_ratio(text: &str) -> f64 {
    let leet = text.chars().filter(|c| LEET_CHARS.contains(*c)).count();
    let alpha = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if leet + alpha == 0 {
        0.0
    } else {
        leet as f64 / (leet + alpha) as f64
    }
}

/// Apply Caesar-13 to ASCII letters; all other characters pass through.
/// Applying it twice yields the input.
pub fn decode_rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}

/// Combined de-obfuscation report for a piece of extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct Deobfuscation {
    pub has_obfuscation: bool,
    pub homoglyph: HomoglyphReport,
    /// Present only when the leetspeak trigger fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leetspeak_decoded: Option<String>,
    pub leet_ratio: f64,
    /// Present only when the ROT13 decode is more keyword-laden than the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rot13_decoded: Option<String>,
    /// Max of the per-transform scores, in [0, 1].
    pub score: f64,
}

impl Deobfuscation {
    /// Decoded/normalized forms worth a second pattern-matching pass.
    pub fn decoded_forms(&self) -> Vec<&str> {
        let mut forms = Vec::new();
        if !self.homoglyph.findings.is_empty() {
            forms.push(self.homoglyph.normalized.as_str());
        }
        if let Some(leet) = &self.leetspeak_decoded {
            forms.push(leet.as_str());
        }
        if let Some(rot) = &self.rot13_decoded {
            forms.push(rot.as_str());
        }
        forms
    }
}

/// Run all three transforms and combine their evidence.
pub fn detect_obfuscation(text: &str) -> Deobfuscation {
    let homoglyph = normalize_homoglyphs(text);

    // Leetspeak triggers only with enough leet density and an actual
    // letter/leet run, to keep ordinary numerals from firing it.
    let ratio = leet_ratio(text);
    let leet_triggered = ratio >= 0.10 && LEET_RUN.is_match(text);
    let leetspeak_decoded = leet_triggered.then(|| decode_leetspeak(text));
    let leet_score = if leet_triggered { (ratio * 2.0).min(1.0) } else { 0.0 };

    // ROT13 is only suspected when decoding strictly increases injection
    // vocabulary and there is enough text to judge.
    let alpha_count = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    let rot13 = decode_rot13(text);
    let decoded_hits = count_keyword_hits(&rot13);
    let original_hits = count_keyword_hits(text);
    let rot13_suspected = alpha_count > 10 && decoded_hits > original_hits;
    let rot13_decoded = rot13_suspected.then_some(rot13);
    let rot13_score = if rot13_suspected {
        (decoded_hits as f64 * 0.25).min(1.0)
    } else {
        0.0
    };

    let has_obfuscation = !homoglyph.findings.is_empty() || leet_triggered || rot13_suspected;
    let score = homoglyph.score.max(leet_score).max(rot13_score).clamp(0.0, 1.0);

    Deobfuscation {
        has_obfuscation,
        homoglyph,
        leetspeak_decoded,
        leet_ratio: ratio,
        rot13_decoded,
        score,
    }
}
