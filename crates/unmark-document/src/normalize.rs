// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text normalization used on both sides of every watermark comparison.
//
// NFKC folds full-width and compatibility forms, Latin letters are
// lower-cased, whitespace runs collapse to one space and the ends are
// trimmed. Other scripts are compared exactly.

use unicode_normalization::UnicodeNormalization;

/// Normalize a plain string.
pub fn normalize(text: &str) -> String {
    normalize_mapped(text.chars().map(|c| (c, None)))
        .into_iter()
        .map(|(c, _)| c)
        .collect()
}

/// Normalize while carrying a source tag (a glyph index) on every char.
///
/// Collapsed whitespace comes out untagged, since it may stand for several
/// source characters or for none.
pub fn normalize_mapped<I>(input: I) -> Vec<(char, Option<usize>)>
where
    I: IntoIterator<Item = (char, Option<usize>)>,
{
    let mut out: Vec<(char, Option<usize>)> = Vec::new();
    let mut pending_space = false;

    for (c, tag) in input {
        for folded in std::iter::once(c).nfkc() {
            if folded.is_whitespace() {
                pending_space = !out.is_empty();
                continue;
            }
            if pending_space {
                out.push((' ', None));
                pending_space = false;
            }
            if is_latin(folded) {
                out.extend(folded.to_lowercase().map(|lower| (lower, tag)));
            } else {
                out.push((folded, tag));
            }
        }
    }

    out
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c, '\u{00C0}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}')
}
