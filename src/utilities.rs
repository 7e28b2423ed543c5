// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Small string helpers shared by the text codecs.

use std::str::FromStr;

/// Trims spaces, tabs and line endings on both sides.
pub fn trimmed(input: &str) -> &str {
    input.trim_matches(|c| matches!(c, ' ' | '\n' | '\r' | '\t'))
}

/// Removes everything from the first `c` on.
pub fn rstrip(input: &str, c: char) -> &str {
    match input.find(c) {
        Some(pos) => &input[..pos],
        None => input,
    }
}

/// Parses `input` (surrounding whitespace ignored) as `T`.
///
/// Returns `None` instead of an error when the text is not a `T`.
pub fn lexical_cast<T: FromStr>(input: &str) -> Option<T> {
    trimmed(input).parse::<T>().ok()
}

/// Parses every item of `items`, failing as a whole if any item fails.
pub fn lexical_cast_all<'a, T, I>(items: I) -> Option<Vec<T>>
where
    T: FromStr,
    I: IntoIterator<Item = &'a str>,
{
    items.into_iter().map(lexical_cast::<T>).collect()
}

/// Returns the longest leading part of `input` that reads as a number.
///
/// Leading whitespace is skipped. With `allow_fraction` unset only an
/// optional sign and digits are accepted, so `"3.7"` gives `"3"` and
/// `"12abc"` gives `"12"`.
pub fn numeric_prefix(input: &str, allow_fraction: bool) -> &str {
    let input = input.trim_start();
    let bytes = input.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if allow_fraction {
        if end < bytes.len() && bytes[end] == b'.' {
            let mut frac = end + 1;
            while frac < bytes.len() && bytes[frac].is_ascii_digit() {
                frac += 1;
            }
            if has_digits || frac > end + 1 {
                has_digits = true;
                end = frac;
            }
        }
        if has_digits && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp = end + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            let exp_digits = exp;
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            if exp > exp_digits {
                end = exp;
            }
        }
    }

    if has_digits {
        &input[..end]
    } else {
        ""
    }
}
