//! Cell-level string operations used by the normalizer.

use std::borrow::Cow;

use heck::ToTitleCase;

/// Trims and lowercases for matching, reusing the input when already folded.
pub fn fold(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    if trimmed.len() == input.len() && !trimmed.chars().any(|ch| ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(trimmed.to_lowercase())
    }
}

/// Title-cases every alphabetic run, leaving separators in place, so
/// `"jane doe"` becomes `"Jane Doe"` and `"jane@x.com"` keeps its shape.
pub fn title_case(input: &str) -> Cow<'_, str> {
    if input
        .chars()
        .scan(false, |prev_alpha, ch| {
            let ok = if ch.is_alphabetic() {
                let expected_upper = !*prev_alpha;
                *prev_alpha = true;
                ch.is_uppercase() == expected_upper
            } else {
                *prev_alpha = false;
                true
            };
            Some(ok)
        })
        .all(|ok| ok)
    {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            output.push(ch);
            prev_alpha = false;
        }
    }
    Cow::Owned(output)
}

/// Title-cases a normalized column name for display headers:
/// `"first_name"` becomes `"First Name"`.
pub fn display_header(name: &str) -> String {
    name.to_title_case()
}

/// Keeps only ASCII digits.
pub fn digits(input: &str) -> Cow<'_, str> {
    if input.bytes().all(|b| b.is_ascii_digit()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.chars().filter(|ch| ch.is_ascii_digit()).collect())
    }
}

/// Drops the trailing digit of a float round-trip artifact such as
/// `"5551234567.0"` (12 bytes with `.` in the penultimate position) so the
/// later digit strip cannot manufacture an 11-digit phone.
pub fn strip_float_artifact(input: &str) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() == 12 && bytes[10] == b'.' {
        &input[..11]
    } else {
        input
    }
}
