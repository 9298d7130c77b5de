//! Host markup to engine-safe plain text.
//!
//! The host wraps text in SSML-ish markup and escapes it with XML entities.
//! ViaVoice predates both and reads anything it does not understand aloud,
//! so the text goes through four stages:
//!
//! 1. tag stripping (no nesting awareness, a bare `<` strips to the end)
//! 2. decoding of the five XML entities
//! 3. trimming of space, tab and newline
//! 4. plain-text normalization, for ordinary reading only: clause-break
//!    punctuation becomes a comma pause, a few currency signs become words and
//!    everything outside the engine's comfortable ASCII subset becomes a space

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("out of memory allocating {0} bytes for sanitized text")]
    OutOfMemory(usize),
}

const ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&apos;", '\''),
    ("&quot;", '"'),
];

/// Run the whole pipeline. `full` selects the plain-text normalization stage.
pub fn sanitize(text: &str, full: bool) -> Result<String, SanitizeError> {
    let stripped = strip_markup(text)?;
    if full {
        normalize_plain_text(&stripped)
    } else {
        Ok(stripped)
    }
}

/// Stages 1 to 3: strip tags, decode entities, trim.
pub fn strip_markup(text: &str) -> Result<String, SanitizeError> {
    let stripped = strip_tags(text)?;
    let decoded = decode_entities(&stripped)?;
    Ok(trim_host_whitespace(&decoded).to_string())
}

/// Remove everything from `<` up to and including the next `>`.
pub fn strip_tags(text: &str) -> Result<String, SanitizeError> {
    let mut out = buffer(text.len())?;
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    Ok(out)
}

/// Replace the five XML entities. Anything else starting with `&` is kept.
pub fn decode_entities(text: &str) -> Result<String, SanitizeError> {
    let mut out = buffer(text.len())?;
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

pub fn trim_host_whitespace(text: &str) -> &str {
    text.trim_matches(is_host_whitespace)
}

/// Stage 4: rewrite text so the engine reads it with natural prosody.
///
/// A clause break (`; : ( ) [ ] { }`, em and en dash) becomes `", "` attached
/// to the preceding word. Punctuation directly following the break is
/// swallowed so `"(aside)."` cannot leave an isolated `"."` behind. A break
/// with no word before it, or none after it, produces nothing.
pub fn normalize_plain_text(text: &str) -> Result<String, SanitizeError> {
    // ", " per one-byte break is 2x; "pound" per two-byte "£" is the worst at 2.5x
    let mut out = buffer(text.len() * 5 / 2)?;
    let mut pending_break = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if is_clause_break(c) {
            let kept = out.trim_end_matches(is_host_whitespace).len();
            out.truncate(kept);
            if !out.is_empty() {
                pending_break = true;
            }
            while chars
                .next_if(|&c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
                .is_some()
            {}
            while chars.next_if(|&c| is_host_whitespace(c)).is_some() {}
            continue;
        }

        if pending_break {
            out.push_str(", ");
            pending_break = false;
        }

        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' => out.push(c),
            ' ' | '\t' | '\n' | '.' | ',' | '!' | '?' | '$' | '\'' => out.push(c),
            '£' => out.push_str("pound"),
            '¢' => out.push_str("cent"),
            '¥' => out.push_str("yen"),
            '€' => out.push_str("euro"),
            _ => out.push(' '),
        }
    }

    let kept = trim_host_whitespace(&out).to_string();
    Ok(kept)
}

fn is_clause_break(c: char) -> bool {
    matches!(
        c,
        ';' | ':' | '(' | ')' | '[' | ']' | '{' | '}' | '\u{2014}' | '\u{2013}'
    )
}

fn is_host_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

fn buffer(capacity: usize) -> Result<String, SanitizeError> {
    let mut s = String::new();
    s.try_reserve(capacity)
        .map_err(|_| SanitizeError::OutOfMemory(capacity))?;
    Ok(s)
}
