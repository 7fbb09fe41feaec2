//! Capture shorthands accepted in template bodies.
//!
//! Before a body is compiled it is rewritten against the rule's pattern:
//!
//! - `$1`, `$name` and `${name}` become lookups into the `captures` map that
//!   every match provides. References to groups the pattern does not have
//!   expand to nothing; `$$` is a literal `$`.
//! - A bare `{{.}}` (also `{{ . }}`, `{{- . -}}`) stands for the first
//!   capture group, or the whole match when the pattern has no groups.
//!
//! `$name` takes the longest run of `[_0-9A-Za-z]`, so `$1a` refers to a
//! group called `1a`; write `${1}a` to follow group 1 with an `a`.

use regex::bytes::Regex;
use std::fmt::Write as _;

/// Rewrite `body` into plain template syntax for `pattern`.
pub fn translate(body: &str, pattern: &Regex) -> String {
    let expanded = expand_references(body, pattern);

    let primary = if pattern.captures_len() > 1 {
        lookup("1")
    } else {
        "match".to_string()
    };
    let dot = regex::Regex::new(r"\{\{(-?)\s*\.\s*(-?)\}\}").unwrap();
    dot.replace_all(&expanded, |caps: &regex::Captures| {
        format!("{{{{{} {} {}}}}}", &caps[1], primary, &caps[2])
    })
    .into_owned()
}

enum Reference<'a> {
    Dollar,
    Group(&'a str),
}

fn expand_references(body: &str, pattern: &Regex) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];

        match parse_reference(rest) {
            Some((Reference::Dollar, len)) => {
                out.push('$');
                rest = &rest[len..];
            }
            Some((Reference::Group(name), len)) => {
                if let Some(key) = resolve(name, pattern) {
                    let _ = write!(out, "{{{{ {} }}}}", lookup(&key));
                }
                rest = &rest[len..];
            }
            None => {
                out.push('$');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse the reference at the start of `text`, which begins with `$`.
/// Returns the reference and how many bytes it spans.
fn parse_reference(text: &str) -> Option<(Reference<'_>, usize)> {
    let after = &text[1..];

    if after.starts_with('$') {
        return Some((Reference::Dollar, 2));
    }

    if let Some(braced) = after.strip_prefix('{') {
        let end = braced.find('}')?;
        let name = &braced[..end];
        if name.is_empty() {
            return None;
        }
        return Some((Reference::Group(name), end + 3));
    }

    let len = after
        .bytes()
        .take_while(|b| *b == b'_' || b.is_ascii_alphanumeric())
        .count();
    if len == 0 {
        return None;
    }
    Some((Reference::Group(&after[..len]), len + 1))
}

/// Key into `captures` for a group the pattern defines.
fn resolve(name: &str, pattern: &Regex) -> Option<String> {
    if let Ok(index) = name.parse::<usize>() {
        return (index < pattern.captures_len()).then(|| index.to_string());
    }
    pattern
        .capture_names()
        .flatten()
        .any(|group| group == name)
        .then(|| name.to_string())
}

fn lookup(key: &str) -> String {
    format!("captures[\"{}\"]", key)
}
