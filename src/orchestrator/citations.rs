//! Citation handling for web-augmented replies.
//!
//! The web service embeds `[1]`-style ordinals and source URLs directly in
//! its text. This module extracts them into a structured block, rewrites the
//! ordinals as markdown hyperlinks, and decides when the transport should
//! suppress link previews. Rendering the block is the transport adapter's
//! job.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s\[\]()]+[^\s\[\]().,;!?]").unwrap());

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// Citations extracted from a web-augmented reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationBlock {
    /// Reply text with bare source URLs stripped, before hyperlinking.
    pub clean_text: String,
    /// Ordinal → source URL.
    pub citations: BTreeMap<u32, String>,
}

/// Extract `[n]` ordinals and their source URLs from `text`.
///
/// Ordinals are mapped to URLs found on the same line first; any left over
/// fall back to positional matching (first URL ↔ `[1]`, and so on). Returns
/// the text with bare URLs stripped, trimmed, plus the ordinal→URL map.
pub fn extract_citations(text: &str) -> (String, BTreeMap<u32, String>) {
    let ordinals: Vec<u32> = CITATION_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    let urls: Vec<String> = URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    debug!(
        ordinals = ordinals.len(),
        urls = urls.len(),
        "extracting citations"
    );

    let mut citations = BTreeMap::new();
    if !ordinals.is_empty() && !urls.is_empty() {
        // Citations sit at line ends, so a URL on the same line is the
        // strongest signal.
        for line in text.lines() {
            if let Some(caps) = CITATION_RE.captures(line) {
                if let Ok(ordinal) = caps[1].parse::<u32>() {
                    if let Some(url) = URL_RE.find(line) {
                        citations.insert(ordinal, url.as_str().to_string());
                    }
                }
            }
        }

        // Positional fallback for anything the line scan missed.
        if citations.len() < ordinals.len() {
            for (index, url) in urls.iter().enumerate() {
                let ordinal = (index + 1) as u32;
                if ordinals.contains(&ordinal) {
                    citations.entry(ordinal).or_insert_with(|| url.clone());
                }
            }
        }
    }

    let cleaned = strip_bare_urls(text, &urls);
    (cleaned.trim().to_string(), citations)
}

/// Remove bare occurrences of `urls` from `text`.
///
/// A URL is kept when it is part of a markdown link, i.e. preceded by `](`
/// or followed by a closing parenthesis.
fn strip_bare_urls(text: &str, urls: &[String]) -> String {
    let mut out = text.to_string();
    for url in urls {
        let mut result = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(pos) = rest.find(url.as_str()) {
            let before = &rest[..pos];
            let after = &rest[pos + url.len()..];
            let inside_link = before.ends_with("](") || after.trim_start().starts_with(')');
            result.push_str(before);
            if inside_link {
                result.push_str(url);
            }
            rest = after;
        }
        result.push_str(rest);
        out = result;
    }
    out
}

/// Rewrite `[n]` ordinals as markdown hyperlinks using `citations`.
///
/// Ordinals without a known URL are left untouched.
pub fn hyperlink_citations(text: &str, citations: &BTreeMap<u32, String>) -> String {
    if citations.is_empty() {
        return text.to_string();
    }
    CITATION_RE
        .replace_all(text, |caps: &Captures<'_>| {
            match caps[1].parse::<u32>().ok().and_then(|n| citations.get(&n)) {
                Some(url) => format!("[{}]({url})", &caps[1]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Whether the transport should suppress link previews for `text`.
///
/// Two or more links turn a chat message into a wall of preview cards, so
/// that is the cutoff.
pub fn should_suppress_preview(text: &str) -> bool {
    let markdown_links = LINK_RE.find_iter(text).count();
    let bare_urls = BARE_URL_RE.find_iter(text).count();
    markdown_links + bare_urls >= 2
}
