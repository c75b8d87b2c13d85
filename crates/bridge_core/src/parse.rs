//! Recovery of structured sections from free-form model output.
//!
//! Section boundaries are found by a line scanner: a header only counts when it
//! starts a line (after optional markdown `#`/`*` decoration) and is followed
//! by a colon or nothing. Headers are matched case-insensitively; a header
//! quoted at the start of a line inside body prose is still taken as a
//! boundary.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::content::Reference;
use crate::template::{ActiveSection, BuiltinSection, OutputTemplate, SectionFormat, SectionKind};

/// Characters of the raw response used as the summary when no summary
/// section is found.
pub const SUMMARY_FALLBACK_CHARS: usize = 500;

/// Substituted when no key learning could be extracted.
pub const EXTRACTION_FAILED_LEARNINGS: [&str; 2] = [
    "Key learnings could not be extracted from the model response.",
    "See the summary for the main points.",
];

/// Provenance marker for creator additions folded into key learnings.
pub const CREATOR_PREFIX: &str = "[Creator] ";

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-•]|\d+\.)\s*(.*?)\s*$").expect("valid bullet regex")
});

static LINK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-•*]\s*)?\[?#?(\d+)\]?[.):]?\s*(?:[-–—:]\s*)?(.*?)\s*$")
        .expect("valid link line regex")
});

static NEGATIVE_RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no specific|none|n/a|not applicable|no action items|no relevant|no links|no additional)\b",
    )
    .expect("valid negative result regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantLink {
    pub url: String,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Prose(String),
    Bullets(Vec<String>),
}

/// Content of a template section with no built-in meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSection {
    pub id: String,
    pub label: String,
    pub content: SectionContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResult {
    pub summary: String,
    pub key_learnings: Vec<String>,
    pub action_items: Vec<String>,
    pub relevant_links: Vec<RelevantLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_sections: Vec<CustomSection>,
}

/// Parse a model response written against the sections of `template` (or the
/// default sections). Never fails; missing pieces degrade to fallbacks.
pub fn parse_response(
    raw: &str,
    references: &[Reference],
    template: Option<&OutputTemplate>,
) -> ParsedResult {
    let sections = OutputTemplate::active_sections(template, true);
    let bodies = split_sections(raw, &sections);

    let mut summary: Option<String> = None;
    let mut key_learnings = Vec::new();
    let mut action_items = Vec::new();
    let mut creator_additions = Vec::new();
    let mut links_text = String::new();
    let mut custom_sections = Vec::new();

    for (section, body) in sections.iter().zip(bodies) {
        let Some(body) = body else {
            continue;
        };
        match &section.kind {
            SectionKind::Builtin(BuiltinSection::Summary) => {
                summary.get_or_insert_with(|| body.trim().to_string());
            }
            SectionKind::Builtin(BuiltinSection::KeyLearnings) => {
                key_learnings.extend(extract_items(&body, section.format));
            }
            SectionKind::Builtin(BuiltinSection::ActionItems) => {
                if !is_negative_result(&body) {
                    action_items.extend(extract_items(&body, section.format));
                }
            }
            SectionKind::Builtin(BuiltinSection::CreatorAdditions) => {
                if !is_negative_result(&body) {
                    creator_additions.extend(extract_items(&body, section.format));
                }
            }
            SectionKind::Builtin(BuiltinSection::RelevantLinks) => {
                if !is_negative_result(&body) {
                    links_text.push_str(&body);
                    links_text.push('\n');
                }
            }
            SectionKind::Custom { id, label } => {
                let content = match section.format {
                    SectionFormat::Prose => SectionContent::Prose(body.trim().to_string()),
                    SectionFormat::Bullets => {
                        SectionContent::Bullets(extract_items(&body, SectionFormat::Bullets))
                    }
                };
                custom_sections.push(CustomSection {
                    id: id.clone(),
                    label: label.clone(),
                    content,
                });
            }
        }
    }

    let summary = summary.unwrap_or_else(|| fallback_summary(raw));

    key_learnings.extend(
        creator_additions
            .into_iter()
            .map(|item| format!("{CREATOR_PREFIX}{item}")),
    );
    if key_learnings.is_empty() {
        key_learnings = EXTRACTION_FAILED_LEARNINGS
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    ParsedResult {
        summary,
        key_learnings,
        action_items,
        relevant_links: match_references(&links_text, references),
        custom_sections,
    }
}

/// Lines starting with `-`, `•` or `N.`, marker stripped, empties dropped.
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| BULLET_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|item| !item.is_empty())
        .collect()
}

/// True when the model reported "nothing here" instead of content.
pub fn is_negative_result(text: &str) -> bool {
    NEGATIVE_RESULT_RE.is_match(text)
}

/// Re-attach 1-based ordinal citations to `references`. Out-of-range ordinals
/// are skipped and the first citation of a URL wins.
pub fn match_references(links_text: &str, references: &[Reference]) -> Vec<RelevantLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for line in links_text.lines() {
        let Some(caps) = LINK_LINE_RE.captures(line) else {
            continue;
        };
        let Some(ordinal) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        let Some(reference) = ordinal.checked_sub(1).and_then(|index| references.get(index))
        else {
            continue;
        };
        if !seen.insert(normalize_url_for_dedupe(&reference.url)) {
            continue;
        }
        let reason = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        links.push(RelevantLink {
            url: reference.url.clone(),
            text: reference.text.clone(),
            reason: reason.to_string(),
        });
    }
    links
}

/// Normalizes a URL for duplicate detection: fragment dropped, trailing slash
/// removed, scheme and host lowercased.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            if normalized.ends_with('/') {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}

enum ScanState {
    ScanningForHeader,
    InSection(usize),
}

/// Body text per active section; `None` when its header never appears.
fn split_sections(raw: &str, sections: &[ActiveSection]) -> Vec<Option<String>> {
    let mut bodies: Vec<Option<String>> = vec![None; sections.len()];
    let mut state = ScanState::ScanningForHeader;

    for line in raw.lines() {
        if let Some((index, rest)) = match_header(line, sections) {
            let body = bodies[index].get_or_insert_with(String::new);
            if !rest.is_empty() {
                push_line(body, rest);
            }
            state = ScanState::InSection(index);
            continue;
        }
        if let ScanState::InSection(index) = state {
            if let Some(body) = bodies[index].as_mut() {
                push_line(body, line);
            }
        }
    }
    bodies
}

fn push_line(body: &mut String, line: &str) {
    if !body.is_empty() {
        body.push('\n');
    }
    body.push_str(line);
}

/// Index of the longest header that starts `line`, plus any text after the
/// header's colon.
fn match_header<'l>(line: &'l str, sections: &[ActiveSection]) -> Option<(usize, &'l str)> {
    let is_decoration = |c: char| c == '#' || c == '*' || c == '_';
    let stripped = line.trim_start().trim_start_matches(is_decoration).trim_start();

    let mut best: Option<(usize, &'l str, usize)> = None;
    for (index, section) in sections.iter().enumerate() {
        let header = section.header.as_str();
        let Some(candidate) = stripped.get(..header.len()) else {
            continue;
        };
        if candidate.to_uppercase() != header {
            continue;
        }
        let rest = stripped[header.len()..].trim_start_matches(is_decoration);
        let rest = if let Some(after_colon) = rest.strip_prefix(':') {
            after_colon.trim_start_matches(is_decoration).trim()
        } else if rest.trim().is_empty() {
            ""
        } else {
            continue;
        };
        if best.map_or(true, |(_, _, len)| header.len() > len) {
            best = Some((index, rest, header.len()));
        }
    }
    best.map(|(index, rest, _)| (index, rest))
}

fn extract_items(body: &str, format: SectionFormat) -> Vec<String> {
    let bullets = extract_bullets(body);
    if bullets.is_empty() && format == SectionFormat::Prose {
        let text = body.trim();
        if !text.is_empty() {
            return vec![text.to_string()];
        }
    }
    bullets
}

fn fallback_summary(raw: &str) -> String {
    let head: String = raw.trim().chars().take(SUMMARY_FALLBACK_CHARS).collect();
    head.trim_end().to_string()
}
