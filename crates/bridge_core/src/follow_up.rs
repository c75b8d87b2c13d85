use std::sync::LazyLock;

use bridge_logging::bridge_debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::extract_bullets;

/// Plain-text answers shorter than this are returned as one insight.
pub const SINGLE_INSIGHT_MAX_CHARS: usize = 500;
pub const MAX_SENTENCE_INSIGHTS: usize = 5;
pub const MIN_SENTENCE_CHARS: usize = 20;

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fenced json regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Insight,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub text: String,
}

impl ClassifiedItem {
    /// Accepts `{type: "insight"|"action", text: <string>}`; anything else is
    /// dropped.
    fn from_value(value: &Value) -> Option<Self> {
        let text = value.get("text")?.as_str()?.trim();
        if text.is_empty() {
            return None;
        }
        let kind = match value.get("type")?.as_str()? {
            "insight" => ItemKind::Insight,
            "action" => ItemKind::Action,
            _ => return None,
        };
        Some(Self {
            kind,
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpResult {
    pub insights: Vec<String>,
    pub actions: Vec<String>,
}

impl FromIterator<ClassifiedItem> for FollowUpResult {
    fn from_iter<I: IntoIterator<Item = ClassifiedItem>>(items: I) -> Self {
        let mut result = FollowUpResult::default();
        for item in items {
            match item.kind {
                ItemKind::Insight => result.insights.push(item.text),
                ItemKind::Action => result.actions.push(item.text),
            }
        }
        result
    }
}

/// Classify a follow-up answer into insights and actions.
///
/// Prefers a JSON `{"items": [...]}` object (fenced or bare). Anything else
/// falls back to plain-text extraction, which reports everything as insights.
pub fn parse_follow_up(raw: &str) -> FollowUpResult {
    if let Some(result) = json_candidates(raw).find_map(parse_items) {
        return result;
    }
    bridge_debug!("Follow-up answer has no usable items JSON; using plain text");
    plain_text_fallback(raw)
}

fn json_candidates(raw: &str) -> impl Iterator<Item = &str> {
    let fenced = FENCED_JSON_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());
    let braced = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&raw[start..=end]),
        _ => None,
    }
    .filter(|candidate| candidate.contains("\"items\""));
    fenced.into_iter().chain(braced)
}

fn parse_items(candidate: &str) -> Option<FollowUpResult> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let items = value.get("items")?.as_array()?;
    Some(items.iter().filter_map(ClassifiedItem::from_value).collect())
}

fn plain_text_fallback(raw: &str) -> FollowUpResult {
    let bullets = extract_bullets(raw);
    if !bullets.is_empty() {
        return FollowUpResult {
            insights: bullets,
            actions: Vec::new(),
        };
    }

    let text = raw.trim();
    let insights = if text.is_empty() {
        Vec::new()
    } else if text.chars().count() < SINGLE_INSIGHT_MAX_CHARS {
        vec![text.to_string()]
    } else {
        split_sentences(text)
            .into_iter()
            .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
            .take(MAX_SENTENCE_INSIGHTS)
            .collect()
    };
    FollowUpResult {
        insights,
        actions: Vec::new(),
    }
}

/// Split at ". " when the next word starts with a capital letter, or at the
/// end of the text.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        if ch != '.' || !text[index + 1..].starts_with(' ') {
            continue;
        }
        let next_word = text[index + 1..].trim_start().chars().next();
        if next_word.is_some_and(char::is_uppercase) {
            let sentence = text[start..=index].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = index + 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::split_sentences;

    #[test]
    fn splits_only_before_capitals() {
        let text = "First point is here. second part stays. Third starts anew.";
        assert_eq!(
            split_sentences(text),
            vec![
                "First point is here. second part stays.",
                "Third starts anew."
            ]
        );
    }

    #[test]
    fn keeps_decimal_numbers_together() {
        assert_eq!(
            split_sentences("Version 2.5 shipped. It works."),
            vec!["Version 2.5 shipped.", "It works."]
        );
    }
}
