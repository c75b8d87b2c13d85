use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content as delivered by the page-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedContent {
    #[serde(alias = "content")]
    pub transcript: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub creator_comments: Vec<Comment>,
    pub viewer_comments: Vec<Comment>,
    pub links: Vec<Reference>,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub text: String,
    pub likes: u64,
    pub author: String,
    pub is_reply: bool,
}

/// One entry of the ordered reference list. Shown to the model 1-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    #[serde(default)]
    pub text: String,
}

impl Reference {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Video,
    Article,
    Selection,
}

impl ContentKind {
    /// Character budget for the secondary description field.
    pub fn description_budget(self) -> usize {
        match self {
            ContentKind::Video => 5_000,
            ContentKind::Article | ContentKind::Selection => 2_000,
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Article => "article",
            ContentKind::Selection => "text selection",
        }
    }

    pub fn body_label(self) -> &'static str {
        match self {
            ContentKind::Video => "TRANSCRIPT",
            ContentKind::Article => "ARTICLE TEXT",
            ContentKind::Selection => "SELECTED TEXT",
        }
    }
}
