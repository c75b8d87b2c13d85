use std::borrow::Cow;
use std::fmt::Write;

use serde_json::Value;

use crate::content::{Comment, ContentKind, ExtractedContent, Reference};
use crate::template::{ActiveSection, BuiltinSection, OutputTemplate, SectionFormat, SectionKind};

pub const MAX_BODY_CHARS: usize = 50_000;
pub const MIN_CREATOR_REMARK_CHARS: usize = 15;
pub const MIN_VIEWER_REMARK_CHARS: usize = 30;
pub const MIN_VIEWER_REMARK_LIKES: u64 = 10;
pub const MAX_VIEWER_REMARKS: usize = 10;

pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated due to length ...]";

const DEFAULT_INSTRUCTIONS: &str = "Focus on the most important and actionable information. \
Be specific and concrete, prefer the author's own examples over generic advice, \
and keep every bullet self-contained.";

/// Phrase the model is told to use for an empty action list. The parser's
/// negative-result filter recognises it.
pub const NO_ACTION_ITEMS: &str = "No specific action items identified.";
/// Phrase the model is told to use when no link is worth citing.
pub const NO_RELEVANT_LINKS: &str = "None";

#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub content: &'a ExtractedContent,
    pub references: &'a [Reference],
    pub kind: ContentKind,
    pub custom_instructions: Option<&'a str>,
    pub template: Option<&'a OutputTemplate>,
}

impl<'a> PromptInput<'a> {
    /// Input whose reference list is the content's own link list.
    pub fn new(content: &'a ExtractedContent, kind: ContentKind) -> Self {
        Self {
            content,
            references: &content.links,
            kind,
            custom_instructions: None,
            template: None,
        }
    }
}

/// Build the summarization prompt, ending with the output contract the
/// response parser expects.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let content = input.content;
    let kind = input.kind;
    let creator_remarks = select_creator_remarks(&content.creator_comments);
    let viewer_remarks = select_viewer_remarks(&content.viewer_comments);

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are helping a user capture structured notes from a {}.",
        kind.noun()
    );
    prompt.push('\n');
    if !content.title.trim().is_empty() {
        let _ = writeln!(prompt, "Title: {}", content.title.trim());
    }
    if !content.url.trim().is_empty() {
        let _ = writeln!(prompt, "URL: {}", content.url.trim());
    }

    let description = content.description.trim();
    if !description.is_empty() {
        let _ = writeln!(
            prompt,
            "\nDESCRIPTION:\n{}",
            truncate_chars(description, kind.description_budget())
        );
    }

    let _ = writeln!(
        prompt,
        "\n{}:\n{}",
        kind.body_label(),
        truncate_chars(content.transcript.trim(), MAX_BODY_CHARS)
    );

    push_instructions(&mut prompt, input.custom_instructions);
    push_supplementary_context(
        &mut prompt,
        &creator_remarks,
        &viewer_remarks,
        &content.metadata,
        input.references,
    );

    let sections = OutputTemplate::active_sections(input.template, !creator_remarks.is_empty());
    push_output_contract(&mut prompt, &sections, !input.references.is_empty());
    prompt
}

#[derive(Debug, Clone, Copy)]
pub struct FollowUpInput<'a> {
    pub query: &'a str,
    pub content: &'a ExtractedContent,
    pub kind: ContentKind,
    pub existing_learnings: &'a [String],
    pub custom_instructions: Option<&'a str>,
}

/// Build a follow-up prompt that asks for a JSON list of classified items.
pub fn build_follow_up_prompt(input: &FollowUpInput<'_>) -> String {
    let content = input.content;
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "A user is reviewing notes taken from a {} and has a follow-up question.",
        input.kind.noun()
    );
    prompt.push('\n');
    if !content.title.trim().is_empty() {
        let _ = writeln!(prompt, "Title: {}", content.title.trim());
    }

    let body = content.transcript.trim();
    if !body.is_empty() {
        let _ = writeln!(
            prompt,
            "\n{}:\n{}",
            input.kind.body_label(),
            truncate_chars(body, MAX_BODY_CHARS)
        );
    }

    let learnings: Vec<&str> = input
        .existing_learnings
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if !learnings.is_empty() {
        prompt.push_str("\nKEY LEARNINGS ALREADY CAPTURED (do not repeat these):\n");
        for learning in learnings {
            let _ = writeln!(prompt, "- {learning}");
        }
    }

    push_instructions(&mut prompt, input.custom_instructions);

    let _ = writeln!(prompt, "\nQUESTION:\n{}", input.query.trim());
    prompt.push_str(
        "\n=== OUTPUT FORMAT ===\n\
Answer with ONLY a JSON object inside a ```json fenced code block, shaped like:\n\
```json\n\
{\"items\": [{\"type\": \"insight\", \"text\": \"...\"}, {\"type\": \"action\", \"text\": \"...\"}]}\n\
```\n\
Use \"insight\" for new understanding and \"action\" for something the user should do. \
Each text is one self-contained sentence.\n",
    );
    prompt
}

/// Approximate token count used for progress reporting.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
    }
}

fn select_creator_remarks(comments: &[Comment]) -> Vec<&Comment> {
    comments
        .iter()
        .filter(|c| c.text.trim().chars().count() >= MIN_CREATOR_REMARK_CHARS)
        .collect()
}

fn select_viewer_remarks(comments: &[Comment]) -> Vec<&Comment> {
    let mut selected: Vec<&Comment> = comments
        .iter()
        .filter(|c| {
            c.likes >= MIN_VIEWER_REMARK_LIKES
                && c.text.trim().chars().count() >= MIN_VIEWER_REMARK_CHARS
        })
        .collect();
    // Stable sort keeps page order among equal like counts.
    selected.sort_by(|a, b| b.likes.cmp(&a.likes));
    selected.truncate(MAX_VIEWER_REMARKS);
    selected
}

fn push_instructions(prompt: &mut String, custom: Option<&str>) {
    match custom.filter(|text| !text.trim().is_empty()) {
        Some(text) => {
            prompt.push_str("\n=== USER INSTRUCTIONS ===\n");
            prompt.push_str(text);
            prompt.push_str("\n=== END USER INSTRUCTIONS ===\n");
        }
        None => {
            prompt.push_str("\n=== INSTRUCTIONS ===\n");
            prompt.push_str(DEFAULT_INSTRUCTIONS);
            prompt.push_str("\n=== END INSTRUCTIONS ===\n");
        }
    }
}

fn push_supplementary_context(
    prompt: &mut String,
    creator_remarks: &[&Comment],
    viewer_remarks: &[&Comment],
    metadata: &std::collections::BTreeMap<String, Value>,
    references: &[Reference],
) {
    let metadata: Vec<(&String, String)> = metadata
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            (!rendered.is_empty()).then_some((key, rendered))
        })
        .collect();

    if creator_remarks.is_empty()
        && viewer_remarks.is_empty()
        && metadata.is_empty()
        && references.is_empty()
    {
        return;
    }

    prompt.push_str("\n=== SUPPLEMENTARY CONTEXT ===\n");

    if !creator_remarks.is_empty() {
        prompt.push_str("\nComments from the creator:\n");
        for comment in creator_remarks {
            let _ = writeln!(prompt, "- {}", single_line(&comment.text));
        }
    }

    if !viewer_remarks.is_empty() {
        prompt.push_str("\nTop viewer comments:\n");
        for comment in viewer_remarks {
            let _ = writeln!(
                prompt,
                "- ({} likes) {}",
                comment.likes,
                single_line(&comment.text)
            );
        }
    }

    if !metadata.is_empty() {
        prompt.push_str("\nPage metadata:\n");
        for (key, value) in metadata {
            let _ = writeln!(prompt, "- {key}: {value}");
        }
    }

    if !references.is_empty() {
        prompt.push_str("\nLinks referenced in the content (cite them by number):\n");
        for (index, reference) in references.iter().enumerate() {
            let ordinal = index + 1;
            let text = reference.text.trim();
            let text = if text.is_empty() {
                format!("Link {ordinal}")
            } else {
                single_line(text)
            };
            let _ = writeln!(prompt, "{ordinal}. {text}: {}", reference.url.trim());
        }
    }
}

fn push_output_contract(prompt: &mut String, sections: &[ActiveSection], has_references: bool) {
    prompt.push_str("\n=== OUTPUT FORMAT ===\n");
    prompt.push_str(
        "Respond using exactly the section headers below, in this order. Write each header \
in uppercase at the start of its own line, followed by a colon, and put the section \
content on the lines after it. Do not add any other headers.\n",
    );

    for section in sections {
        let _ = writeln!(prompt, "\n{}:", section.header);
        prompt.push_str(&section_guidance(section, has_references));
        prompt.push('\n');
    }
}

fn section_guidance(section: &ActiveSection, has_references: bool) -> String {
    let shape = match section.format {
        SectionFormat::Prose => "Write free-form prose (no bullet points).",
        SectionFormat::Bullets => "Write a bullet list, one item per line, each line starting with \"- \".",
    };

    match &section.kind {
        SectionKind::Builtin(BuiltinSection::Summary) => {
            format!("A concise summary of the main points in 2-4 sentences. {shape}")
        }
        SectionKind::Builtin(BuiltinSection::KeyLearnings) => {
            format!("The most important insights, 3-7 items. {shape}")
        }
        SectionKind::Builtin(BuiltinSection::ActionItems) => format!(
            "Concrete steps the reader can take. {shape} If there are none, write \"{NO_ACTION_ITEMS}\""
        ),
        SectionKind::Builtin(BuiltinSection::RelevantLinks) => {
            if has_references {
                format!(
                    "Only links from the numbered list above that are worth following. {shape} \
Start each line with the link's number followed by a period, then say why it is useful, \
e.g. \"- 2. Official documentation for the tool\". Never invent links. \
If none are relevant, write \"{NO_RELEVANT_LINKS}\"."
                )
            } else {
                format!("No links were provided. Write \"{NO_RELEVANT_LINKS}\".")
            }
        }
        SectionKind::Builtin(BuiltinSection::CreatorAdditions) => format!(
            "Corrections, extra tips or resources the creator added in their comments. {shape} \
If there are none, write \"{NO_RELEVANT_LINKS}\"."
        ),
        SectionKind::Custom { label, .. } => {
            let label = if label.is_empty() { &section.header } else { label };
            format!("Content for \"{label}\". {shape}")
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
