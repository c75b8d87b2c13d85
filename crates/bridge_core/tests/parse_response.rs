use std::sync::Once;

use bridge_core::{
    parse_response, OutputTemplate, ParsedResult, Reference, RelevantLink, Section, SectionContent,
    SectionFormat, CREATOR_PREFIX, EXTRACTION_FAILED_LEARNINGS, SUMMARY_FALLBACK_CHARS,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bridge_logging::initialize_for_tests);
}

fn references() -> Vec<Reference> {
    vec![
        Reference::new("https://a", "Site A"),
        Reference::new("https://b", "Site B"),
        Reference::new("https://c", "Site C"),
    ]
}

fn four_section_template() -> OutputTemplate {
    OutputTemplate::new(vec![
        Section::new("summary", "Summary", SectionFormat::Prose),
        Section::new("keyLearnings", "Key Learnings", SectionFormat::Bullets),
        Section::new("actionItems", "Action Items", SectionFormat::Bullets),
        Section::new("relevantLinks", "Relevant Links", SectionFormat::Bullets),
    ])
}

#[test]
fn well_formed_response_recovers_authored_bullets() {
    init_logging();
    let raw = "\
SUMMARY:
The talk explains ownership in Rust.
It closes with borrowing.

KEY LEARNINGS:
- Every value has one owner
• Borrows never outlive the owner
3. Moves transfer ownership

ACTION ITEMS:
- Rewrite the parser without clones

RELEVANT LINKS:
- 2. The book chapter
";
    let parsed = parse_response(raw, &references(), Some(&four_section_template()));

    assert_eq!(
        parsed,
        ParsedResult {
            summary: "The talk explains ownership in Rust.\nIt closes with borrowing.".to_string(),
            key_learnings: vec![
                "Every value has one owner".to_string(),
                "Borrows never outlive the owner".to_string(),
                "Moves transfer ownership".to_string(),
            ],
            action_items: vec!["Rewrite the parser without clones".to_string()],
            relevant_links: vec![RelevantLink {
                url: "https://b".to_string(),
                text: "Site B".to_string(),
                reason: "The book chapter".to_string(),
            }],
            custom_sections: Vec::new(),
        }
    );
}

#[test]
fn link_ordinals_map_onto_reference_list() {
    let raw = "SUMMARY:\nx\n\nRELEVANT LINKS:\n- 1. good\n- 3. also good\n";
    let parsed = parse_response(raw, &references(), None);

    let links: Vec<(&str, &str)> = parsed
        .relevant_links
        .iter()
        .map(|l| (l.url.as_str(), l.reason.as_str()))
        .collect();
    assert_eq!(links, vec![("https://a", "good"), ("https://c", "also good")]);
}

#[test]
fn out_of_range_and_duplicate_ordinals_are_dropped() {
    let raw = "RELEVANT LINKS:\n- 0. zero\n- 4. past the end\n- 2. first\n- 2. again\n- [3] bracketed\n";
    let parsed = parse_response(raw, &references(), None);

    let urls: Vec<&str> = parsed.relevant_links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, vec!["https://b", "https://c"]);
    assert_eq!(parsed.relevant_links[0].reason, "first");
    assert_eq!(parsed.relevant_links[1].reason, "bracketed");
}

#[test]
fn equivalent_urls_in_reference_list_count_as_duplicates() {
    let refs = vec![
        Reference::new("https://example.com/docs/", "Docs"),
        Reference::new("https://EXAMPLE.com/docs#intro", "Docs again"),
    ];
    let parsed = parse_response("RELEVANT LINKS:\n1. one\n2. two\n", &refs, None);

    assert_eq!(parsed.relevant_links.len(), 1);
    assert_eq!(parsed.relevant_links[0].url, "https://example.com/docs/");
}

#[test]
fn negative_result_phrases_empty_the_section() {
    let raw = "\
SUMMARY:
Short.
KEY LEARNINGS:
- One
ACTION ITEMS:
No specific action items identified.
RELEVANT LINKS:
None
";
    let parsed = parse_response(raw, &references(), None);

    assert_eq!(parsed.action_items, Vec::<String>::new());
    assert!(parsed.relevant_links.is_empty());
    assert_eq!(parsed.key_learnings, vec!["One".to_string()]);
}

#[test]
fn garbage_without_headers_still_yields_learnings_and_summary() {
    init_logging();
    let parsed = parse_response("garbage with no headers", &[], None);

    assert!(!parsed.key_learnings.is_empty());
    assert_eq!(parsed.key_learnings, EXTRACTION_FAILED_LEARNINGS.map(String::from).to_vec());
    assert_eq!(parsed.summary, "garbage with no headers");
    assert!(parsed.action_items.is_empty());
}

#[test]
fn missing_summary_falls_back_to_response_prefix() {
    let raw = format!("{}\nKEY LEARNINGS:\n- a", "w".repeat(SUMMARY_FALLBACK_CHARS + 50));
    let parsed = parse_response(&raw, &[], None);

    assert_eq!(parsed.summary.chars().count(), SUMMARY_FALLBACK_CHARS);
    assert_eq!(parsed.key_learnings, vec!["a".to_string()]);
}

#[test]
fn header_inside_a_sentence_is_not_a_boundary() {
    let raw = "\
SUMMARY:
The speaker lists key learnings: patience and focus.
Their action items are vague.
KEY LEARNINGS:
- Patience
";
    let parsed = parse_response(raw, &[], None);

    assert_eq!(
        parsed.summary,
        "The speaker lists key learnings: patience and focus.\nTheir action items are vague."
    );
    assert_eq!(parsed.key_learnings, vec!["Patience".to_string()]);
}

#[test]
fn markdown_decorated_and_lowercase_headers_are_recognised() {
    let raw = "\
## Summary
A summary.
**Key Learnings:**
- A learning
action items: - inline item
";
    let parsed = parse_response(raw, &[], None);

    assert_eq!(parsed.summary, "A summary.");
    assert_eq!(parsed.key_learnings, vec!["A learning".to_string()]);
    assert_eq!(parsed.action_items, vec!["inline item".to_string()]);
}

#[test]
fn creator_additions_fold_into_learnings_with_marker() {
    let raw = "\
SUMMARY:
s
KEY LEARNINGS:
- Main point
CREATOR ADDITIONS:
- Version 2 fixes the bug
";
    let parsed = parse_response(raw, &[], None);

    assert_eq!(
        parsed.key_learnings,
        vec![
            "Main point".to_string(),
            format!("{CREATOR_PREFIX}Version 2 fixes the bug"),
        ]
    );
}

#[test]
fn template_labels_drive_headers_and_custom_sections() {
    let template = OutputTemplate::new(vec![
        Section::new("summary", "TL;DR", SectionFormat::Prose),
        Section::new("keyLearnings", "Takeaways", SectionFormat::Bullets),
        Section::new("quotes", "Best Quotes", SectionFormat::Bullets),
        Section::new("mood", "Mood", SectionFormat::Prose),
    ]);
    let raw = "\
TL;DR:
Short version.
TAKEAWAYS:
- Takeaway one
BEST QUOTES:
- \"Ship it\"
MOOD:
Upbeat throughout.
SUMMARY:
this header is not part of the template
";
    let parsed = parse_response(raw, &[], Some(&template));

    assert_eq!(parsed.summary, "Short version.");
    assert_eq!(parsed.key_learnings, vec!["Takeaway one".to_string()]);
    assert_eq!(parsed.custom_sections.len(), 2);
    assert_eq!(parsed.custom_sections[0].id, "quotes");
    assert_eq!(
        parsed.custom_sections[0].content,
        SectionContent::Bullets(vec!["\"Ship it\"".to_string()])
    );
    assert_eq!(
        parsed.custom_sections[1].content,
        SectionContent::Prose(
            "Upbeat throughout.\nSUMMARY:\nthis header is not part of the template".to_string()
        )
    );
}

#[test]
fn prose_formatted_learnings_without_bullets_become_one_item() {
    let template = OutputTemplate::new(vec![Section::new(
        "keyLearnings",
        "Lessons",
        SectionFormat::Prose,
    )]);
    let parsed = parse_response("LESSONS:\nAlways measure first.", &[], Some(&template));

    assert_eq!(parsed.key_learnings, vec!["Always measure first.".to_string()]);
}

#[test]
fn parsed_result_serializes_with_camel_case_fields() {
    let parsed = parse_response("SUMMARY:\ns\nKEY LEARNINGS:\n- k", &[], None);
    let json = serde_json::to_value(&parsed).unwrap();

    assert_eq!(json["summary"], "s");
    assert_eq!(json["keyLearnings"][0], "k");
    assert!(json["actionItems"].as_array().unwrap().is_empty());
    assert!(json["relevantLinks"].as_array().unwrap().is_empty());
    assert!(json.get("customSections").is_none());
}
