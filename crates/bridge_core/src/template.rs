//! User-configurable output sections and the header convention shared by the
//! prompt builder and the response parser.

use std::collections::HashSet;

use bridge_logging::bridge_warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionFormat {
    #[default]
    Prose,
    Bullets,
}

/// Sections the pipeline knows how to map onto [`crate::ParsedResult`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinSection {
    Summary,
    KeyLearnings,
    ActionItems,
    RelevantLinks,
    CreatorAdditions,
}

/// Section id aliases accepted from templates.
const SECTION_IDS: &[(&str, BuiltinSection)] = &[
    ("summary", BuiltinSection::Summary),
    ("keyLearnings", BuiltinSection::KeyLearnings),
    ("key_learnings", BuiltinSection::KeyLearnings),
    ("learnings", BuiltinSection::KeyLearnings),
    ("actionItems", BuiltinSection::ActionItems),
    ("action_items", BuiltinSection::ActionItems),
    ("actions", BuiltinSection::ActionItems),
    ("relevantLinks", BuiltinSection::RelevantLinks),
    ("relevant_links", BuiltinSection::RelevantLinks),
    ("links", BuiltinSection::RelevantLinks),
    ("creatorAdditions", BuiltinSection::CreatorAdditions),
    ("creator_additions", BuiltinSection::CreatorAdditions),
];

impl BuiltinSection {
    pub fn from_id(id: &str) -> Option<Self> {
        SECTION_IDS
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(id.trim()))
            .map(|(_, section)| *section)
    }

    pub fn default_header(self) -> &'static str {
        match self {
            BuiltinSection::Summary => "SUMMARY",
            BuiltinSection::KeyLearnings => "KEY LEARNINGS",
            BuiltinSection::ActionItems => "ACTION ITEMS",
            BuiltinSection::RelevantLinks => "RELEVANT LINKS",
            BuiltinSection::CreatorAdditions => "CREATOR ADDITIONS",
        }
    }

    pub fn default_format(self) -> SectionFormat {
        match self {
            BuiltinSection::Summary => SectionFormat::Prose,
            _ => SectionFormat::Bullets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Builtin(BuiltinSection),
    Custom { id: String, label: String },
}

/// One section the model is asked to emit, with its literal header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSection {
    pub kind: SectionKind,
    pub header: String,
    pub format: SectionFormat,
}

impl ActiveSection {
    fn builtin(section: BuiltinSection) -> Self {
        Self {
            kind: SectionKind::Builtin(section),
            header: section.default_header().to_string(),
            format: section.default_format(),
        }
    }

    pub fn builtin_kind(&self) -> Option<BuiltinSection> {
        match self.kind {
            SectionKind::Builtin(section) => Some(section),
            SectionKind::Custom { .. } => None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub format: SectionFormat,
}

impl Section {
    pub fn new(id: impl Into<String>, label: impl Into<String>, format: SectionFormat) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            enabled: true,
            format,
        }
    }

    fn header(&self) -> String {
        let label = self.label.trim();
        if !label.is_empty() {
            return label.to_uppercase();
        }
        match BuiltinSection::from_id(&self.id) {
            Some(section) => section.default_header().to_string(),
            None => self.id.trim().to_uppercase(),
        }
    }
}

/// Ordered section list. Ids are unique; the first occurrence of an id wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Section>", into = "Vec<Section>")]
pub struct OutputTemplate {
    sections: Vec<Section>,
}

impl From<Vec<Section>> for OutputTemplate {
    fn from(sections: Vec<Section>) -> Self {
        Self::new(sections)
    }
}

impl From<OutputTemplate> for Vec<Section> {
    fn from(template: OutputTemplate) -> Self {
        template.sections
    }
}

impl OutputTemplate {
    pub fn new(sections: Vec<Section>) -> Self {
        let mut seen = HashSet::new();
        let sections = sections
            .into_iter()
            .filter(|section| {
                let fresh = seen.insert(section.id.clone());
                if !fresh {
                    bridge_warn!("Dropping duplicate template section id {:?}", section.id);
                }
                fresh
            })
            .collect();
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// True when the template selects at least one section.
    pub fn has_enabled_sections(&self) -> bool {
        self.sections
            .iter()
            .any(|section| section.enabled && !section.header().is_empty())
    }

    /// Sections to request and parse, in order.
    ///
    /// `template` of `None`, empty, or all-disabled selects the default set;
    /// creator additions are part of the default set only when
    /// `include_creator_additions` is set.
    pub fn active_sections(
        template: Option<&OutputTemplate>,
        include_creator_additions: bool,
    ) -> Vec<ActiveSection> {
        match template.filter(|t| t.has_enabled_sections()) {
            Some(template) => template
                .sections
                .iter()
                .filter(|section| section.enabled)
                .filter_map(|section| {
                    let header = section.header();
                    if header.is_empty() {
                        return None;
                    }
                    let kind = match BuiltinSection::from_id(&section.id) {
                        Some(builtin) => SectionKind::Builtin(builtin),
                        None => SectionKind::Custom {
                            id: section.id.clone(),
                            label: section.label.trim().to_string(),
                        },
                    };
                    Some(ActiveSection {
                        kind,
                        header,
                        format: section.format,
                    })
                })
                .collect(),
            None => {
                let mut sections = vec![
                    ActiveSection::builtin(BuiltinSection::Summary),
                    ActiveSection::builtin(BuiltinSection::KeyLearnings),
                    ActiveSection::builtin(BuiltinSection::ActionItems),
                    ActiveSection::builtin(BuiltinSection::RelevantLinks),
                ];
                if include_creator_additions {
                    sections.push(ActiveSection::builtin(BuiltinSection::CreatorAdditions));
                }
                sections
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_disabled_template_falls_back_to_defaults() {
        let mut section = Section::new("summary", "TL;DR", SectionFormat::Prose);
        section.enabled = false;
        let template = OutputTemplate::new(vec![section]);

        let headers: Vec<_> = OutputTemplate::active_sections(Some(&template), false)
            .into_iter()
            .map(|s| s.header)
            .collect();
        assert_eq!(
            headers,
            vec!["SUMMARY", "KEY LEARNINGS", "ACTION ITEMS", "RELEVANT LINKS"]
        );
    }

    #[test]
    fn labels_are_uppercased_and_ids_classified() {
        let template = OutputTemplate::new(vec![
            Section::new("summary", "Tl;dr", SectionFormat::Prose),
            Section::new("quotes", "Best Quotes", SectionFormat::Bullets),
        ]);

        let active = OutputTemplate::active_sections(Some(&template), true);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].header, "TL;DR");
        assert_eq!(active[0].builtin_kind(), Some(BuiltinSection::Summary));
        assert_eq!(active[1].header, "BEST QUOTES");
        assert_eq!(
            active[1].kind,
            SectionKind::Custom {
                id: "quotes".to_string(),
                label: "Best Quotes".to_string()
            }
        );
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let template = OutputTemplate::new(vec![
            Section::new("summary", "First", SectionFormat::Prose),
            Section::new("summary", "Second", SectionFormat::Prose),
        ]);
        assert_eq!(template.sections().len(), 1);
        assert_eq!(template.sections()[0].label, "First");
    }

    #[test]
    fn template_deserializes_from_section_array() {
        let json = r#"[{"id":"keyLearnings","label":"Takeaways","format":"bullets"},
                       {"id":"notes","label":"Notes","enabled":false}]"#;
        let template: OutputTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.sections().len(), 2);
        assert!(template.sections()[0].enabled);
        assert_eq!(template.sections()[1].format, SectionFormat::Prose);

        let active = OutputTemplate::active_sections(Some(&template), false);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].header, "TAKEAWAYS");
    }
}
