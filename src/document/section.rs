//! Grammar sections and the segmenter that splits a document into them.
//!
//! A document is a sequence of contiguous sections. A section starts at a
//! declaration line such as `###Mapping`, which names the grammar governing
//! the lines up to the next declaration. Content before the first
//! declaration belongs to an implicit section under the default grammar.

use std::sync::LazyLock;

use regex::Regex;

use super::location::{Interval, Position};
use super::text::LineIndex;

/// Grammar used for implicit sections when no setting overrides it.
pub const DEFAULT_GRAMMAR: &str = "Pure";

static DECLARATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*###(\w+)\s*$").unwrap());

/// A contiguous, grammar-typed region of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Section {
    /// Name of the grammar governing this section.
    pub grammar_name: String,
    /// First line of the section.
    pub start_line: u32,
    /// Last line of the section (inclusive).
    pub end_line: u32,
    /// Line holding the `###name` declaration, if the section has one.
    pub declaration_line: Option<u32>,
}

impl Section {
    pub fn has_explicit_declaration(&self) -> bool {
        self.declaration_line.is_some()
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Whether a section from a previous parse can stand for this one.
    ///
    /// The end line is deliberately not compared so that growing or shrinking
    /// the tail of a section keeps its identity.
    pub fn same_identity(&self, other: &Section) -> bool {
        self.grammar_name == other.grammar_name
            && self.start_line == other.start_line
            && self.has_explicit_declaration() == other.has_explicit_declaration()
    }

    /// Interval spanning the section's lines in `line_index`.
    ///
    /// The interval ends at the first byte of the last character of the last
    /// line, or at its start when that line is empty.
    pub fn interval(&self, line_index: &LineIndex) -> Interval {
        let last_char = line_index
            .line_content(self.end_line)
            .ok()
            .and_then(|content| content.char_indices().last())
            .map(|(i, _)| i as u32)
            .unwrap_or(0);
        let end = Position::new(self.end_line, last_char);
        Interval::new(Position::new(self.start_line, 0), end)
            .unwrap_or_else(|_| Interval::point(Position::new(self.start_line, 0)))
    }
}

/// Splits documents into grammar sections.
#[derive(Debug, Clone)]
pub struct SectionSegmenter {
    default_grammar: String,
}

impl Default for SectionSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_GRAMMAR)
    }
}

impl SectionSegmenter {
    pub fn new(default_grammar: impl Into<String>) -> Self {
        Self {
            default_grammar: default_grammar.into(),
        }
    }

    pub fn default_grammar(&self) -> &str {
        &self.default_grammar
    }

    /// Segment a document into ordered, contiguous sections.
    ///
    /// Sections cover every line except the empty line that follows a
    /// terminal line break. Blank lines before the first declaration are
    /// folded into the first declared section instead of producing an
    /// implicit leading section.
    pub fn segment(&self, line_index: &LineIndex) -> Vec<Section> {
        let last_line = last_segmented_line(line_index);

        let declarations: Vec<(u32, String)> = (0..=last_line)
            .filter_map(|line| {
                let content = line_index.line_content(line).ok()?;
                let caps = DECLARATION_PATTERN.captures(content)?;
                Some((line, caps[1].to_string()))
            })
            .collect();

        let Some(&(first_declaration, _)) = declarations.first() else {
            return vec![Section {
                grammar_name: self.default_grammar.clone(),
                start_line: 0,
                end_line: last_line,
                declaration_line: None,
            }];
        };

        let mut sections = Vec::with_capacity(declarations.len() + 1);
        let leading_content = (0..first_declaration).any(|line| {
            line_index
                .line_content(line)
                .map(|content| !content.trim().is_empty())
                .unwrap_or(false)
        });
        if leading_content {
            sections.push(Section {
                grammar_name: self.default_grammar.clone(),
                start_line: 0,
                end_line: first_declaration - 1,
                declaration_line: None,
            });
        }

        for (i, (line, grammar_name)) in declarations.iter().enumerate() {
            let start_line = if i == 0 && !leading_content { 0 } else { *line };
            let end_line = declarations
                .get(i + 1)
                .map(|(next, _)| next - 1)
                .unwrap_or(last_line);
            sections.push(Section {
                grammar_name: grammar_name.clone(),
                start_line,
                end_line,
                declaration_line: Some(*line),
            });
        }

        log::debug!(
            target: "seclsp::segment",
            "segmented {} lines into {} sections",
            last_line + 1,
            sections.len()
        );
        sections
    }
}

/// Last line that belongs to a section.
pub(crate) fn last_segmented_line(line_index: &LineIndex) -> u32 {
    let last = line_index.line_count() - 1;
    if last > 0 && line_index.has_trailing_line_break() {
        last - 1
    } else {
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segment(text: &str) -> Vec<Section> {
        SectionSegmenter::default().segment(&LineIndex::new(text.to_string()))
    }

    fn section(grammar: &str, start: u32, end: u32, decl: Option<u32>) -> Section {
        Section {
            grammar_name: grammar.to_string(),
            start_line: start,
            end_line: end,
            declaration_line: decl,
        }
    }

    fn assert_invariants(sections: &[Section], line_index: &LineIndex) {
        assert!(!sections.is_empty());
        assert_eq!(sections[0].start_line, 0);
        assert_eq!(
            sections.last().unwrap().end_line,
            last_segmented_line(line_index)
        );
        for pair in sections.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
            assert!(pair[1].has_explicit_declaration());
        }
        for s in sections {
            assert!(s.start_line <= s.end_line);
        }
    }

    #[test]
    fn no_declaration_is_one_implicit_section() {
        let sections = segment("Class a\nClass b");
        assert_eq!(sections, vec![section("Pure", 0, 1, None)]);
    }

    #[test]
    fn empty_document_is_one_implicit_section() {
        assert_eq!(segment(""), vec![section("Pure", 0, 0, None)]);
    }

    #[test]
    fn leading_content_becomes_implicit_section() {
        let sections = segment("Class a\n###Mapping\nMapping b\n(\n)\n");
        assert_eq!(
            sections,
            vec![
                section("Pure", 0, 0, None),
                section("Mapping", 1, 4, Some(1)),
            ]
        );
    }

    #[test]
    fn blank_prefix_is_folded_into_first_section() {
        let sections = segment("\n  \n###Pure\nClass a\n###Mapping\nMapping b");
        assert_eq!(
            sections,
            vec![
                section("Pure", 0, 3, Some(2)),
                section("Mapping", 4, 5, Some(4)),
            ]
        );
    }

    #[test]
    fn declaration_tolerates_surrounding_whitespace() {
        let sections = segment("  ###Relational  \nDatabase d");
        assert_eq!(sections, vec![section("Relational", 0, 1, Some(0))]);
    }

    #[test]
    fn malformed_declarations_are_content() {
        let sections = segment("### Mapping\n###Map ping\nx ###Mapping\n##Mapping");
        assert_eq!(sections, vec![section("Pure", 0, 3, None)]);
    }

    #[test]
    fn consecutive_declarations() {
        let sections = segment("###A\n###B\n###C");
        assert_eq!(
            sections,
            vec![
                section("A", 0, 0, Some(0)),
                section("B", 1, 1, Some(1)),
                section("C", 2, 2, Some(2)),
            ]
        );
    }

    #[test]
    fn crlf_documents() {
        let sections = segment("Class a\r\n###Mapping\r\nMapping b\r\n");
        assert_eq!(
            sections,
            vec![
                section("Pure", 0, 0, None),
                section("Mapping", 1, 2, Some(1)),
            ]
        );
    }

    #[test]
    fn custom_default_grammar() {
        let segmenter = SectionSegmenter::new("Text");
        let sections = segmenter.segment(&LineIndex::new("hello".to_string()));
        assert_eq!(sections, vec![section("Text", 0, 0, None)]);
    }

    #[test]
    fn identity_ignores_end_line() {
        let a = section("Mapping", 1, 4, Some(1));
        let b = section("Mapping", 1, 7, Some(1));
        let c = section("Mapping", 2, 7, Some(2));
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }

    #[test]
    fn section_interval_spans_its_lines() {
        let idx = LineIndex::new("Class a\n###Mapping\nMapping b\n".to_string());
        let sections = SectionSegmenter::default().segment(&idx);
        assert_eq!(sections[1].interval(&idx).to_string(), "1:0-2:8");
    }

    #[test]
    fn section_interval_ends_on_a_character_boundary() {
        let idx = LineIndex::new("Class é".to_string());
        let sections = SectionSegmenter::default().segment(&idx);
        let interval = sections[0].interval(&idx);
        assert_eq!(interval.to_string(), "0:0-0:6");
        assert_eq!(idx.interval_text(&interval).unwrap(), "Class é");
    }

    #[test]
    fn contains_line_is_inclusive() {
        let s = section("Mapping", 2, 4, Some(2));
        assert!(!s.contains_line(1));
        assert!(s.contains_line(2));
        assert!(s.contains_line(4));
        assert!(!s.contains_line(5));
    }

    proptest! {
        #[test]
        fn sections_are_ordered_contiguous_and_complete(
            lines in prop::collection::vec(
                prop_oneof![
                    Just("###Mapping".to_string()),
                    Just("  ###Pure ".to_string()),
                    Just("".to_string()),
                    Just("   ".to_string()),
                    "[a-z ]{1,8}",
                ],
                0..12,
            ),
            trailing in any::<bool>(),
        ) {
            let mut text = lines.join("\n");
            if trailing {
                text.push('\n');
            }
            let idx = LineIndex::new(text);
            let segmenter = SectionSegmenter::default();
            let sections = segmenter.segment(&idx);
            assert_invariants(&sections, &idx);
            prop_assert_eq!(sections, segmenter.segment(&idx));
        }
    }
}
