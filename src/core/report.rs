//! The final synthesized report.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Section headings used when rendering the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportHeaders {
    /// Report title.
    pub title: String,
    /// Label for the generation date.
    pub date: String,
    /// Introduction heading.
    pub introduction: String,
    /// Table of contents heading.
    pub table_of_contents: String,
    /// Conclusion heading.
    pub conclusion: String,
    /// References heading.
    pub references: String,
}

impl ReportHeaders {
    /// Default English headers for a report titled `title`.
    #[must_use]
    pub fn for_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: "Date".to_string(),
            introduction: "Introduction".to_string(),
            table_of_contents: "Table of Contents".to_string(),
            conclusion: "Conclusion".to_string(),
            references: "References".to_string(),
        }
    }
}

/// One body section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    /// Section heading.
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Whether this is a placeholder substituted after a failed draft.
    #[serde(default)]
    pub placeholder: bool,
}

/// A cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Source title.
    #[serde(default)]
    pub title: String,
    /// Source URL.
    pub url: String,
}

/// The synthesized report, immutable once the pipeline returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Title.
    pub title: String,
    /// Table of contents entries.
    pub table_of_contents: Vec<String>,
    /// Introduction.
    pub introduction: String,
    /// Body sections.
    pub body_sections: Vec<ReportSection>,
    /// Conclusion.
    pub conclusion: String,
    /// Deduplicated citations.
    pub sources: Vec<SourceCitation>,
    /// Rendering headers.
    pub headers: ReportHeaders,
    /// Generation date (`YYYY-MM-DD`).
    pub date: String,
}

impl Report {
    /// Renders the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let h = &self.headers;
        let mut out = format!("# {}\n\n_{}: {}_\n\n", self.title, h.date, self.date);

        if !self.table_of_contents.is_empty() {
            let _ = writeln!(out, "## {}\n", h.table_of_contents);
            for entry in &self.table_of_contents {
                let _ = writeln!(out, "- {entry}");
            }
            out.push('\n');
        }

        if !self.introduction.trim().is_empty() {
            let _ = write!(out, "## {}\n\n{}\n\n", h.introduction, self.introduction.trim());
        }

        for section in &self.body_sections {
            let body = section.content.trim();
            // Drafted sections usually carry their own heading.
            if body.starts_with("## ") || body.starts_with("# ") {
                let _ = write!(out, "{body}\n\n");
            } else {
                let _ = write!(out, "## {}\n\n{body}\n\n", section.title);
            }
        }

        if !self.conclusion.trim().is_empty() {
            let _ = write!(out, "## {}\n\n{}\n\n", h.conclusion, self.conclusion.trim());
        }

        if !self.sources.is_empty() {
            let _ = writeln!(out, "## {}\n", h.references);
            for src in &self.sources {
                if src.title.is_empty() {
                    let _ = writeln!(out, "- <{}>", src.url);
                } else {
                    let _ = writeln!(out, "- [{}]({})", src.title, src.url);
                }
            }
        }

        out.trim_end().to_string() + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            title: "AI Trends".to_string(),
            table_of_contents: vec!["Models".to_string()],
            introduction: "Intro text".to_string(),
            body_sections: vec![
                ReportSection {
                    title: "Models".to_string(),
                    content: "Bigger models.".to_string(),
                    placeholder: false,
                },
                ReportSection {
                    title: "Agents".to_string(),
                    content: "## Agents\n\nTool use.".to_string(),
                    placeholder: false,
                },
            ],
            conclusion: "Wrap up".to_string(),
            sources: vec![SourceCitation {
                title: "Paper".to_string(),
                url: "https://example.com/p".to_string(),
            }],
            headers: ReportHeaders::for_title("AI Trends"),
            date: "2026-01-01".to_string(),
        }
    }

    #[test]
    fn test_markdown_contains_all_parts() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# AI Trends"));
        assert!(md.contains("## Table of Contents\n\n- Models"));
        assert!(md.contains("## Introduction\n\nIntro text"));
        assert!(md.contains("## Models\n\nBigger models."));
        assert!(md.contains("## Conclusion\n\nWrap up"));
        assert!(md.contains("- [Paper](https://example.com/p)"));
    }

    #[test]
    fn test_markdown_does_not_duplicate_section_heading() {
        let md = sample().to_markdown();
        assert_eq!(md.matches("## Agents").count(), 1);
    }

    #[test]
    fn test_markdown_skips_empty_parts() {
        let mut r = sample();
        r.introduction.clear();
        r.sources.clear();
        r.table_of_contents.clear();
        let md = r.to_markdown();
        assert!(!md.contains("## Introduction"));
        assert!(!md.contains("## References"));
        assert!(!md.contains("## Table of Contents"));
    }
}
