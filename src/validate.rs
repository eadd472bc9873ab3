use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::parser::ParsedDocument;
use crate::schema::RequiredGroup;

/// Characters of raw input kept in a failing verdict.
pub const EXCERPT_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub missing: Vec<RequiredGroup>,
    /// Start of the raw document, present only when the verdict failed.
    pub excerpt: Option<String>,
}

/// Every required group must have content. The video section is never
/// required: its body is a fixed constant.
pub fn validate(doc: &ParsedDocument, raw: &str) -> ValidationVerdict {
    let missing: Vec<RequiredGroup> = RequiredGroup::ALL
        .into_iter()
        .filter(|group| !has_content(doc, *group))
        .collect();

    let passed = missing.is_empty();
    ValidationVerdict {
        passed,
        missing,
        excerpt: (!passed).then(|| excerpt(raw)),
    }
}

fn has_content(doc: &ParsedDocument, group: RequiredGroup) -> bool {
    match group {
        RequiredGroup::Bullets => !doc.bullets.is_empty(),
        RequiredGroup::Faq => doc.faqs.iter().any(|p| !p.answer.is_empty()),
        RequiredGroup::TechnicalDetails => !doc.details.is_empty(),
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            return write!(f, "document passed validation");
        }
        writeln!(
            f,
            "document failed validation; empty or missing: {}",
            self.missing.iter().map(|g| g.label()).join(", ")
        )?;
        if let Some(excerpt) = &self.excerpt {
            write!(f, "--- raw input (first {} chars) ---\n{}", EXCERPT_CHARS, excerpt)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{verdict}")]
pub struct ValidationFailed {
    pub verdict: ValidationVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.md", name)).unwrap()
    }

    #[test]
    fn canonical_passes() {
        let md = fixture("canonical");
        let verdict = validate(&parse_document(&md), &md);
        assert!(verdict.passed, "{}", verdict);
        assert!(verdict.missing.is_empty());
        assert!(verdict.excerpt.is_none());
    }

    #[test]
    fn refusal_fails_with_all_groups() {
        let md = fixture("refusal");
        let verdict = validate(&parse_document(&md), &md);
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, RequiredGroup::ALL.to_vec());
        assert!(verdict.excerpt.as_deref().unwrap().starts_with("Lo siento"));
        let message = verdict.to_string();
        assert!(message.contains("bullets"));
        assert!(message.contains("faq"));
        assert!(message.contains("technical details"));
    }

    #[test]
    fn one_missing_group_fails() {
        let md = fixture("canonical").replace("### 2. FAQ", "### Notas");
        // Without its heading the FAQ text folds into the bullets section body.
        let doc = parse_document(&md);
        let verdict = validate(&doc, &md);
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, vec![RequiredGroup::Faq]);
    }

    #[test]
    fn excerpt_bounded() {
        let md = "x".repeat(EXCERPT_CHARS * 2);
        let verdict = validate(&parse_document(&md), &md);
        assert_eq!(verdict.excerpt.unwrap().chars().count(), EXCERPT_CHARS);
    }
}
