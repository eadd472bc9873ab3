use serde::{Deserialize, Serialize};

/// Node tree the commerce platform expects in `rich_text_field` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RichTextNode {
    Root {
        children: Vec<RichTextNode>,
    },
    Paragraph {
        children: Vec<RichTextNode>,
    },
    Text {
        value: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        bold: bool,
    },
}

impl RichTextNode {
    /// One paragraph per entry; `**bold**` spans become bold text nodes.
    pub fn from_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Self {
        let children = paragraphs
            .iter()
            .map(|p| paragraph(p.as_ref()))
            .filter(|p| matches!(p, RichTextNode::Paragraph { children } if !children.is_empty()))
            .collect();
        RichTextNode::Root { children }
    }

    pub fn from_markdown(text: &str) -> Self {
        Self::from_paragraphs(&[text])
    }

    /// Compact JSON, the form stored remotely.
    pub fn to_json(&self) -> String {
        // A tree of strings and bools always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Concatenated text of every node, bold markers dropped.
    pub fn plain_text(&self) -> String {
        match self {
            RichTextNode::Root { children } => children
                .iter()
                .map(RichTextNode::plain_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
            RichTextNode::Paragraph { children } => {
                children.iter().map(RichTextNode::plain_text).collect()
            }
            RichTextNode::Text { value, .. } => value.clone(),
        }
    }
}

fn paragraph(text: &str) -> RichTextNode {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut children = Vec::new();
    let mut bold = false;
    let mut trailing_empty = false;

    for (idx, span) in text.split("**").enumerate() {
        if idx > 0 {
            bold = !bold;
        }
        trailing_empty = span.is_empty();
        if trailing_empty {
            continue;
        }
        children.push(RichTextNode::Text {
            value: span.to_string(),
            bold,
        });
    }

    // Unbalanced `**`: the marker was never closed, keep it and its span plain.
    if bold {
        match children.last_mut() {
            Some(RichTextNode::Text { bold, value }) if !trailing_empty => {
                *bold = false;
                value.insert_str(0, "**");
            }
            _ => children.push(RichTextNode::Text {
                value: "**".to_string(),
                bold: false,
            }),
        }
    }

    RichTextNode::Paragraph { children }
}
