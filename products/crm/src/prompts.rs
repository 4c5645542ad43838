//! Prompt templates for the text generator.
//!
//! Only the template differs between features; the response comes back as
//! free text and is used as-is, except tag suggestions which are split on
//! commas.

use serde::{Deserialize, Serialize};

const MAX_TAGS: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptKind {
    Insights,
    Search,
    Summary,
    EmailDraft,
    Tags,
}

impl PromptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Insights => "INSIGHTS",
            PromptKind::Search => "SEARCH",
            PromptKind::Summary => "SUMMARY",
            PromptKind::EmailDraft => "EMAIL_DRAFT",
            PromptKind::Tags => "TAGS",
        }
    }

    fn template(self) -> &'static str {
        match self {
            PromptKind::Insights => {
                "You are a CRM analyst. Review the following sales data and give three \
                 short, actionable insights for the team.\n\n{context}"
            }
            PromptKind::Search => {
                "You are searching a CRM. Using only the records below, answer the \
                 question and name the matching records.\n\n{context}"
            }
            PromptKind::Summary => {
                "Summarize the following customer history in one paragraph, highlighting \
                 open deals and next steps.\n\n{context}"
            }
            PromptKind::EmailDraft => {
                "Draft a short, friendly follow-up email based on the details below. \
                 Return only the email body.\n\n{context}"
            }
            PromptKind::Tags => {
                "Suggest up to five short tags for the customer below. Reply with a \
                 comma-separated list and nothing else.\n\n{context}"
            }
        }
    }

    pub fn render(self, context: &str) -> String {
        self.template().replace("{context}", context.trim())
    }
}

/// Split a tag suggestion on commas, dropping blanks.
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in text.split(',') {
        let tag = raw.trim();
        if tag.is_empty() {
            continue;
        }
        tags.push(tag.to_string());
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}
