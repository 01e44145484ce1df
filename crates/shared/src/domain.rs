use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(PostId);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Author shown when a backend hands back a post without one.
pub const DEFAULT_AUTHOR: &str = "NorthByte Analyst";

pub const MAX_ATTACHMENT_NAME_BYTES: usize = 180;

/// A published report. Identifier and date are always assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub author: String,
    pub content: String,
    pub published_on: NaiveDate,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Default for PostDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: DEFAULT_AUTHOR.to_string(),
            content: String::new(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("attachment name exceeds {MAX_ATTACHMENT_NAME_BYTES} bytes")]
    AttachmentNameTooLong,
    #[error("attachment name must not contain path separators: {0}")]
    AttachmentPath(String),
}

impl PostDraft {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            content: content.into(),
            attachments,
        }
    }

    /// Returns a trimmed copy with blank attachment entries dropped, or the
    /// first rule the draft breaks.
    pub fn normalized(&self) -> Result<PostDraft, DraftError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftError::MissingField("title"));
        }
        let author = self.author.trim();
        if author.is_empty() {
            return Err(DraftError::MissingField("author"));
        }
        if self.content.trim().is_empty() {
            return Err(DraftError::MissingField("content"));
        }

        let mut attachments = Vec::with_capacity(self.attachments.len());
        for name in self.attachments.iter().map(|name| name.trim()) {
            if name.is_empty() {
                continue;
            }
            if name.len() > MAX_ATTACHMENT_NAME_BYTES {
                return Err(DraftError::AttachmentNameTooLong);
            }
            if name.contains('/') || name.contains('\\') {
                return Err(DraftError::AttachmentPath(name.to_string()));
            }
            attachments.push(name.to_string());
        }

        Ok(PostDraft {
            title: title.to_string(),
            author: author.to_string(),
            content: self.content.clone(),
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_trims_and_drops_blank_attachments() {
        let draft = PostDraft::new(
            "  Operation  ",
            " Analyst ",
            "body",
            vec!["a.pdf".into(), "   ".into(), " b.txt ".into()],
        );
        let normalized = draft.normalized().expect("valid draft");
        assert_eq!(normalized.title, "Operation");
        assert_eq!(normalized.author, "Analyst");
        assert_eq!(normalized.attachments, vec!["a.pdf", "b.txt"]);
    }

    #[test]
    fn rejects_missing_fields_in_order() {
        let draft = PostDraft::new("", "", "", Vec::new());
        assert_eq!(draft.normalized(), Err(DraftError::MissingField("title")));

        let draft = PostDraft::new("T", " ", "C", Vec::new());
        assert_eq!(draft.normalized(), Err(DraftError::MissingField("author")));

        let draft = PostDraft::new("T", "A", "\n", Vec::new());
        assert_eq!(draft.normalized(), Err(DraftError::MissingField("content")));
    }

    #[test]
    fn rejects_attachment_paths() {
        let draft = PostDraft::new("T", "A", "C", vec!["../etc/passwd".into()]);
        assert!(matches!(
            draft.normalized(),
            Err(DraftError::AttachmentPath(_))
        ));
    }

    #[test]
    fn default_draft_carries_placeholder_author() {
        assert_eq!(PostDraft::default().author, DEFAULT_AUTHOR);
    }
}
