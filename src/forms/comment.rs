//! Comment form

use super::{required, FormErrors};
use serde::{Deserialize, Serialize};

/// Only the text is user-supplied; post and author come from the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The trimmed comment text
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = required(&mut errors, "text", &self.text).to_string();
        errors.into_result(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_required() {
        assert_eq!(CommentForm::new("  nice post ").validate().unwrap(), "nice post");
        assert!(CommentForm::new("").validate().unwrap_err().has("text"));
        assert!(CommentForm::new(" \n\t ").validate().is_err());
    }
}
