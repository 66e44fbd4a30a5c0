//! Post create/edit form

use super::{max_length, required, FormErrors};
use crate::models::{Post, PostInput};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of the `pub_date` field, as produced by `<input type="datetime-local">`
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

const PUB_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

const TITLE_MAX: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pub_date: String,
    /// Category id
    #[serde(default)]
    pub category: String,
    /// Location id, blank for none
    #[serde(default)]
    pub location: String,
    /// Checkbox: present means checked
    #[serde(default)]
    pub is_published: Option<String>,
}

impl PostForm {
    /// Initial values for a new post: published, dated now
    pub fn blank(now: DateTime<Utc>) -> Self {
        Self {
            pub_date: now.format(PUB_DATE_FORMAT).to_string(),
            is_published: Some("on".to_string()),
            ..Self::default()
        }
    }

    /// Prefill from a stored post
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format(PUB_DATE_FORMAT).to_string(),
            category: post.category_id.to_string(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: post.is_published.then(|| "on".to_string()),
        }
    }

    pub fn validate(&self) -> Result<PostInput, FormErrors> {
        let mut errors = FormErrors::new();

        let title = required(&mut errors, "title", &self.title);
        max_length(&mut errors, "title", title, TITLE_MAX);
        let text = required(&mut errors, "text", &self.text);

        let pub_date = match required(&mut errors, "pub_date", &self.pub_date) {
            "" => None,
            raw => {
                let parsed = parse_pub_date(raw);
                if parsed.is_none() {
                    errors.add("pub_date", "Enter a valid date/time.");
                }
                parsed
            }
        };

        let category_id = match required(&mut errors, "category", &self.category) {
            "" => None,
            raw => {
                let parsed = raw.parse::<i64>().ok();
                if parsed.is_none() {
                    errors.add("category", "Select a valid choice.");
                }
                parsed
            }
        };

        let location_id = match self.location.trim() {
            "" => None,
            raw => {
                let parsed = raw.parse::<i64>().ok();
                if parsed.is_none() {
                    errors.add("location", "Select a valid choice.");
                }
                parsed
            }
        };

        match (pub_date, category_id) {
            (Some(pub_date), Some(category_id)) if errors.is_empty() => Ok(PostInput {
                title: title.to_string(),
                text: text.to_string(),
                pub_date,
                category_id,
                location_id,
                is_published: self.is_published.is_some(),
            }),
            _ => Err(errors),
        }
    }
}

/// Parse a naive timestamp from the form as UTC
fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    PUB_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid() -> PostForm {
        PostForm {
            title: "Trip".to_string(),
            text: "We went north.".to_string(),
            pub_date: "2024-03-01T10:30".to_string(),
            category: "2".to_string(),
            location: String::new(),
            is_published: Some("on".to_string()),
        }
    }

    #[test]
    fn test_valid_form() {
        let input = valid().validate().expect("form should validate");
        assert_eq!(input.title, "Trip");
        assert_eq!(input.pub_date, Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap());
        assert_eq!(input.category_id, 2);
        assert_eq!(input.location_id, None);
        assert!(input.is_published);
    }

    #[test]
    fn test_unchecked_box_means_unpublished() {
        let form = PostForm {
            is_published: None,
            location: "7".to_string(),
            ..valid()
        };
        let input = form.validate().unwrap();
        assert!(!input.is_published);
        assert_eq!(input.location_id, Some(7));
    }

    #[test]
    fn test_seconds_are_accepted() {
        let form = PostForm {
            pub_date: "2024-03-01T10:30:15".to_string(),
            ..valid()
        };
        assert_eq!(
            form.validate().unwrap().pub_date,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 15).unwrap()
        );
    }

    #[test]
    fn test_empty_form_reports_required_fields() {
        let errors = PostForm::default().validate().unwrap_err();
        for field in ["title", "text", "pub_date", "category"] {
            assert!(errors.has(field), "missing error for {}", field);
        }
        assert!(!errors.has("location"));
    }

    #[test]
    fn test_bad_values() {
        let form = PostForm {
            title: "x".repeat(257),
            pub_date: "yesterday".to_string(),
            category: "abc".to_string(),
            location: "nowhere".to_string(),
            ..valid()
        };
        let errors = form.validate().unwrap_err();
        for field in ["title", "pub_date", "category", "location"] {
            assert!(errors.has(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_from_post_round_trips_through_validate() {
        let input = valid().validate().unwrap();
        let post = Post::new(1, input.clone());
        assert_eq!(PostForm::from_post(&post).validate().unwrap(), input);
    }
}
