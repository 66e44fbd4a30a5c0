//! Profile form

use super::{max_length, required, FormErrors};
use crate::models::{ProfileInput, User};
use serde::{Deserialize, Serialize};

const NAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;

/// Letters, digits and `@ . + - _` only
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

/// Checks shared by the profile and registration forms
pub(crate) fn check_username(errors: &mut FormErrors, raw: &str) -> String {
    let username = required(errors, "username", raw);
    max_length(errors, "username", username, NAME_MAX);
    if !username.is_empty() && !is_valid_username(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username.to_string()
}

/// The fields a user may edit about themselves. Password, role flags and
/// join date are not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl UserForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }

    pub fn validate(&self) -> Result<ProfileInput, FormErrors> {
        let mut errors = FormErrors::new();

        let username = check_username(&mut errors, &self.username);
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        max_length(&mut errors, "first_name", first_name, NAME_MAX);
        max_length(&mut errors, "last_name", last_name, NAME_MAX);

        let email = self.email.trim();
        max_length(&mut errors, "email", email, EMAIL_MAX);
        if !email.is_empty() && !looks_like_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        errors.into_result(ProfileInput {
            username,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
