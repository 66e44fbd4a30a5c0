//! Account forms: sign up, log in, password change

use super::user::check_username;
use super::{required, FormErrors};
use serde::{Deserialize, Serialize};

const PASSWORD_MIN: usize = 8;

/// Password strength rules shared by registration and password change.
/// Mismatch and strength problems are reported on the confirmation field.
fn check_new_password(
    errors: &mut FormErrors,
    (field, first): (&str, &str),
    (confirm_field, second): (&str, &str),
) {
    if first.is_empty() {
        errors.add(field, super::REQUIRED);
        return;
    }
    if second.is_empty() {
        errors.add(confirm_field, super::REQUIRED);
        return;
    }
    if first != second {
        errors.add(confirm_field, "The two password fields didn't match.");
        return;
    }
    if first.chars().count() < PASSWORD_MIN {
        errors.add(
            confirm_field,
            format!(
                "This password is too short. It must contain at least {} characters.",
                PASSWORD_MIN
            ),
        );
    }
    if first.chars().all(|c| c.is_ascii_digit()) {
        errors.add(confirm_field, "This password is entirely numeric.");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl RegistrationForm {
    /// Username and plaintext password
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = check_username(&mut errors, &self.username);
        check_new_password(
            &mut errors,
            ("password1", self.password1.as_str()),
            ("password2", self.password2.as_str()),
        );
        errors.into_result((username, self.password1.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Where to go after a successful login
    #[serde(default)]
    pub next: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = required(&mut errors, "username", &self.username).to_string();
        if self.password.is_empty() {
            errors.add("password", super::REQUIRED);
        }
        errors.into_result((username, self.password.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default, skip_serializing)]
    pub old_password: String,
    #[serde(default, skip_serializing)]
    pub new_password1: String,
    #[serde(default, skip_serializing)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    /// The new password; the old one is checked against the stored hash later
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        if self.old_password.is_empty() {
            errors.add("old_password", super::REQUIRED);
        }
        check_new_password(
            &mut errors,
            ("new_password1", self.new_password1.as_str()),
            ("new_password2", self.new_password2.as_str()),
        );
        errors.into_result(self.new_password1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, p1: &str, p2: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password1: p1.to_string(),
            password2: p2.to_string(),
        }
    }

    #[test]
    fn test_registration_ok() {
        let (username, password) = registration("carol", "s3cure-pass", "s3cure-pass")
            .validate()
            .unwrap();
        assert_eq!(username, "carol");
        assert_eq!(password, "s3cure-pass");
    }

    #[test]
    fn test_registration_password_rules() {
        let errors = registration("carol", "abc", "abc").validate().unwrap_err();
        assert!(errors.has("password2"));

        let errors = registration("carol", "12345678901", "12345678901")
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("password2"), ["This password is entirely numeric."]);

        let errors = registration("carol", "s3cure-pass", "other-pass")
            .validate()
            .unwrap_err();
        assert_eq!(errors.get("password2"), ["The two password fields didn't match."]);

        let errors = registration("", "", "").validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("password1"));
    }

    #[test]
    fn test_passwords_are_not_echoed() {
        let json = serde_json::to_value(registration("carol", "secret-1", "secret-1")).unwrap();
        assert_eq!(json["username"], "carol");
        assert!(json.get("password1").is_none());
    }

    #[test]
    fn test_login_requires_both_fields() {
        let form = LoginForm {
            username: "dave".to_string(),
            ..LoginForm::default()
        };
        assert!(form.validate().unwrap_err().has("password"));
    }

    #[test]
    fn test_password_change() {
        let form = PasswordChangeForm {
            old_password: "old-one-1".to_string(),
            new_password1: "brand-new-1".to_string(),
            new_password2: "brand-new-1".to_string(),
        };
        assert_eq!(form.validate().unwrap(), "brand-new-1");

        let form = PasswordChangeForm {
            new_password2: "different-1".to_string(),
            ..form
        };
        assert!(form.validate().unwrap_err().has("new_password2"));
    }
}
