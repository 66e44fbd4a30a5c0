//! User service
//!
//! Implements business logic for accounts:
//! - sign up, log in, log out
//! - session lookup with lazy expiry
//! - profile editing and password change
//! - superuser bootstrap from configuration

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::forms::{FormErrors, PasswordChangeForm, RegistrationForm, UserForm, NON_FIELD_ERRORS};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 14;

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials or inactive account)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Form input rejected
    #[error("Validation error: {0}")]
    ValidationError(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_lifetime(user_repo, session_repo, DEFAULT_SESSION_LIFETIME_DAYS)
    }

    pub fn with_session_lifetime(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_lifetime_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime_days,
        }
    }

    /// Register a new, unprivileged account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for bad form input or a taken username
    /// - `InternalError` for database errors
    pub async fn register(&self, form: &RegistrationForm) -> Result<User, UserServiceError> {
        let (username, password) = form.validate().map_err(UserServiceError::ValidationError)?;

        if self.username_taken(&username, None).await? {
            return Err(UserServiceError::ValidationError(FormErrors::single(
                "username",
                USERNAME_TAKEN,
            )));
        }

        let password_hash = hash_password(&password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(username, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials and open a new session
    ///
    /// # Errors
    ///
    /// - `AuthenticationError` if the credentials are wrong or the account is inactive
    /// - `InternalError` for database errors
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, Session), UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or_else(|| UserServiceError::AuthenticationError(BAD_CREDENTIALS.to_string()))?;

        let password_valid =
            verify_password(password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(username, "login rejected: bad password");
            return Err(UserServiceError::AuthenticationError(
                BAD_CREDENTIALS.to_string(),
            ));
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account is inactive.".to_string(),
            ));
        }

        let session = self
            .session_repo
            .create(&Session::start(user.id, self.session_lifetime_days))
            .await
            .context("Failed to create session")?;

        let now = Utc::now();
        self.user_repo
            .touch_last_login(user.id, now)
            .await
            .context("Failed to record login time")?;

        tracing::info!(user_id = user.id, "user logged in");
        Ok((
            User {
                last_login: Some(now),
                ..user
            },
            session,
        ))
    }

    /// Invalidate a session
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown tokens, expired sessions and inactive users all read as
    /// anonymous; an expired session row is removed on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to remove expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        Ok(user)
    }

    /// Apply the profile form to `user`. Role flags, password and join
    /// date are carried over untouched.
    pub async fn update_profile(
        &self,
        user: &User,
        form: &UserForm,
    ) -> Result<User, UserServiceError> {
        let input = form.validate().map_err(UserServiceError::ValidationError)?;

        if input.username != user.username
            && self.username_taken(&input.username, Some(user.id)).await?
        {
            return Err(UserServiceError::ValidationError(FormErrors::single(
                "username",
                USERNAME_TAKEN,
            )));
        }

        let updated = User {
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            ..user.clone()
        };
        let saved = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?;
        Ok(saved)
    }

    /// Change the password after checking the old one. Every other session
    /// of the user is closed; `current_session` stays valid.
    pub async fn change_password(
        &self,
        user: &User,
        current_session: &str,
        form: &PasswordChangeForm,
    ) -> Result<(), UserServiceError> {
        let mut errors = match form.validate() {
            Ok(_) => FormErrors::new(),
            Err(errors) => errors,
        };

        if !form.old_password.is_empty()
            && !verify_password(&form.old_password, &user.password_hash)
                .context("Failed to verify password")?
        {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        if !errors.is_empty() {
            return Err(UserServiceError::ValidationError(errors));
        }

        let password_hash = hash_password(&form.new_password1).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &password_hash)
            .await
            .context("Failed to update password")?;
        let closed = self
            .session_repo
            .delete_others(user.id, current_session)
            .await
            .context("Failed to close other sessions")?;

        tracing::info!(user_id = user.id, closed_sessions = closed, "password changed");
        Ok(())
    }

    /// Make sure a superuser with this username exists. An existing account
    /// is promoted and keeps its password.
    pub async fn ensure_superuser(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        if let Some(existing) = self.get_by_username(username).await? {
            if existing.is_superuser && existing.is_staff {
                return Ok(existing);
            }
            let promoted = User {
                is_superuser: true,
                is_staff: true,
                ..existing
            };
            let saved = self
                .user_repo
                .update(&promoted)
                .await
                .context("Failed to promote user")?;
            tracing::info!(username, "promoted existing user to superuser");
            return Ok(saved);
        }

        if !crate::forms::is_valid_username(username) {
            return Err(UserServiceError::ValidationError(FormErrors::single(
                NON_FIELD_ERRORS,
                format!("'{}' is not a valid username", username),
            )));
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = User {
            email: email.to_string(),
            is_superuser: true,
            is_staff: true,
            ..User::new(username, password_hash)
        };
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create superuser")?;
        tracing::info!(username, "created superuser");
        Ok(created)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn username_taken(
        &self,
        username: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        Ok(existing.is_some_and(|u| Some(u.id) != exclude_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn registration(username: &str, password: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = setup_service().await;
        let user = service
            .register(&registration("alice", "wonderland-1"))
            .await
            .expect("registration should succeed");
        assert!(!user.is_superuser);
        assert_ne!(user.password_hash, "wonderland-1");

        let (logged_in, session) = service.login("alice", "wonderland-1").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login.is_some());

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let service = setup_service().await;
        service.register(&registration("alice", "wonderland-1")).await.unwrap();

        match service.register(&registration("alice", "another-pass")).await {
            Err(UserServiceError::ValidationError(errors)) => {
                assert_eq!(errors.get("username"), [USERNAME_TAKEN]);
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = setup_service().await;
        service.register(&registration("alice", "wonderland-1")).await.unwrap();

        assert!(matches!(
            service.login("alice", "wrong-password").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login("nobody", "wonderland-1").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup_service().await;
        service.register(&registration("alice", "wonderland-1")).await.unwrap();
        let (_, session) = service.login("alice", "wonderland-1").await.unwrap();

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.validate_session("garbage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_flags_and_checks_uniqueness() {
        let service = setup_service().await;
        let alice = service.register(&registration("alice", "wonderland-1")).await.unwrap();
        service.register(&registration("bob", "builder-123")).await.unwrap();

        let form = UserForm {
            username: "bob".to_string(),
            ..UserForm::from_user(&alice)
        };
        assert!(matches!(
            service.update_profile(&alice, &form).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let form = UserForm {
            username: "alice2".to_string(),
            first_name: "Alice".to_string(),
            ..UserForm::from_user(&alice)
        };
        let updated = service.update_profile(&alice, &form).await.unwrap();
        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.first_name, "Alice");
        assert!(!updated.is_superuser);

        let same_name = UserForm::from_user(&updated);
        assert!(service.update_profile(&updated, &same_name).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_closes_other_sessions() {
        let service = setup_service().await;
        service.register(&registration("alice", "wonderland-1")).await.unwrap();
        let (user, current) = service.login("alice", "wonderland-1").await.unwrap();
        let (_, other) = service.login("alice", "wonderland-1").await.unwrap();

        let bad = PasswordChangeForm {
            old_password: "not-it".to_string(),
            new_password1: "looking-glass-2".to_string(),
            new_password2: "looking-glass-2".to_string(),
        };
        match service.change_password(&user, &current.id, &bad).await {
            Err(UserServiceError::ValidationError(errors)) => assert!(errors.has("old_password")),
            _ => panic!("expected old password to be rejected"),
        }

        let good = PasswordChangeForm {
            old_password: "wonderland-1".to_string(),
            ..bad
        };
        service.change_password(&user, &current.id, &good).await.unwrap();

        assert!(service.validate_session(&current.id).await.unwrap().is_some());
        assert!(service.validate_session(&other.id).await.unwrap().is_none());
        assert!(service.login("alice", "wonderland-1").await.is_err());
        assert!(service.login("alice", "looking-glass-2").await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_superuser_creates_then_promotes() {
        let service = setup_service().await;
        let admin = service
            .ensure_superuser("admin", "admin@example.com", "change-me-now")
            .await
            .unwrap();
        assert!(admin.is_superuser && admin.is_staff);
        assert_eq!(admin.email, "admin@example.com");

        let again = service
            .ensure_superuser("admin", "admin@example.com", "other")
            .await
            .unwrap();
        assert_eq!(again.id, admin.id);

        service.register(&registration("carol", "carol-pass-1")).await.unwrap();
        let promoted = service.ensure_superuser("carol", "", "ignored").await.unwrap();
        assert!(promoted.is_superuser);
        assert!(service.login("carol", "carol-pass-1").await.is_ok());
    }
}
