//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They
//! validate forms, enforce existence and uniqueness rules, and translate
//! storage failures into their own error enums.

pub mod category;
pub mod comment;
pub mod password;
pub mod post;
pub mod user;

pub use category::{validate_slug, CategoryService, CategoryServiceError, LocationService};
pub use comment::{CommentService, CommentServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostDetail, PostService, PostServiceError};
pub use user::{UserService, UserServiceError, DEFAULT_SESSION_LIFETIME_DAYS};
