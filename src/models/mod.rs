//! Data models
//!
//! Database entities (User, Session, Category, Location, Post, Comment),
//! validated inputs produced by the forms layer, and the read models the
//! query layer returns to templates.

mod category;
mod comment;
mod pagination;
mod post;
mod session;
mod user;

pub use category::{Category, CreateCategoryInput, CreateLocationInput, Location};
pub use comment::{Comment, CommentWithAuthor};
pub use pagination::{page_count, ListParams, PageNumber, PagedResult, Pagination, POSTS_PER_PAGE};
pub use post::{Post, PostFilter, PostInput, PostSummary};
pub use session::Session;
pub use user::{ProfileInput, User};
