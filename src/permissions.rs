//! Ownership checks
//!
//! A failed check is never an error by itself: handlers turn `false` into a
//! redirect to a page the actor is allowed to see.

use crate::models::{Comment, Post, PostSummary, User};

/// Anything with an owning author
pub trait Authored {
    fn author_id(&self) -> i64;
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for PostSummary {
    fn author_id(&self) -> i64 {
        self.post.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

/// Only the author may edit
pub fn can_modify<R: Authored + ?Sized>(actor: &User, resource: &R) -> bool {
    actor.id == resource.author_id()
}

/// The author, or a superuser, may delete a post
pub fn can_delete_post<R: Authored + ?Sized>(actor: &User, post: &R) -> bool {
    can_modify(actor, post) || actor.is_superuser
}
