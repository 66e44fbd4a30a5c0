//! Blogicum - a small multi-author blog
//!
//! Users sign up, publish posts grouped by category and optionally tagged
//! with a location, and comment on each other's posts. Pages are rendered
//! on the server with Tera; state lives in SQLite or MySQL.

pub mod api;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod permissions;
pub mod services;
pub mod theme;
