//! Concrete PostgreSQL repositories.

pub mod meeting;
