//! Persistence operations for the chat entities.
//!
//! This crate is the only layer that talks to seaORM query builders directly.
//! Layers above (`domain`, `web`) consume the functions exposed here and
//! translate the `error::Error` kinds into their own taxonomies.

use log::*;
use sea_orm::DatabaseConnection;

pub mod error;
pub mod message;
pub mod user;

pub use entity::{messages, users, Id};

/// Seed a couple of demo users so the chat can be exercised locally.
/// Idempotent: skips any username that already exists.
pub async fn seed_database(db: &DatabaseConnection) {
    let demo_users = [
        ("alice", "password", Some("https://avatars.githubusercontent.com/u/1".to_string())),
        ("bob", "password", None),
    ];

    for (username, password, avatar_url) in demo_users {
        match user::find_by_username(db, username).await {
            Ok(Some(_)) => info!("User '{username}' already exists, skipping"),
            Ok(None) => {
                let now = chrono::Utc::now();
                let model = users::Model {
                    id: 0,
                    username: username.to_string(),
                    password: password.to_string(),
                    github_avatar_url: avatar_url,
                    created_at: now.into(),
                    updated_at: now.into(),
                };
                match user::create(db, model).await {
                    Ok(user) => info!("Seeded user '{}' with id {}", user.username, user.id),
                    Err(e) => error!("Failed to seed user '{username}': {e}"),
                }
            }
            Err(e) => error!("Failed to look up user '{username}': {e}"),
        }
    }
}
