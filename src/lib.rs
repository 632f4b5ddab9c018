//! # Roster - character and inventory manager for a browser-based text game
//!
//! Players log in through the browser, keep a small roster of characters,
//! edit their gear and bonus slots, pick which one they are playing and look
//! through its inventory. Everything is kept in an embedded sled database.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roster::config::Config;
//! use roster::web::WebServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let server = WebServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Domain records, the sled-backed store, combat state and world seeding
//! - [`accounts`] - Users, Argon2id password hashing and browser sessions
//! - [`web`] - Views, forms, HTML rendering and the axum router
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Name, password and free-text checks
//! - [`logutil`] - Escaping user input for single-line logs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   axum router   │ ← sessions, cookies, status codes
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │      Views      │ ← guards, forms, business rules
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │    GameStore    │ ← sled trees, bincode records
//! └─────────────────┘
//! ```

pub mod accounts;
pub mod config;
pub mod game;
pub mod logutil;
pub mod validation;
pub mod web;
