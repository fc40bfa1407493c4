//! # chatstore
//!
//! Persistence and query layer for an AI chat application.
//!
//! Chats, messages, votes, artifact documents, edit suggestions, resumable
//! stream ids and RAG knowledge documents are stored as JSON records in a
//! single SQLite file and reached through the query layer in
//! [`chatstore_core`]. This crate supplies the SQLite backend, the
//! configuration file, the model provider table, a JSON HTTP API and the
//! `chatctl` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐
//! │   CLI    │   │   HTTP   │
//! │(chatctl) │   │  (axum)  │
//! └────┬─────┘   └────┬─────┘
//!      └──────┬───────┘
//!             ▼
//!      ┌─────────────┐   ┌───────────────┐   ┌──────────┐
//!      │ Query layer │──▶│ DocumentStore │──▶│  SQLite  │
//!      └─────────────┘   └───────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chatctl init                        # create database
//! chatctl serve                       # start HTTP API
//! chatctl history <user-id>           # list a user's chats
//! chatctl providers                   # show the model table
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection and registry |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `DocumentStore` backend |
//! | [`providers`] | Logical model name to backend mapping |
//! | [`server`] | JSON HTTP API |
//! | [`history`] | `chatctl history` and `chatctl usage` |
//! | [`chat_cmd`] | `chatctl chat` and `chatctl messages` |
//! | [`knowledge_cmd`] | `chatctl knowledge` |
//! | [`user_cmd`] | `chatctl user` |

pub mod chat_cmd;
pub mod config;
pub mod db;
pub mod history;
pub mod knowledge_cmd;
pub mod migrate;
pub mod providers;
pub mod server;
pub mod sqlite_store;
pub mod user_cmd;
