//! threadchat is a terminal chat client that keeps a list of conversation
//! threads on disk and streams replies from the Gemini API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the thread model, persistence, the model client, and the
//!   controller that folds streamed replies into the active thread.
//! - [`ui`] formats message text and writes it to the terminal.
//! - [`commands`] implements the slash commands available at the prompt.
//! - [`api`] defines the Gemini request/response payloads.
//! - [`auth`] finds the API key in the environment or the system keyring.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
