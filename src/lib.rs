//! Creditchat is a terminal client for token-metered chat services.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire payloads and the [`api::ChatService`] seam,
//!   with the HTTP client behind it.
//! - [`auth`] holds the credential store and the register/login flows.
//! - [`core`] owns the protected flow: the session guard verifies the stored
//!   token, the profile loader fetches identity and balance, and the chat
//!   controller runs the quota-metered send loop.
//! - [`utils`] carries URL, header and logging helpers.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
