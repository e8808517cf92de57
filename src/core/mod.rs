pub mod app;
pub mod chat;
pub mod config;
pub mod message;
pub mod notice;
pub mod profile;
pub mod session;
