pub mod admin;
pub mod app;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod extract;
pub mod preview;
pub mod ratings;
pub mod resources;
pub mod state;
pub mod storage;
