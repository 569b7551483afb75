//! Chat backend: direct and group messaging, friend and group requests,
//! attachments, and live presence/message events over a socket channel.

pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod friendship;
pub mod hub;
pub mod messaging;
pub mod presence;
pub mod storage;
