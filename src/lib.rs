pub mod config;
pub mod handle;
pub mod humanize;
pub mod loader;
pub mod manifest;
pub mod mock; // Scripted transport for tests and offline runs
pub mod object_url;
pub mod observability;
pub mod processors;
pub mod transfer;
