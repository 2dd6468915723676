//! Library crate for webprinter-link: finds the local WebPrinter helper,
//! wakes it over its URL scheme and hands it print jobs.
pub mod app;
pub mod client;
pub mod config;
pub mod detector;
pub mod installer;
pub mod launcher;
pub mod ports;
pub mod server;
pub mod session;
pub mod types;
