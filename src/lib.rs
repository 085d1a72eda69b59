pub mod aggregate;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod parameter;
pub mod report;
pub mod table;
