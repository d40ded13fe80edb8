pub mod api;
pub mod config;
pub mod docstore;
pub mod export;
pub mod humanize;
pub mod identity;
pub mod notify;
pub mod observability;
pub mod pagination;
pub mod preferences;
pub mod requests;
pub mod scraper;
pub mod storage;
pub mod table;
pub mod tasks;
