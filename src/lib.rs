pub mod api;
pub mod config;
pub mod db;
pub mod health;
pub mod ingest;
pub mod stats;
