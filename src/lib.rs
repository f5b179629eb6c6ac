pub mod api;
pub mod config;
pub mod cost;
pub mod crypto;
pub mod db;
pub mod error;
pub mod providers;
