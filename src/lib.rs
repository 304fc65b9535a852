// src/lib.rs

pub mod analytics;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
