pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
