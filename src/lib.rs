pub mod aggregate;
pub mod bucket;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod history;
pub mod model;
pub mod normalize;
pub mod timezone;
