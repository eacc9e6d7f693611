pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lastfm;
pub mod models;
pub mod provider;
pub mod service;
pub mod state;
pub mod string_normalization;
pub mod youtube;

#[cfg(test)]
mod test_support;
