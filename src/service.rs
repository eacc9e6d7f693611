use crate::aggregator::{Aggregator, Operation};
use crate::error::ApiError;
use crate::models::Track;
use std::sync::Arc;

/// Entry point for the web layer: validates input, then delegates to the [`Aggregator`].
#[derive(Clone)]
pub struct QueryService {
    aggregator: Arc<Aggregator>,
    default_limit: u32,
    max_limit: u32,
}

impl QueryService {
    pub fn new(aggregator: Arc<Aggregator>, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            aggregator,
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub async fn search(&self, term: &str, limit: Option<i64>) -> Result<Vec<Track>, ApiError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ApiError::InvalidRequest(
                "search query must not be empty".to_string(),
            ));
        }
        let limit = self.resolve_limit(limit)?;

        self.aggregator
            .execute(&Operation::Search {
                term: term.to_string(),
                limit,
            })
            .await
    }

    pub async fn recommend(&self, limit: Option<i64>) -> Result<Vec<Track>, ApiError> {
        let limit = self.resolve_limit(limit)?;
        self.aggregator.execute(&Operation::Recommend { limit }).await
    }

    fn resolve_limit(&self, limit: Option<i64>) -> Result<u32, ApiError> {
        match limit {
            None => Ok(self.default_limit),
            Some(n) if n <= 0 => Err(ApiError::InvalidRequest(format!(
                "limit must be a positive integer, got {}",
                n
            ))),
            Some(n) => Ok(u32::try_from(n).unwrap_or(u32::MAX).min(self.max_limit)),
        }
    }
}
