//! Error types for the response cache.

/// Errors raised while configuring the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A rule's path pattern is not a valid regular expression.
    #[error("invalid cache rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
