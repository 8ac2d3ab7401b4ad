//! Bulkheads for Tower services.
//!
//! A bulkhead caps how many calls to one named resource run at once. Calls
//! over the cap wait in a bounded FIFO queue, each with its own queue
//! timeout; when the queue is full they are rejected immediately. A slot
//! freed by a finished call goes to the oldest waiting call.
//!
//! # Basic Example
//!
//! ```rust
//! use bento_bulkhead::{BulkheadConfig, BulkheadError};
//! use std::time::Duration;
//! use tower::ServiceBuilder;
//!
//! # async fn example() {
//! let layer = BulkheadConfig::builder()
//!     .name("upload-bh")
//!     .max_concurrent_calls(10)
//!     .max_queue(100)
//!     .queue_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer.clone())
//!     .service_fn(|req: String| async move { Ok::<_, BulkheadError>(req) });
//!
//! println!("{:?}", layer.stats());
//! # }
//! ```
//!
//! # Running work directly
//!
//! ```rust
//! use bento_bulkhead::{BulkheadConfig, BulkheadError};
//!
//! # async fn example() -> Result<(), BulkheadError> {
//! let bulkhead = BulkheadConfig::builder().name("media-bh").build();
//! let thumbnail = bulkhead
//!     .execute(|| async { Ok::<_, BulkheadError>(vec![0u8; 16]) })
//!     .await?;
//! assert_eq!(thumbnail.len(), 16);
//! # Ok(())
//! # }
//! ```
//!
//! # Shutdown
//!
//! [`BulkheadLayer::shutdown`] rejects every queued call with
//! [`BulkheadError::Shutdown`]. Calls already running keep their slots.

pub mod config;
pub mod error;
pub mod events;
pub mod layer;
mod queue;
pub mod service;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::{BulkheadError, Result};
pub use events::BulkheadEvent;
pub use layer::BulkheadLayer;
pub use queue::BulkheadStats;
pub use service::Bulkhead;
