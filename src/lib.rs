pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod lock;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod routes;
pub mod schedule;

pub use error::{PipelineError, Result};
