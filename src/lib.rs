pub mod config;
pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod models;
pub mod options;
pub mod pipeline;
pub mod rate_limiter;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod sources;
pub mod synchronizer;

mod test;

pub use config::Config;
pub use error::Error;
pub use options::RunOptions;
pub use pipeline::{Pipeline, RunOutcome, RunReport};
pub use result::Result;
