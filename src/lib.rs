pub mod config;      // Environment-driven settings and validation
pub mod error;
pub mod estimator;   // Floor price from resolved sale values
pub mod monitoring;  // Retry policy and run report
pub mod notify;
pub mod pipeline;
pub mod scanner;     // Chunked eth_getLogs over a block window
pub mod source;
pub mod types;
pub mod utils;
