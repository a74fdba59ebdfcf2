//! Reference Oracle
//!
//! Produces trusted reference answers for scoring rounds by calling the
//! backend a [`ReferenceRequest`](arbiter_core::ReferenceRequest) names:
//! OpenAI, Anthropic, Gemini, Groq, Bedrock Converse, or Anthropic models
//! hosted on Bedrock.
//!
//! ```no_run
//! use reference_oracle::{HttpOracle, OracleConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = HttpOracle::new(OracleConfig::from_env()?)?;
//! # let _ = oracle;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod oracle;
pub mod providers;

pub use config::{ConfigError, Endpoint, OracleConfig};
pub use oracle::HttpOracle;
pub use providers::ProviderCall;
