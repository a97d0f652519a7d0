//! Record parsing
//!
//! [`AccessLogParser`] turns one access-log line into a
//! [`ParsedEvent`](logship_core::types::ParsedEvent). Parsing is pure: the
//! parser holds only the compiled grammar, so parser workers share nothing
//! mutable.
//!
//! # Example
//! ```ignore
//! use logship_pipeline::parser::AccessLogParser;
//!
//! let parser = AccessLogParser::new()?;
//! let event = parser.parse_str(line)?;
//! ```

pub mod access;

pub use access::{ACCESS_LOG_PATTERN, AccessLogParser, ParseFailure, TIMESTAMP_FORMAT};
