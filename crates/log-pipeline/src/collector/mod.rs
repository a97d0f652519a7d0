//! Line collection
//!
//! # Sources
//! - [`FileTailer`]: polling `tail -f` over a single access log
//!
//! # Architecture
//! The source runs in its own tokio task and pushes every complete line
//! into the bounded raw-line queue (`tokio::mpsc::Sender<RawLine>`). A full
//! queue blocks the read loop, so the file is read no faster than the
//! parsers drain it.

pub mod file;

pub use file::{FileTailer, TailOffset, TailerConfig};
