#![forbid(unsafe_code)]
//! Line-delimited JSON protocol shared by autopilot steps and the drivers that run them.
//!
//! Every line an autopilot writes to stdout is either ordinary log output or a JSON object
//! carrying exactly one of the protocol keys:
//!
//! - `{"result": {"criterion": ..., "fulfilled": ..., "justification": ..., "metadata"?: {...}}}`
//! - `{"output": {"<key>": "<value>", ...}}`
//! - `{"status": "GREEN"|"YELLOW"|..., "reason": "..."}` (final verdict, last structural line)
//!
//! This crate owns the data model ([`CheckResult`], [`OutputMap`], [`Status`], [`Evaluation`]),
//! the per-line classifier ([`ProtocolLine`]) and a bounded, line-oriented accumulator
//! ([`StreamAccumulator`], [`parse_stream`]) that applies the parent-side merge rules.
//! It does not spawn processes and has no CLI code.

mod config;
mod error;
mod ingest;
mod line_parser;
mod reader;
mod record;
mod status;

pub use config::IngestLimits;
pub use error::ProtocolError;
pub use ingest::{parse_stream, parse_stream_str, ParsedStream, StreamAccumulator};
pub use line_parser::{strip_ansi, ProtocolLine};
pub use reader::{BoundedLine, SyncBoundedLineReader};
pub use record::{CheckResult, Evaluation, OutputMap};
pub use status::Status;
