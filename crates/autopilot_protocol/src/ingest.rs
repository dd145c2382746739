use std::io::Read;

use tracing::{debug, warn};

use crate::config::IngestLimits;
use crate::line_parser::ProtocolLine;
use crate::reader::{BoundedLine, SyncBoundedLineReader};
use crate::{CheckResult, Evaluation, OutputMap};

/// Parent-side view of everything a child step printed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStream {
    pub results: Vec<CheckResult>,
    pub outputs: OutputMap,
    /// First status line, if any.
    pub evaluation: Option<Evaluation>,
    /// Non-protocol lines, verbatim and newline-joined.
    pub stdout: String,
}

/// Applies the merge rules line by line:
/// results keep their order, outputs are merged later-wins, the first status line wins,
/// and result lines after a status line are dropped.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    parsed: ParsedStream,
    ignored_lines: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        match ProtocolLine::parse(line) {
            ProtocolLine::Result(result) => {
                if self.parsed.evaluation.is_some() {
                    warn!(criterion = %result.criterion, "ignoring result line after status line");
                    self.ignored_lines += 1;
                    self.push_log(line);
                } else {
                    self.parsed.results.push(result);
                }
            }
            ProtocolLine::Output(outputs) => self.parsed.outputs.merge(&outputs),
            ProtocolLine::Status(evaluation) => {
                if self.parsed.evaluation.is_some() {
                    debug!(status = %evaluation.status, "ignoring additional status line");
                    self.ignored_lines += 1;
                    self.push_log(line);
                } else {
                    self.parsed.evaluation = Some(evaluation);
                }
            }
            ProtocolLine::Log(raw) => self.push_log(&raw),
        }
    }

    pub fn push_log(&mut self, line: &str) {
        if !self.parsed.stdout.is_empty() {
            self.parsed.stdout.push('\n');
        }
        self.parsed.stdout.push_str(line.strip_suffix('\r').unwrap_or(line));
    }

    /// Protocol lines dropped by the first-status-wins rules so far.
    pub fn ignored_lines(&self) -> usize {
        self.ignored_lines
    }

    pub fn finish(self) -> ParsedStream {
        self.parsed
    }
}

/// Reads `reader` to the end and accumulates it.
///
/// Over-long lines and lines that are not valid UTF-8 are never interpreted as protocol lines;
/// they are kept in `stdout` (the former as a marker, the latter lossily decoded).
pub fn parse_stream<R: Read>(reader: R, limits: IngestLimits) -> ParsedStream {
    let mut acc = StreamAccumulator::new();
    for line in SyncBoundedLineReader::new(reader, limits.max_line_bytes) {
        match line {
            BoundedLine::Line { bytes, .. } => match String::from_utf8(bytes) {
                Ok(text) => acc.push_line(&text),
                Err(err) => acc.push_log(&String::from_utf8_lossy(err.as_bytes())),
            },
            BoundedLine::LineTooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            } => {
                warn!(line_number, observed_bytes, max_line_bytes, "line too long");
                acc.push_log(&format!(
                    "<line {line_number} truncated: {observed_bytes} bytes exceed {max_line_bytes}>"
                ));
            }
            BoundedLine::IoError { line_number, kind } => {
                warn!(line_number, ?kind, "stopped reading step output");
                break;
            }
        }
    }
    acc.finish()
}

pub fn parse_stream_str(text: &str) -> ParsedStream {
    let mut acc = StreamAccumulator::new();
    for line in text.lines() {
        acc.push_line(line);
    }
    acc.finish()
}
