use std::io::{self, BufRead, BufReader, Read};

/// One newline-terminated unit read from a child's stdout.
#[derive(Debug)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    /// The line exceeded the limit; its bytes were discarded up to the next newline.
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    IoError {
        line_number: usize,
        kind: io::ErrorKind,
    },
}

/// Splits a byte stream into lines without ever buffering more than `max_line_bytes` of one line.
pub struct SyncBoundedLineReader<R: Read> {
    reader: BufReader<R>,
    max_line_bytes: usize,
    line_number: usize,
    done: bool,
}

impl<R: Read> SyncBoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_line_bytes,
            line_number: 0,
            done: false,
        }
    }

    fn next_line_number(&mut self) -> usize {
        self.line_number += 1;
        self.line_number
    }
}

impl<R: Read> Iterator for SyncBoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut current = Vec::new();
        let mut observed = 0usize;
        let mut overflowed = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    let line_number = self.next_line_number();
                    return Some(BoundedLine::IoError {
                        line_number,
                        kind: err.kind(),
                    });
                }
            };

            if available.is_empty() {
                self.done = true;
                if observed == 0 {
                    return None;
                }
                break;
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let take = newline.unwrap_or(available.len());
            observed = observed.saturating_add(take);
            if observed > self.max_line_bytes {
                overflowed = true;
                current.clear();
            } else {
                current.extend_from_slice(&available[..take]);
            }

            match newline {
                Some(idx) => {
                    self.reader.consume(idx + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }

        let line_number = self.next_line_number();
        if overflowed {
            return Some(BoundedLine::LineTooLong {
                line_number,
                observed_bytes: observed,
                max_line_bytes: self.max_line_bytes,
            });
        }
        Some(BoundedLine::Line {
            line_number,
            bytes: current,
        })
    }
}
