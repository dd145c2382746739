use std::io::{self, Write};

use autopilot_protocol::{CheckResult, Evaluation, OutputMap};

use crate::CheckError;

/// Writes protocol lines (and plain text such as help or error reports) to the step's stdout.
pub(crate) struct Emitter<'w> {
    out: &'w mut dyn Write,
    status_lines: usize,
}

impl<'w> Emitter<'w> {
    pub(crate) fn new(out: &'w mut dyn Write) -> Self {
        Self {
            out,
            status_lines: 0,
        }
    }

    pub(crate) fn result(&mut self, result: &CheckResult) -> Result<(), CheckError> {
        self.line(&result.to_json_line()?)
    }

    pub(crate) fn output(&mut self, outputs: &OutputMap) -> Result<(), CheckError> {
        if outputs.is_empty() {
            return Ok(());
        }
        self.line(&outputs.to_output_line()?)
    }

    pub(crate) fn status(&mut self, evaluation: &Evaluation) -> Result<(), CheckError> {
        self.status_lines += 1;
        self.line(&evaluation.to_json_line()?)
    }

    pub(crate) fn text(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }

    pub(crate) fn status_lines(&self) -> usize {
        self.status_lines
    }

    fn line(&mut self, line: &str) -> Result<(), CheckError> {
        Ok(self.text(line)?)
    }
}
