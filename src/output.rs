use std::io::{self, Write};

/// Line writer for command output that treats a closed pipe as success
///
/// `filterspec ... | head` must not fail when `head` exits early, so on
/// `BrokenPipe` the process exits with status 0.
pub struct SafeOutput<W: Write> {
    writer: W,
}

impl<W: Write> SafeOutput<W> {
    pub fn new(writer: W) -> Self {
        SafeOutput { writer }
    }

    /// Write `content` and a newline, flushing immediately
    pub fn writeln(&mut self, content: &str) -> io::Result<()> {
        let written = writeln!(self.writer, "{}", content).and_then(|_| self.writer.flush());
        match written {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
            other => other,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn safe_stdout() -> SafeOutput<io::Stdout> {
    SafeOutput::new(io::stdout())
}
