//! services/cli/src/shell/console.rs
//!
//! Line-oriented terminal IO over any reader and writer, so the shell can be
//! driven by scripted input in tests.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Writes one line.
    pub fn say(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.output, "{}", line)
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.output)
    }

    /// Shows `label` and reads one trimmed line. `None` means the input is closed.
    /// A line that is not valid UTF-8 is discarded and the prompt repeats.
    pub fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        loop {
            write!(self.output, "{}", label)?;
            self.output.flush()?;

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) => {
                    writeln!(self.output)?;
                    return Ok(None);
                }
                Ok(_) => return Ok(Some(line.trim().to_string())),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    writeln!(self.output, "Input was not valid text, please try again.")?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_trims_input_and_reports_end_of_input() {
        let mut console = Console::new(Cursor::new("  hello \n"), Vec::new());

        assert_eq!(console.prompt("> ").unwrap().as_deref(), Some("hello"));
        assert_eq!(console.prompt("> ").unwrap(), None);

        let written = String::from_utf8(console.output().clone()).unwrap();
        assert_eq!(written, "> > \n");
    }

    #[test]
    fn undecodable_line_is_asked_again() {
        let mut console = Console::new(Cursor::new(&b"\xff\xfe\n1\n"[..]), Vec::new());

        assert_eq!(console.prompt("> ").unwrap().as_deref(), Some("1"));

        let written = String::from_utf8(console.output().clone()).unwrap();
        assert_eq!(written, "> Input was not valid text, please try again.\n> ");
    }
}
