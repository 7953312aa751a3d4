//! Character I/O for the `out` and `in` instructions

use std::io::{self, Read, Write};

/// Where `out` writes characters and `in` reads them from
pub trait Console {
    /// Emit one character
    ///
    /// # Errors
    ///
    /// Fails if the underlying output fails.
    fn put(&mut self, c: char) -> io::Result<()>;

    /// Read one character, `None` once the input is exhausted
    ///
    /// # Errors
    ///
    /// Fails if the underlying input fails.
    fn get(&mut self) -> io::Result<Option<char>>;
}

/// A [`Console`] backed by any reader and writer.
///
/// Input is read byte by byte. Output is flushed before blocking on input, so
/// prompts show up before the program waits for an answer.
pub struct StreamConsole<R, W> {
    input: R,
    output: W,
}

impl<R: Read, W: Write> StreamConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Flush the output
    ///
    /// # Errors
    ///
    /// Fails if the underlying output fails.
    pub fn finish(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: Read, W: Write> Console for StreamConsole<R, W> {
    fn put(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0; 4];
        self.output.write_all(c.encode_utf8(&mut buf).as_bytes())
    }

    fn get(&mut self) -> io::Result<Option<char>> {
        self.output.flush()?;

        let mut buf = [0; 1];
        match self.input.read_exact(&mut buf) {
            Ok(()) => Ok(Some(char::from(buf[0]))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}
