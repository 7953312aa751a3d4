//! Program image loading
//!
//! An image is a flat sequence of little-endian 16-bit words, loaded at
//! address 0. There is no header.

use camino::{Utf8Path, Utf8PathBuf};
use nom::{multi::many0, number::complete::le_u16, IResult};
use parse_display::{Display, FromStr};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{Word, MEMORY_SIZE};

/// What to do with an image longer than the memory
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, FromStr)]
#[display(style = "kebab-case")]
pub enum OversizePolicy {
    /// Refuse to load it
    #[default]
    Reject,
    /// Keep the words that fit and drop the rest
    Truncate,
}

#[derive(Debug, Error, miette::Diagnostic)]
pub enum ImageError {
    #[error("could not read program image {path}")]
    #[diagnostic(code(loader::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program image is {words} words long, memory only holds 32768")]
    #[diagnostic(
        code(loader::too_large),
        help("use the `truncate` policy to load the first 32768 words only")
    )]
    TooLarge { words: usize },
}

/// Read as many whole words as possible, returning them with the bytes left
fn words(input: &[u8]) -> (Vec<Word>, &[u8]) {
    let parsed: IResult<&[u8], Vec<Word>> = many0(le_u16)(input);
    // `many0` stops at the first incomplete word instead of failing
    parsed.map_or((Vec::new(), input), |(rest, words)| (words, rest))
}

/// Split an image into words
///
/// A trailing odd byte becomes a last word of its own.
///
/// # Errors
///
/// Fails if the image does not fit in memory and the policy is to reject it.
pub fn decode(bytes: &[u8], policy: OversizePolicy) -> Result<Vec<Word>, ImageError> {
    let (mut program, rest) = words(bytes);

    if let [last] = rest {
        warn!(byte = *last, "Image has an odd length, loading the last byte as a word");
        program.push(Word::from(*last));
    }

    if program.len() > MEMORY_SIZE {
        match policy {
            OversizePolicy::Reject => {
                return Err(ImageError::TooLarge {
                    words: program.len(),
                })
            }
            OversizePolicy::Truncate => {
                warn!(
                    words = program.len(),
                    kept = MEMORY_SIZE,
                    "Image does not fit in memory, truncating it"
                );
                program.truncate(MEMORY_SIZE);
            }
        }
    }

    debug!(words = program.len(), "Decoded program image");
    Ok(program)
}

/// Read and decode an image from a file
///
/// # Errors
///
/// Fails if the file can't be read or [`decode`] fails.
#[tracing::instrument]
pub fn read(path: &Utf8Path, policy: OversizePolicy) -> Result<Vec<Word>, ImageError> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_owned(),
        source,
    })?;
    decode(&bytes, policy)
}
