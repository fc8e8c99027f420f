//! Line codec for UCI engine streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! misbehaving engine that never terminates a line cannot make the harness
//! allocate without bound. `\r\n` endings from Windows builds are accepted.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{HarnessError, Result};

/// Default maximum accepted line length in bytes.
///
/// UCI output lines are short; even verbose `info` lines with a long PV fit
/// comfortably.
pub const DEFAULT_MAX_LINE_BYTES: usize = 65_536;

/// Newline-delimited text codec for engine stdin/stdout.
///
/// # Decoder
///
/// Inbound lines longer than the configured limit return
/// [`HarnessError::Protocol`]`("line too long: …")`. I/O errors map to
/// [`HarnessError::Io`].
///
/// # Encoder
///
/// Outbound commands are encoded as `item\n`.
#[derive(Debug)]
pub struct UciCodec {
    inner: LinesCodec,
    max_length: usize,
}

impl UciCodec {
    /// Create a codec with [`DEFAULT_MAX_LINE_BYTES`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_BYTES)
    }

    /// Create a codec rejecting lines longer than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    /// Configured maximum line length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for UciCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for UciCodec {
    type Item = String;
    type Error = HarnessError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let max = self.max_length;
        self.inner.decode(src).map_err(|e| map_codec_error(e, max))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let max = self.max_length;
        self.inner.decode_eof(src).map_err(|e| map_codec_error(e, max))
    }
}

impl Encoder<String> for UciCodec {
    type Error = HarnessError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        let max = self.max_length;
        self.inner.encode(item, dst).map_err(|e| map_codec_error(e, max))
    }
}

fn map_codec_error(e: LinesCodecError, max: usize) -> HarnessError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            HarnessError::Protocol(format!("line too long: exceeded {max} bytes"))
        }
        LinesCodecError::Io(io_err) => HarnessError::Io(io_err.to_string()),
    }
}
