use bytes::{Buf, BufMut, Bytes, BytesMut};
use bridge_logging::{bridge_debug, bridge_warn};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Size of the little-endian length prefix that precedes every body.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest body the decoder accepts; longer frames are skipped.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("body of {len} bytes cannot be described by a 32-bit length prefix")]
    TooLarge { len: usize },
}

/// Codec for `[u32 little-endian length][body]` frames.
///
/// Decoding is resumable: a prefix or body may arrive split across any number
/// of reads, and one read may carry several frames. Frames whose declared
/// length exceeds the configured maximum are consumed and dropped so the
/// stream stays aligned on the next prefix.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    pending_len: Option<usize>,
    discard_remaining: usize,
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            pending_len: None,
            discard_remaining: 0,
            max_frame_len,
        }
    }

    /// True while a partial frame (prefix known, body incomplete) is buffered.
    pub fn is_mid_frame(&self) -> bool {
        self.pending_len.is_some() || self.discard_remaining > 0
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        loop {
            if self.discard_remaining > 0 {
                let skip = self.discard_remaining.min(src.len());
                src.advance(skip);
                self.discard_remaining -= skip;
                if self.discard_remaining > 0 {
                    return Ok(None);
                }
                bridge_debug!("Frame stream resynchronised after oversized frame");
            }

            let len = match self.pending_len {
                Some(len) => len,
                None => {
                    if src.len() < LENGTH_PREFIX_LEN {
                        return Ok(None);
                    }
                    let len = src.get_u32_le() as usize;
                    if len > self.max_frame_len {
                        bridge_warn!(
                            "Dropping frame of {} bytes (limit {})",
                            len,
                            self.max_frame_len
                        );
                        self.discard_remaining = len;
                        continue;
                    }
                    self.pending_len = Some(len);
                    len
                }
            };

            if src.len() < len {
                src.reserve(len - src.len());
                return Ok(None);
            }

            self.pending_len = None;
            return Ok(Some(src.split_to(len).freeze()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // A dangling partial frame at end of input is a closed connection,
        // not an error.
        if !src.is_empty() || self.is_mid_frame() {
            bridge_debug!(
                "Input closed with {} buffered bytes of an incomplete frame",
                src.len()
            );
            src.clear();
            self.pending_len = None;
            self.discard_remaining = 0;
        }
        Ok(None)
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, body: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        let body = body.as_ref();
        let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge { len: body.len() })?;
        dst.reserve(LENGTH_PREFIX_LEN + body.len());
        dst.put_u32_le(len);
        dst.extend_from_slice(body);
        Ok(())
    }
}

/// Encode a single body into a complete frame.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut dst = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body.len());
    FrameCodec::new().encode(body, &mut dst)?;
    Ok(dst.to_vec())
}
