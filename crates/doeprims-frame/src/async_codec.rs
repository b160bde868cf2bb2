use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_object, DoeObject};
use crate::error::{FrameError, Result};
use crate::header::MAX_OBJECT_SIZE;

/// `tokio_util` codec for DOE data objects over async byte streams.
#[derive(Debug, Clone)]
pub struct DoeCodec {
    max_object_size: usize,
}

impl DoeCodec {
    pub fn new() -> Self {
        Self::with_max_object_size(MAX_OBJECT_SIZE)
    }

    pub fn with_max_object_size(max_object_size: usize) -> Self {
        Self { max_object_size }
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }
}

impl Default for DoeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DoeCodec {
    type Item = DoeObject;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DoeObject>> {
        decode_object(src, self.max_object_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<DoeObject>> {
        match self.decode(src)? {
            Some(object) => Ok(Some(object)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<DoeObject> for DoeCodec {
    type Error = FrameError;

    fn encode(&mut self, object: DoeObject, dst: &mut BytesMut) -> Result<()> {
        let size = object.wire_size();
        if size > self.max_object_size {
            return Err(FrameError::ObjectTooLarge {
                size,
                max: self.max_object_size,
            });
        }
        object.encode(dst);
        Ok(())
    }
}
