use bytes::Bytes;

/// Pixel layout of a raw frame pushed in buffer input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Semi-planar YUV 4:2:0 (full Y plane followed by interleaved UV).
    Nv12,
    /// Planar YUV 4:2:0.
    I420,
}

/// One raw video frame awaiting encode (buffer input mode).
///
/// Ownership: the processor takes ownership the instant the frame is
/// enqueued; the queue is the sole owner until the worker drains it and hands
/// it to the hardware encoder for the duration of that submission.
///
/// `capture_us` is the caller's capture timestamp and is informational only:
/// presentation timestamps on the output side come from the session's
/// monotonic clock, never from capture time.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub capture_us: Option<i64>,
}

impl RawFrame {
    pub fn new(data: Bytes, format: PixelFormat, width: u32, height: u32) -> RawFrame {
        RawFrame {
            data,
            format,
            width,
            height,
            capture_us: None,
        }
    }

    /// Attach the caller's capture timestamp in microseconds.
    pub fn with_capture_us(mut self, capture_us: i64) -> RawFrame {
        self.capture_us = Some(capture_us);
        self
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One completed unit of compressed bitstream from the encoder.
#[derive(Debug, Clone)]
pub struct EncodedUnit {
    /// Compressed bytes.
    pub data: Bytes,
    /// Presentation timestamp in microseconds. Strictly increasing across
    /// units emitted by one session.
    pub pts_us: i64,
    /// Whether this unit is a self-contained keyframe.
    pub keyframe: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frame_capture_timestamp() {
        let frame = RawFrame::new(Bytes::from_static(b"yuv"), PixelFormat::Nv12, 4, 2);
        assert!(frame.capture_us.is_none());
        let frame = frame.with_capture_us(42);
        assert_eq!(frame.capture_us, Some(42));
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
    }
}
