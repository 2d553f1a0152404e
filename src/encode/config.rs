use crate::encode::encoder::{Codec, ColorFormat, EncoderFormat};
use crate::encode::policy;
use crate::error::Error;

/// How raw frames reach the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Zero-copy path: the caller renders into an encoder-provided drawing
    /// surface delivered through the surface-ready callback.
    Surface,
    /// The caller pushes owned pixel buffers through the frame queue.
    Buffer,
}

/// Caller-side configuration for one encode session.
///
/// Width and height are required and must be positive; everything else
/// defaults through [`policy`](crate::encode::policy) at start time. The
/// config is immutable once the session is running; rate changes made while
/// running are stashed and applied only at the next start.
///
/// # Example
///
/// ```rust,ignore
/// let config = EncodeSessionConfig::new(1920, 1080)
///     .set_input_mode(InputMode::Buffer)
///     .set_bitrate(4_000_000);
/// processor.start(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSessionConfig {
    pub width: u32,
    pub height: u32,
    pub bitrate: Option<u32>,
    pub frame_rate: Option<u32>,
    pub keyframe_interval_secs: Option<u32>,
    pub input_mode: InputMode,
}

impl EncodeSessionConfig {
    pub fn new(width: u32, height: u32) -> EncodeSessionConfig {
        EncodeSessionConfig {
            width,
            height,
            bitrate: None,
            frame_rate: None,
            keyframe_interval_secs: None,
            input_mode: InputMode::Surface,
        }
    }

    pub fn set_input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    /// Explicit target bitrate in bits/second, overriding the resolution
    /// policy default.
    pub fn set_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Explicit frame rate in fps, overriding the policy constant.
    pub fn set_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Explicit keyframe interval in seconds, overriding the resolution
    /// policy default.
    pub fn set_keyframe_interval_secs(mut self, secs: u32) -> Self {
        self.keyframe_interval_secs = Some(secs);
        self
    }

    /// Reject configurations the pipeline cannot start.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Resolve into the full format handed to the encoder backend.
    ///
    /// Precedence for bitrate and frame rate: pending `set_encode_rate`
    /// override, then the explicit config value, then the policy default.
    pub(crate) fn resolve(
        &self,
        codec: Codec,
        default_frame_rate: u32,
        pending_bitrate: Option<u32>,
        pending_frame_rate: Option<u32>,
    ) -> EncoderFormat {
        EncoderFormat {
            codec,
            width: self.width,
            height: self.height,
            bitrate: pending_bitrate
                .or(self.bitrate)
                .unwrap_or_else(|| policy::compute_bitrate(self.width, self.height)),
            frame_rate: pending_frame_rate
                .or(self.frame_rate)
                .unwrap_or(default_frame_rate),
            keyframe_interval_secs: self
                .keyframe_interval_secs
                .unwrap_or_else(|| policy::keyframe_interval(self.width, self.height)),
            rate_control: policy::rate_control(self.width, self.height),
            color: match self.input_mode {
                InputMode::Surface => ColorFormat::Surface,
                InputMode::Buffer => ColorFormat::SemiPlanarYuv,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::policy::RateControlMode;

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        assert!(matches!(
            EncodeSessionConfig::new(0, 1080).validate(),
            Err(Error::InvalidDimensions { width: 0, height: 1080 })
        ));
        assert!(matches!(
            EncodeSessionConfig::new(1920, 0).validate(),
            Err(Error::InvalidDimensions { .. })
        ));
        assert!(EncodeSessionConfig::new(1920, 1080).validate().is_ok());
    }

    #[test]
    fn test_resolve_uses_policy_defaults() {
        let config = EncodeSessionConfig::new(1920, 1080).set_input_mode(InputMode::Buffer);
        let format = config.resolve(Codec::H264, 15, None, None);

        assert_eq!(format.bitrate, 2_177_280);
        assert_eq!(format.frame_rate, 15);
        assert_eq!(format.keyframe_interval_secs, 8);
        assert_eq!(format.rate_control, RateControlMode::Vbr);
        assert_eq!(format.color, ColorFormat::SemiPlanarYuv);
    }

    #[test]
    fn test_resolve_precedence() {
        let config = EncodeSessionConfig::new(1280, 720)
            .set_bitrate(1_000_000)
            .set_frame_rate(30);

        // Explicit config beats policy
        let format = config.resolve(Codec::H264, 15, None, None);
        assert_eq!(format.bitrate, 1_000_000);
        assert_eq!(format.frame_rate, 30);

        // Pending override beats explicit config
        let format = config.resolve(Codec::H264, 15, Some(2_000_000), Some(24));
        assert_eq!(format.bitrate, 2_000_000);
        assert_eq!(format.frame_rate, 24);
    }

    #[test]
    fn test_resolve_surface_mode_color_format() {
        let config = EncodeSessionConfig::new(1280, 720);
        let format = config.resolve(Codec::Hevc, 15, None, None);
        assert_eq!(format.color, ColorFormat::Surface);
        assert_eq!(format.codec, Codec::Hevc);
    }
}
