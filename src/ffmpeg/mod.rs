//! FFmpeg-backed [`HardwareEncoder`] implementation.
//!
//! Wraps an `ffmpeg-next` video encoder as one encode session. Hardware
//! encoders (NVENC/VAAPI/QSV/V4L2M2M) are preferred when present, with
//! automatic fallback to the software codec.
//!
//! Buffer input mode only: FFmpeg has no portable notion of a
//! caller-rendered GPU drawing surface, so configuring a surface-mode
//! session reports [`EncoderError::Unsupported`] rather than pretending.
//!
//! **Feature Flag**: Only available when the `ffmpeg` feature is enabled.

use std::time::Duration;

use bytes::Bytes;
use log::{info, warn};

use crate::encode::encoder::{Codec, ColorFormat, EncoderFormat, HardwareEncoder, SurfaceHandle};
use crate::encode::frame::{EncodedUnit, PixelFormat, RawFrame};
use crate::encode::policy::RateControlMode;
use crate::error::EncoderError;

/// Packets drained from the encoder after EOF during teardown, at most.
const TEARDOWN_DRAIN_CAP: usize = 256;

/// One FFmpeg encoder session.
///
/// # Example
///
/// ```rust,ignore
/// let processor = EncodeProcessor::new(Box::new(|| Box::new(FfmpegEncoder::new())));
/// ```
pub struct FfmpegEncoder {
    inner: Option<ffmpeg_next::codec::encoder::Video>,
}

impl FfmpegEncoder {
    pub fn new() -> FfmpegEncoder {
        FfmpegEncoder { inner: None }
    }

    fn software_codec_name(codec: Codec) -> &'static str {
        match codec {
            Codec::H264 => "libx264",
            Codec::Hevc => "libx265",
        }
    }

    /// Hardware encoder candidates in preference order.
    fn hardware_codec_names(codec: Codec) -> &'static [&'static str] {
        match codec {
            Codec::H264 => &["h264_nvenc", "h264_vaapi", "h264_qsv", "h264_v4l2m2m"],
            Codec::Hevc => &["hevc_nvenc", "hevc_vaapi", "hevc_qsv", "hevc_v4l2m2m"],
        }
    }

    fn find_codec(codec: Codec) -> Result<(ffmpeg_next::Codec, bool), EncoderError> {
        for name in Self::hardware_codec_names(codec) {
            if let Some(found) = ffmpeg_next::encoder::find_by_name(name) {
                info!("found hardware encoder: {}", name);
                return Ok((found, true));
            }
        }
        let sw_name = Self::software_codec_name(codec);
        info!("no hardware encoder found, using software encoder: {}", sw_name);
        ffmpeg_next::encoder::find_by_name(sw_name)
            .map(|c| (c, false))
            .ok_or_else(|| EncoderError::Unsupported(format!("codec not found: {}", sw_name)))
    }

    fn open_session(
        codec: ffmpeg_next::Codec,
        format: &EncoderFormat,
    ) -> Result<ffmpeg_next::codec::encoder::Video, EncoderError> {
        let context = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = context
            .encoder()
            .video()
            .map_err(|e| EncoderError::Device(e.to_string()))?;

        encoder.set_width(format.width);
        encoder.set_height(format.height);
        encoder.set_format(ffmpeg_next::format::Pixel::NV12);
        encoder.set_frame_rate(Some(ffmpeg_next::Rational(format.frame_rate as i32, 1)));
        // Session timestamps are microseconds; use the matching time base so
        // pts values pass through unrescaled.
        encoder.set_time_base(ffmpeg_next::util::mathematics::rescale::TIME_BASE);
        encoder.set_bit_rate(format.bitrate as usize);
        if format.rate_control == RateControlMode::Cbr {
            encoder.set_max_bit_rate(format.bitrate as usize);
        }
        encoder.set_gop(format.frame_rate * format.keyframe_interval_secs);

        let mut opts = ffmpeg_next::Dictionary::new();
        opts.set("preset", "ultrafast");
        opts.set("tune", "zerolatency");

        encoder
            .open_with(opts)
            .map_err(|e| EncoderError::Device(e.to_string()))
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareEncoder for FfmpegEncoder {
    fn configure(&mut self, format: &EncoderFormat) -> Result<Option<SurfaceHandle>, EncoderError> {
        if format.color == ColorFormat::Surface {
            return Err(EncoderError::Unsupported(
                "ffmpeg backend supports buffer input mode only".into(),
            ));
        }
        ffmpeg_next::init().map_err(|e| EncoderError::Device(e.to_string()))?;

        let (codec, is_hardware) = Self::find_codec(format.codec)?;
        let selected = codec.name().to_string();
        let opened = match Self::open_session(codec, format) {
            Ok(encoder) => encoder,
            Err(e) if is_hardware => {
                // Hardware encoders fail for reasons software ones don't
                // (missing device nodes, driver limits); retry in software.
                warn!(
                    "hardware encoder {} failed: {}, falling back to {}",
                    selected,
                    e,
                    Self::software_codec_name(format.codec)
                );
                let sw = ffmpeg_next::encoder::find_by_name(Self::software_codec_name(format.codec))
                    .ok_or_else(|| {
                        EncoderError::Unsupported(format!(
                            "codec not found: {}",
                            Self::software_codec_name(format.codec)
                        ))
                    })?;
                Self::open_session(sw, format)?
            }
            Err(e) => return Err(e),
        };

        self.inner = Some(opened);
        Ok(None)
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        // The session is live once opened; nothing further to kick.
        if self.inner.is_some() {
            Ok(())
        } else {
            Err(EncoderError::NotConfigured)
        }
    }

    fn submit_frame(&mut self, frame: &RawFrame, pts_us: i64) -> Result<(), EncoderError> {
        let encoder = self.inner.as_mut().ok_or(EncoderError::NotConfigured)?;
        if frame.width != encoder.width() || frame.height != encoder.height() {
            return Err(EncoderError::Unsupported(format!(
                "frame is {}x{}, session is {}x{}",
                frame.width,
                frame.height,
                encoder.width(),
                encoder.height()
            )));
        }
        let expected = expected_buffer_len(frame.format, frame.width, frame.height);
        if frame.data.len() < expected {
            return Err(EncoderError::Unsupported(format!(
                "frame buffer is {} bytes, {} expected",
                frame.data.len(),
                expected
            )));
        }

        let mut video = to_ffmpeg_frame(frame);
        video.set_pts(Some(pts_us));
        match encoder.send_frame(&video) {
            Ok(()) => Ok(()),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Err(EncoderError::Again)
            }
            Err(e) => Err(EncoderError::Device(e.to_string())),
        }
    }

    fn poll_output(&mut self, _timeout: Duration) -> Result<Option<EncodedUnit>, EncoderError> {
        let encoder = self.inner.as_mut().ok_or(EncoderError::NotConfigured)?;
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(EncodedUnit {
                data: Bytes::copy_from_slice(packet.data().unwrap_or(&[])),
                pts_us: packet.pts().unwrap_or(0),
                keyframe: packet.is_key(),
            })),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(EncoderError::Device(e.to_string())),
        }
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        let Some(mut encoder) = self.inner.take() else {
            return Ok(());
        };
        encoder
            .send_eof()
            .map_err(|e| EncoderError::Device(e.to_string()))?;
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        for _ in 0..TEARDOWN_DRAIN_CAP {
            if encoder.receive_packet(&mut packet).is_err() {
                break;
            }
        }
        Ok(())
    }
}

fn expected_buffer_len(format: PixelFormat, width: u32, height: u32) -> usize {
    match format {
        // Both 4:2:0 layouts carry 12 bits per pixel
        PixelFormat::Nv12 | PixelFormat::I420 => (width as usize * height as usize) * 3 / 2,
    }
}

/// Copy a raw frame into a freshly allocated, stride-aware FFmpeg frame.
fn to_ffmpeg_frame(frame: &RawFrame) -> ffmpeg_next::frame::Video {
    let pixel = match frame.format {
        PixelFormat::Nv12 => ffmpeg_next::format::Pixel::NV12,
        PixelFormat::I420 => ffmpeg_next::format::Pixel::YUV420P,
    };
    let mut video = ffmpeg_next::frame::Video::new(pixel, frame.width, frame.height);

    let w = frame.width as usize;
    let h = frame.height as usize;
    match frame.format {
        PixelFormat::Nv12 => {
            copy_plane(&mut video, 0, &frame.data[..w * h], w, h);
            copy_plane(&mut video, 1, &frame.data[w * h..], w, h / 2);
        }
        PixelFormat::I420 => {
            let (cw, ch) = (w / 2, h / 2);
            let u_off = w * h;
            let v_off = u_off + cw * ch;
            copy_plane(&mut video, 0, &frame.data[..u_off], w, h);
            copy_plane(&mut video, 1, &frame.data[u_off..v_off], cw, ch);
            copy_plane(&mut video, 2, &frame.data[v_off..], cw, ch);
        }
    }
    video
}

fn copy_plane(
    video: &mut ffmpeg_next::frame::Video,
    plane: usize,
    src: &[u8],
    row_bytes: usize,
    rows: usize,
) {
    let stride = video.stride(plane);
    let dst = video.data_mut(plane);
    for row in 0..rows {
        let dst_start = row * stride;
        let src_start = row * row_bytes;
        dst[dst_start..dst_start + row_bytes]
            .copy_from_slice(&src[src_start..src_start + row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_buffer_len() {
        assert_eq!(expected_buffer_len(PixelFormat::Nv12, 1920, 1080), 3_110_400);
        assert_eq!(expected_buffer_len(PixelFormat::I420, 640, 480), 460_800);
    }

    #[test]
    fn test_codec_name_tables() {
        assert_eq!(FfmpegEncoder::software_codec_name(Codec::H264), "libx264");
        assert_eq!(FfmpegEncoder::software_codec_name(Codec::Hevc), "libx265");
        assert!(FfmpegEncoder::hardware_codec_names(Codec::H264)
            .iter()
            .all(|n| n.starts_with("h264_")));
        assert!(FfmpegEncoder::hardware_codec_names(Codec::Hevc)
            .iter()
            .all(|n| n.starts_with("hevc_")));
    }
}
