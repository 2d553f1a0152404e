// src/encode/policy.rs - Resolution-dependent encoder tuning
//
// Pure functions only: (width, height) -> bitrate / keyframe interval /
// rate-control mode. No state, no I/O.

/// Frame rate used when neither the session config nor a pending
/// `set_encode_rate` override supplies one.
pub const DEFAULT_FRAME_RATE: u32 = 15;

/// Rate-control mode handed to the encoder backend.
///
/// All current resolution tiers select `Vbr`. `Cbr` is kept as an alternative
/// for relatively static scenes; no default policy selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControlMode {
    /// Variable bitrate, suited to typical motion video.
    Vbr,
    /// Constant bitrate.
    Cbr,
}

/// Resolved tuning parameters for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub bitrate: u32,
    pub keyframe_interval_secs: u32,
    pub rate_control: RateControlMode,
}

impl Tuning {
    /// Compute the full tuning set for a resolution.
    pub fn for_resolution(width: u32, height: u32) -> Tuning {
        Tuning {
            bitrate: compute_bitrate(width, height),
            keyframe_interval_secs: keyframe_interval(width, height),
            rate_control: rate_control(width, height),
        }
    }
}

/// Target bitrate in bits/second for a resolution.
///
/// Base model is `width * height * 20 * 3 * 0.07` (empirical
/// bits-per-pixel-per-second for typical motion video), scaled down by
/// resolution tier to respect device and network ceilings:
///
/// | Tier (either dimension) | Scale |
/// |-------------------------|-------|
/// | >= 1920                 | 0.25  |
/// | >= 1280                 | 0.33  |
/// | >= 640                  | 0.4   |
/// | below 640               | 1.0   |
pub fn compute_bitrate(width: u32, height: u32) -> u32 {
    let mut bitrate = width as f64 * height as f64 * 20.0 * 3.0 * 0.07;
    if width >= 1920 || height >= 1920 {
        bitrate *= 0.25;
    } else if width >= 1280 || height >= 1280 {
        bitrate *= 0.33;
    } else if width >= 640 || height >= 640 {
        bitrate *= 0.4;
    }
    bitrate as u32
}

/// Keyframe interval in seconds for a resolution.
///
/// 8 seconds below 2000 px in both dimensions, 1 second otherwise: larger
/// frames cost more to hold as a reference, so keyframes are forced more
/// often.
pub fn keyframe_interval(width: u32, height: u32) -> u32 {
    if width < 2000 && height < 2000 {
        8
    } else {
        1
    }
}

/// Rate-control mode for a resolution. Currently `Vbr` for every tier.
pub fn rate_control(_width: u32, _height: u32) -> RateControlMode {
    RateControlMode::Vbr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(w: u32, h: u32) -> f64 {
        w as f64 * h as f64 * 20.0 * 3.0 * 0.07
    }

    #[test]
    fn test_full_hd_tier_scales_quarter() {
        // 1920x1080: base = 8_709_120, scaled by 0.25
        assert_eq!(compute_bitrate(1920, 1080), 2_177_280);
        assert_eq!(compute_bitrate(1920, 1080), (base(1920, 1080) * 0.25) as u32);
        // Tier is keyed on either dimension
        assert_eq!(compute_bitrate(1080, 1920), (base(1080, 1920) * 0.25) as u32);
        assert_eq!(compute_bitrate(3840, 2160), (base(3840, 2160) * 0.25) as u32);
    }

    #[test]
    fn test_hd_tier_scales_third() {
        assert_eq!(compute_bitrate(1280, 720), (base(1280, 720) * 0.33) as u32);
        assert_eq!(compute_bitrate(720, 1280), (base(720, 1280) * 0.33) as u32);
        // Upper boundary is exclusive: 1919 stays in this tier
        assert_eq!(compute_bitrate(1919, 1079), (base(1919, 1079) * 0.33) as u32);
    }

    #[test]
    fn test_sd_tier_scales_point_four() {
        assert_eq!(compute_bitrate(640, 480), (base(640, 480) * 0.4) as u32);
        assert_eq!(compute_bitrate(1279, 719), (base(1279, 719) * 0.4) as u32);
    }

    #[test]
    fn test_below_sd_unscaled() {
        assert_eq!(compute_bitrate(639, 479), base(639, 479) as u32);
        assert_eq!(compute_bitrate(320, 240), base(320, 240) as u32);
    }

    #[test]
    fn test_tier_boundaries() {
        // Exactly at each threshold selects the higher tier
        assert_eq!(compute_bitrate(1920, 100), (base(1920, 100) * 0.25) as u32);
        assert_eq!(compute_bitrate(1280, 100), (base(1280, 100) * 0.33) as u32);
        assert_eq!(compute_bitrate(640, 100), (base(640, 100) * 0.4) as u32);
    }

    #[test]
    fn test_keyframe_interval() {
        assert_eq!(keyframe_interval(1920, 1080), 8);
        assert_eq!(keyframe_interval(1999, 1999), 8);
        assert_eq!(keyframe_interval(2000, 1080), 1);
        assert_eq!(keyframe_interval(1080, 2000), 1);
        assert_eq!(keyframe_interval(3840, 2160), 1);
    }

    #[test]
    fn test_rate_control_always_vbr() {
        assert_eq!(rate_control(320, 240), RateControlMode::Vbr);
        assert_eq!(rate_control(3840, 2160), RateControlMode::Vbr);
    }

    #[test]
    fn test_tuning_bundle() {
        let t = Tuning::for_resolution(1920, 1080);
        assert_eq!(t.bitrate, 2_177_280);
        assert_eq!(t.keyframe_interval_secs, 8);
        assert_eq!(t.rate_control, RateControlMode::Vbr);
    }
}
