//! Codec string parser for WebCodecs API
//!
//! Parses codec strings like vp09.PP.LL.DD, av01.P.LLT.DD, avc1.PPCCLL,
//! hev1.P.T.Lxxx and the audio families (mp4a.40.X, opus, flac, pcm-<fmt>)
//! into structured information including profile, level, and bit depth.

/// Codec family resolved from a WebCodecs codec string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    // Video
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    // Audio
    Aac,
    Opus,
    Flac,
    Mp3,
    Vorbis,
    Ulaw,
    Alaw,
    PcmU8,
    PcmS16le,
    PcmS16be,
    PcmS24le,
    PcmS24be,
    PcmS32le,
    PcmS32be,
    PcmF32le,
    PcmF32be,
}

impl CodecKind {
    /// Whether this kind names a video codec
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            CodecKind::H264 | CodecKind::Hevc | CodecKind::Vp8 | CodecKind::Vp9 | CodecKind::Av1
        )
    }

    /// Whether this kind names an audio codec
    pub fn is_audio(&self) -> bool {
        !self.is_video()
    }
}

/// Parsed codec information extracted from a WebCodecs codec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// The codec family
    pub kind: CodecKind,
    /// Profile number (codec-specific interpretation)
    pub profile: Option<u8>,
    /// Level value (codec-specific, often needs multiplication by 10)
    pub level: Option<u8>,
    /// Bit depth (8, 10, or 12)
    pub bit_depth: Option<u8>,
}

impl CodecDescriptor {
    /// Create a new CodecDescriptor with just the codec kind
    pub fn new(kind: CodecKind) -> Self {
        Self {
            kind,
            profile: None,
            level: None,
            bit_depth: None,
        }
    }
}

/// Parse a WebCodecs codec string into structured information
///
/// Supported formats:
/// - VP9: `vp09.PP.LL.DD.CC.cp.tc.mc.FF` or `vp9`
/// - AV1: `av01.P.LLT.DD.M.CCC.cp.tc.mc.F` or `av1`
/// - H.264: `avc1.PPCCLL` or `avc3.PPCCLL`
/// - H.265: `hev1.P.T.Lxxx` or `hvc1.P.T.Lxxx`
/// - VP8: `vp8`
/// - AAC: `mp4a.40.X`
/// - Opus/FLAC/MP3/Vorbis: bare names
/// - u-law/a-law telephony: `ulaw`, `alaw`
/// - PCM: `pcm-<s16le|s16be|s24le|s24be|s32le|s32be|f32le|f32be|u8>`
///
/// Returns `None` if the codec string is not recognized.
pub fn parse_codec_string(codec: &str) -> Option<CodecDescriptor> {
    if codec.is_empty() {
        return None;
    }
    let codec_lower = codec.to_lowercase();

    // VP9: vp09.PP.LL.DD or vp9
    if codec_lower.starts_with("vp09") {
        return parse_vp9(codec);
    }
    if codec_lower == "vp9" {
        return Some(CodecDescriptor::new(CodecKind::Vp9));
    }

    // AV1: av01.P.LLT.DD or av1
    if codec_lower.starts_with("av01") {
        return parse_av1(codec);
    }
    if codec_lower == "av1" {
        return Some(CodecDescriptor::new(CodecKind::Av1));
    }

    // H.264: avc1.PPCCLL or avc3.PPCCLL
    if codec_lower.starts_with("avc1") || codec_lower.starts_with("avc3") {
        return parse_avc(codec);
    }

    // H.265: hev1.P.T.Lxxx or hvc1.P.T.Lxxx
    if codec_lower.starts_with("hev1") || codec_lower.starts_with("hvc1") {
        return parse_hevc(codec);
    }

    // VP8 (simple, no parameters)
    if codec_lower == "vp8" {
        return Some(CodecDescriptor::new(CodecKind::Vp8));
    }

    // AAC: mp4a.40.X (the 40 object type is AAC; anything else is unrecognized)
    if codec_lower.starts_with("mp4a") {
        return parse_aac(&codec_lower);
    }

    match codec_lower.as_str() {
        "opus" => return Some(CodecDescriptor::new(CodecKind::Opus)),
        "flac" => return Some(CodecDescriptor::new(CodecKind::Flac)),
        "mp3" => return Some(CodecDescriptor::new(CodecKind::Mp3)),
        "vorbis" => return Some(CodecDescriptor::new(CodecKind::Vorbis)),
        "ulaw" => return Some(CodecDescriptor::new(CodecKind::Ulaw)),
        "alaw" => return Some(CodecDescriptor::new(CodecKind::Alaw)),
        _ => {}
    }

    if let Some(fmt) = codec_lower.strip_prefix("pcm-") {
        return parse_pcm(fmt);
    }

    None
}

/// Whether a parsed descriptor names a codec family this engine recognizes
///
/// Backend-level support (can a context actually be opened) is answered by
/// the backend provider; this is the registry-level check only.
pub fn is_supported(descriptor: &CodecDescriptor) -> bool {
    // Every kind the parser can produce is registry-supported. Profile
    // screening: reject VP9/AV1 profiles beyond the defined range.
    match descriptor.kind {
        CodecKind::Vp9 | CodecKind::Av1 => descriptor.profile.unwrap_or(0) <= 3,
        _ => true,
    }
}

/// Parse VP9 codec string: vp09.PP.LL.DD.CC.cp.tc.mc.FF
/// - PP: profile (00-03)
/// - LL: level (10-62)
/// - DD: bit depth (08, 10, 12)
fn parse_vp9(codec: &str) -> Option<CodecDescriptor> {
    let parts: Vec<&str> = codec.split('.').collect();

    let mut parsed = CodecDescriptor::new(CodecKind::Vp9);

    if parts.len() >= 2 {
        if let Ok(profile) = parts[1].parse::<u8>() {
            parsed.profile = Some(profile);
        }
    }

    if parts.len() >= 3 {
        if let Ok(level) = parts[2].parse::<u8>() {
            parsed.level = Some(level);
        }
    }

    if parts.len() >= 4 {
        if let Ok(depth) = parts[3].parse::<u8>() {
            parsed.bit_depth = Some(depth);
        }
    }

    Some(parsed)
}

/// Parse AV1 codec string: av01.P.LLT.DD.M.CCC.cp.tc.mc.F
/// - P: profile (0=Main, 1=High, 2=Professional)
/// - LLT: level and tier (e.g., "04M" = level 4, Main tier)
/// - DD: bit depth (08, 10, 12)
fn parse_av1(codec: &str) -> Option<CodecDescriptor> {
    let parts: Vec<&str> = codec.split('.').collect();

    let mut parsed = CodecDescriptor::new(CodecKind::Av1);

    if parts.len() >= 2 {
        if let Ok(profile) = parts[1].parse::<u8>() {
            parsed.profile = Some(profile);
        }
    }

    if parts.len() >= 3 {
        let level_str: String = parts[2]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(level) = level_str.parse::<u8>() {
            parsed.level = Some(level);
        }
    }

    if parts.len() >= 4 {
        if let Ok(depth) = parts[3].parse::<u8>() {
            parsed.bit_depth = Some(depth);
        }
    }

    Some(parsed)
}

/// Parse AVC/H.264 codec string: avc1.PPCCLL
/// - PP: profile_idc (42=Baseline, 4D=Main, 58=Extended, 64=High, etc.)
/// - CC: constraint_set flags
/// - LL: level_idc (1F=3.1, 28=4.0, 33=5.1, etc.)
fn parse_avc(codec: &str) -> Option<CodecDescriptor> {
    let parts: Vec<&str> = codec.split('.').collect();

    let mut parsed = CodecDescriptor::new(CodecKind::H264);

    if parts.len() >= 2 && parts[1].len() >= 6 {
        let hex = parts[1];

        if let Ok(profile) = u8::from_str_radix(&hex[0..2], 16) {
            parsed.profile = Some(profile);
        }

        if let Ok(level) = u8::from_str_radix(&hex[4..6], 16) {
            parsed.level = Some(level);
        }
    }

    // H.264 is 8-bit outside the rare High 10 profile
    parsed.bit_depth = Some(8);

    Some(parsed)
}

/// Parse HEVC/H.265 codec string: hev1.P.TC.Lxxx.Bx
/// - P: profile (1=Main, 2=Main10, 3=Main Still Picture)
/// - Lxxx: level (L120 = level 4.0, L150 = level 5.0)
fn parse_hevc(codec: &str) -> Option<CodecDescriptor> {
    let parts: Vec<&str> = codec.split('.').collect();

    let mut parsed = CodecDescriptor::new(CodecKind::Hevc);

    if parts.len() >= 2 {
        if let Ok(profile) = parts[1].parse::<u8>() {
            parsed.profile = Some(profile);
            parsed.bit_depth = Some(if profile == 2 { 10 } else { 8 });
        }
    }

    if parts.len() >= 4 {
        let level_str = parts[3];
        if level_str.starts_with('L') || level_str.starts_with('l') {
            if let Ok(level) = level_str[1..].parse::<u8>() {
                parsed.level = Some(level);
            }
        }
    }

    Some(parsed)
}

/// Parse AAC codec string: mp4a.40.X (X = AAC profile / object type)
fn parse_aac(codec: &str) -> Option<CodecDescriptor> {
    let params = codec.strip_prefix("mp4a.")?;
    if !params.starts_with("40") {
        // Only the AAC object type family is recognized
        return None;
    }

    let mut parsed = CodecDescriptor::new(CodecKind::Aac);
    if let Some(profile_str) = params.strip_prefix("40.") {
        if let Ok(profile) = profile_str.parse::<u8>() {
            parsed.profile = Some(profile);
        }
    }

    Some(parsed)
}

/// Parse PCM codec string suffix: the part after "pcm-"
fn parse_pcm(format: &str) -> Option<CodecDescriptor> {
    let kind = match format {
        "u8" => CodecKind::PcmU8,
        "s16le" => CodecKind::PcmS16le,
        "s16be" => CodecKind::PcmS16be,
        "s24le" => CodecKind::PcmS24le,
        "s24be" => CodecKind::PcmS24be,
        "s32le" => CodecKind::PcmS32le,
        "s32be" => CodecKind::PcmS32be,
        "f32le" => CodecKind::PcmF32le,
        "f32be" => CodecKind::PcmF32be,
        _ => return None,
    };
    Some(CodecDescriptor::new(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vp9_full() {
        let parsed = parse_codec_string("vp09.00.10.08.00").unwrap();
        assert_eq!(parsed.kind, CodecKind::Vp9);
        assert_eq!(parsed.profile, Some(0));
        assert_eq!(parsed.level, Some(10));
        assert_eq!(parsed.bit_depth, Some(8));
    }

    #[test]
    fn test_parse_vp9_simple() {
        let parsed = parse_codec_string("vp9").unwrap();
        assert_eq!(parsed.kind, CodecKind::Vp9);
        assert_eq!(parsed.profile, None);
    }

    #[test]
    fn test_parse_av1_full() {
        let parsed = parse_codec_string("av01.0.04M.10.0.110").unwrap();
        assert_eq!(parsed.kind, CodecKind::Av1);
        assert_eq!(parsed.profile, Some(0));
        assert_eq!(parsed.level, Some(4));
        assert_eq!(parsed.bit_depth, Some(10));
    }

    #[test]
    fn test_parse_avc() {
        let parsed = parse_codec_string("avc1.42001f").unwrap();
        assert_eq!(parsed.kind, CodecKind::H264);
        assert_eq!(parsed.profile, Some(66)); // 0x42 = 66 = Baseline
        assert_eq!(parsed.level, Some(31)); // 0x1F = 31 = Level 3.1
        assert_eq!(parsed.bit_depth, Some(8));
    }

    #[test]
    fn test_parse_avc_high() {
        let parsed = parse_codec_string("avc1.640028").unwrap();
        assert_eq!(parsed.kind, CodecKind::H264);
        assert_eq!(parsed.profile, Some(100)); // 0x64 = 100 = High
        assert_eq!(parsed.level, Some(40)); // 0x28 = 40 = Level 4.0
    }

    #[test]
    fn test_parse_hevc_main10() {
        let parsed = parse_codec_string("hev1.2.4.L150.B0").unwrap();
        assert_eq!(parsed.kind, CodecKind::Hevc);
        assert_eq!(parsed.profile, Some(2)); // Main 10
        assert_eq!(parsed.level, Some(150)); // Level 5.0
        assert_eq!(parsed.bit_depth, Some(10));
    }

    #[test]
    fn test_parse_aac() {
        let parsed = parse_codec_string("mp4a.40.2").unwrap();
        assert_eq!(parsed.kind, CodecKind::Aac);
        assert_eq!(parsed.profile, Some(2)); // AAC-LC
        assert!(parsed.kind.is_audio());
    }

    #[test]
    fn test_parse_aac_not_aac_object_type() {
        // mp4a.69 is MP3-in-MP4, not an AAC object type
        assert!(parse_codec_string("mp4a.69").is_none());
    }

    #[test]
    fn test_parse_opus_and_friends() {
        assert_eq!(
            parse_codec_string("opus").unwrap().kind,
            CodecKind::Opus
        );
        assert_eq!(
            parse_codec_string("flac").unwrap().kind,
            CodecKind::Flac
        );
        assert_eq!(
            parse_codec_string("ulaw").unwrap().kind,
            CodecKind::Ulaw
        );
    }

    #[test]
    fn test_parse_pcm() {
        let parsed = parse_codec_string("pcm-f32le").unwrap();
        assert_eq!(parsed.kind, CodecKind::PcmF32le);
        assert!(parse_codec_string("pcm-s20le").is_none());
    }

    #[test]
    fn test_parse_unknown() {
        assert!(parse_codec_string("unknown-codec").is_none());
        assert!(parse_codec_string("").is_none());
    }

    #[test]
    fn test_is_supported_profile_screen() {
        let mut desc = parse_codec_string("vp09.00.10.08").unwrap();
        assert!(is_supported(&desc));
        desc.profile = Some(9);
        assert!(!is_supported(&desc));
    }
}
