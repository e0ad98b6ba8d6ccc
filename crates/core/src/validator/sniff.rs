//! Magic-byte audio format sniffing.

/// Identify an audio container from the first bytes of a payload.
///
/// Returns the canonical file extension, or `None` when the prefix matches no
/// known signature (HTML error pages land here, which is exactly the point).
pub fn sniff_audio_ext(buf: &[u8]) -> Option<&'static str> {
    if buf.len() < 4 {
        return None;
    }

    if buf.starts_with(b"fLaC") {
        return Some("flac");
    }
    if buf.starts_with(b"ID3") || buf[0] == 0xFF && (buf[1] & 0xE0) == 0xE0 {
        return Some("mp3");
    }
    if buf.starts_with(b"OggS") {
        return Some("ogg");
    }
    if buf.starts_with(b"RIFF") && buf.len() >= 12 && &buf[8..12] == b"WAVE" {
        return Some("wav");
    }
    if buf.len() >= 12 && &buf[4..8] == b"ftyp" {
        return Some("m4a");
    }
    if buf.starts_with(b"MAC ") {
        return Some("ape");
    }
    if buf.starts_with(b"wvpk") {
        return Some("wv");
    }
    if buf.starts_with(b"TTA1") {
        return Some("tta");
    }
    if buf.starts_with(&[0x30, 0x26, 0xB2, 0x75]) {
        // ASF container (WMA)
        return Some("wma");
    }

    None
}

/// Map a Content-Type header value onto an extension, used as a fallback when
/// the payload prefix was inconclusive.
pub fn ext_from_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/mp4" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/x-ms-wma" => Some("wma"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_flac() {
        assert_eq!(sniff_audio_ext(b"fLaC\x00\x00\x00\x22"), Some("flac"));
    }

    #[test]
    fn test_sniff_mp3_id3() {
        assert_eq!(sniff_audio_ext(b"ID3\x03\x00\x00\x00"), Some("mp3"));
    }

    #[test]
    fn test_sniff_mp3_frame_sync() {
        assert_eq!(sniff_audio_ext(&[0xFF, 0xFB, 0x90, 0x00]), Some("mp3"));
        assert_eq!(sniff_audio_ext(&[0xFF, 0xF3, 0x90, 0x00]), Some("mp3"));
    }

    #[test]
    fn test_sniff_ogg() {
        assert_eq!(sniff_audio_ext(b"OggS\x00\x02\x00\x00"), Some("ogg"));
    }

    #[test]
    fn test_sniff_wav_needs_wave_tag() {
        assert_eq!(sniff_audio_ext(b"RIFF\x00\x00\x00\x00WAVEfmt "), Some("wav"));
        assert_eq!(sniff_audio_ext(b"RIFF\x00\x00\x00\x00AVI LIST"), None);
    }

    #[test]
    fn test_sniff_m4a() {
        assert_eq!(sniff_audio_ext(b"\x00\x00\x00\x20ftypM4A "), Some("m4a"));
    }

    #[test]
    fn test_sniff_rejects_html() {
        assert_eq!(sniff_audio_ext(b"<!DOCTYPE html><html>"), None);
    }

    #[test]
    fn test_sniff_short_buffer() {
        assert_eq!(sniff_audio_ext(b"fL"), None);
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("audio/mpeg"), Some("mp3"));
        assert_eq!(ext_from_mime("audio/flac; charset=binary"), Some("flac"));
        assert_eq!(ext_from_mime("Audio/OGG"), Some("ogg"));
        assert_eq!(ext_from_mime("text/html"), None);
    }
}
