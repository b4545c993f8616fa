//! Audio upload validation
//!
//! Uploads are checked by size, file extension and, when the name gives no
//! hint, by magic bytes.

use std::path::Path;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

pub const MAX_AUDIO_SIZE: usize = 10 * 1024 * 1024;
const MAX_AUDIO_SIZE_MB: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
    Ogg,
    Flac,
    Webm,
}

impl AudioFormat {
    /// Format from the first bytes of the payload
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"ID3") || matches!(data, [0xFF, b, ..] if b & 0xE0 == 0xE0) {
            Some(AudioFormat::Mp3)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            Some(AudioFormat::Wav)
        } else if data.starts_with(b"OggS") {
            Some(AudioFormat::Ogg)
        } else if data.starts_with(b"fLaC") {
            Some(AudioFormat::Flac)
        } else if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Some(AudioFormat::Webm)
        } else if data.len() >= 8 && &data[4..8] == b"ftyp" {
            Some(AudioFormat::M4a)
        } else {
            None
        }
    }

    pub fn extension(&self) -> String {
        format!(".{}", self.as_ref())
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

pub fn supported_extensions() -> String {
    AudioFormat::iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check an uploaded clip and work out its format
pub fn validate_audio(filename: Option<&str>, data: &[u8]) -> Result<AudioFormat, String> {
    if data.is_empty() {
        return Err("No audio data provided".to_string());
    }
    if data.len() > MAX_AUDIO_SIZE {
        return Err(format!(
            "File too large: {:.2} MB (max: {} MB)",
            data.len() as f64 / (1024.0 * 1024.0),
            MAX_AUDIO_SIZE_MB
        ));
    }

    let extension = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension {
        Some(ext) => {
            let format: AudioFormat = ext.parse().map_err(|_| {
                format!("Unsupported format: .{}. Supported: {}", ext, supported_extensions())
            })?;
            if let Some(sniffed) = AudioFormat::sniff(data) {
                if sniffed != format {
                    log::warn!(
                        "[STT] Upload named .{} looks like {}",
                        ext,
                        sniffed.as_ref()
                    );
                }
            }
            Ok(format)
        }
        None => AudioFormat::sniff(data).ok_or_else(|| {
            format!("Unsupported format: unknown. Supported: {}", supported_extensions())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_wins_over_content() {
        assert_eq!(validate_audio(Some("clip.MP3"), b"ID3\x04").unwrap(), AudioFormat::Mp3);
        assert_eq!(validate_audio(Some("voice.webm"), b"OggS....").unwrap(), AudioFormat::Webm);
        assert_eq!(validate_audio(Some("noext"), b"fLaC\x00").unwrap(), AudioFormat::Flac);
        assert!(validate_audio(Some("notes.txt"), b"hello").is_err());
    }

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(AudioFormat::sniff(b"ID3\x04rest"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(&[0xFF, 0xFB, 0x90, 0x00]), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::sniff(b"OggS\x00\x02"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::sniff(b"fLaC\x00"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), Some(AudioFormat::Webm));
        assert_eq!(AudioFormat::sniff(b"\x00\x00\x00\x20ftypM4A "), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::sniff(b"hello"), None);
    }

    #[test]
    fn test_validate_audio() {
        assert_eq!(validate_audio(Some("a.wav"), b"RIFF....WAVE").unwrap(), AudioFormat::Wav);
        assert_eq!(validate_audio(None, b"OggS....").unwrap(), AudioFormat::Ogg);
        assert_eq!(validate_audio(Some("a.wav"), b"").unwrap_err(), "No audio data provided");

        let err = validate_audio(Some("a.aiff"), b"FORM").unwrap_err();
        assert_eq!(
            err,
            "Unsupported format: .aiff. Supported: .mp3, .wav, .m4a, .ogg, .flac, .webm"
        );

        let big = vec![0u8; MAX_AUDIO_SIZE + 1];
        assert!(validate_audio(Some("a.mp3"), &big).unwrap_err().starts_with("File too large: 10.00 MB"));
    }
}
