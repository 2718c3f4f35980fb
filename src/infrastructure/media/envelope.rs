//! Media envelope codec
//!
//! The telephony transport wraps PCM in JSON envelopes:
//!
//! ```text
//! {"kind":"AudioMetadata","audioMetadata":{"subscriptionId":..,"encoding":"PCM","sampleRate":16000,"channels":1,"length":640}}
//! {"kind":"AudioData","audioData":{"timestamp":..,"participantRawID":..,"data":"<base64>","silent":false}}
//! ```
//!
//! Envelopes of any other kind (DTMF, control) decode to `None`.

use crate::domain::media::{AudioFormat, MediaFrame};
use crate::domain::shared::{DomainError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND_AUDIO_METADATA: &str = "AudioMetadata";
pub const KIND_AUDIO_DATA: &str = "AudioData";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    pub subscription_id: Option<String>,
    pub encoding: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub length: Option<usize>,
}

impl AudioMetadata {
    /// Inbound format announced by the platform; only PCM is understood
    pub fn format(&self) -> Option<AudioFormat> {
        let pcm = self
            .encoding
            .as_deref()
            .map(|e| e.eq_ignore_ascii_case("pcm"))
            .unwrap_or(true);
        if !pcm || self.sample_rate == 0 || self.channels == 0 {
            return None;
        }
        Some(AudioFormat::pcm16(self.sample_rate, self.channels))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    pub timestamp: Option<String>,
    pub participant_raw_id: Option<String>,
    pub payload: Bytes,
    pub silent: bool,
}

impl AudioData {
    pub fn into_frame(self, format: AudioFormat) -> MediaFrame {
        MediaFrame::new(format, self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Metadata(AudioMetadata),
    Audio(AudioData),
}

#[derive(Deserialize)]
struct RawEnvelope {
    kind: String,
    #[serde(rename = "audioMetadata")]
    audio_metadata: Option<Value>,
    #[serde(rename = "audioData")]
    audio_data: Option<Value>,
}

#[derive(Deserialize)]
struct RawAudioData {
    timestamp: Option<String>,
    #[serde(rename = "participantRawID")]
    participant_raw_id: Option<String>,
    #[serde(default)]
    data: String,
    #[serde(default)]
    silent: bool,
}

/// Decode one text message
pub fn decode(text: &str) -> Result<Option<InboundMessage>> {
    decode_bytes(text.as_bytes())
}

/// Decode one message delivered as a binary frame
pub fn decode_bytes(bytes: &[u8]) -> Result<Option<InboundMessage>> {
    let envelope: RawEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::TransportDecode(format!("malformed envelope: {}", e)))?;

    match envelope.kind.as_str() {
        KIND_AUDIO_METADATA => {
            let section = envelope.audio_metadata.ok_or_else(|| {
                DomainError::TransportDecode("AudioMetadata without audioMetadata".to_string())
            })?;
            let metadata: AudioMetadata = serde_json::from_value(section)
                .map_err(|e| DomainError::TransportDecode(format!("malformed audioMetadata: {}", e)))?;
            Ok(Some(InboundMessage::Metadata(metadata)))
        }
        KIND_AUDIO_DATA => {
            let section = envelope.audio_data.ok_or_else(|| {
                DomainError::TransportDecode("AudioData without audioData".to_string())
            })?;
            let raw: RawAudioData = serde_json::from_value(section)
                .map_err(|e| DomainError::TransportDecode(format!("malformed audioData: {}", e)))?;
            let payload = STANDARD
                .decode(raw.data.as_bytes())
                .map_err(|e| DomainError::TransportDecode(format!("audio payload is not base64: {}", e)))?;
            Ok(Some(InboundMessage::Audio(AudioData {
                timestamp: raw.timestamp,
                participant_raw_id: raw.participant_raw_id,
                payload: Bytes::from(payload),
                silent: raw.silent,
            })))
        }
        _ => Ok(None),
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    kind: &'static str,
    #[serde(rename = "audioData")]
    audio_data: OutboundAudio<'a>,
}

#[derive(Serialize)]
struct OutboundAudio<'a> {
    data: &'a str,
}

/// Wrap one outbound frame for the transport
pub fn encode_audio(frame: &MediaFrame) -> Result<String> {
    let data = STANDARD.encode(&frame.payload);
    serde_json::to_string(&OutboundEnvelope {
        kind: KIND_AUDIO_DATA,
        audio_data: OutboundAudio { data: &data },
    })
    .map_err(|e| DomainError::Internal(format!("failed to encode audio envelope: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_metadata() {
        let text = json!({
            "kind": "AudioMetadata",
            "audioMetadata": {
                "subscriptionId": "sub-1",
                "encoding": "PCM",
                "sampleRate": 24000,
                "channels": 1,
                "length": 960
            }
        })
        .to_string();

        match decode(&text).unwrap() {
            Some(InboundMessage::Metadata(metadata)) => {
                assert_eq!(metadata.format(), Some(AudioFormat::pcm16(24_000, 1)));
                assert_eq!(metadata.length, Some(960));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_audio() {
        let text = json!({
            "kind": "AudioData",
            "audioData": {
                "timestamp": "2026-01-05T10:00:00Z",
                "participantRawID": "4:+14255550123",
                "data": STANDARD.encode([1u8, 0, 2, 0]),
                "silent": false
            }
        })
        .to_string();

        match decode(&text).unwrap() {
            Some(InboundMessage::Audio(audio)) => {
                assert_eq!(audio.payload, Bytes::from_static(&[1, 0, 2, 0]));
                assert_eq!(audio.participant_raw_id.as_deref(), Some("4:+14255550123"));
                let frame = audio.into_frame(AudioFormat::OUTBOUND);
                assert_eq!(frame.sample_count(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_binary_message_decodes_like_text() {
        let text = json!({"kind": "AudioData", "audioData": {"data": ""}}).to_string();
        assert!(matches!(
            decode_bytes(text.as_bytes()).unwrap(),
            Some(InboundMessage::Audio(_))
        ));
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        let text = json!({"kind": "DtmfData", "dtmfData": {"data": "5"}}).to_string();
        assert_eq!(decode(&text).unwrap(), None);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            decode("{not json"),
            Err(DomainError::TransportDecode(_))
        ));
        assert!(matches!(
            decode(r#"{"kind":"AudioData","audioData":{"data":"***"}}"#),
            Err(DomainError::TransportDecode(_))
        ));
        assert!(matches!(
            decode(r#"{"kind":"AudioData"}"#),
            Err(DomainError::TransportDecode(_))
        ));
    }

    #[test]
    fn test_non_pcm_metadata_has_no_format() {
        let metadata = AudioMetadata {
            subscription_id: None,
            encoding: Some("OPUS".to_string()),
            sample_rate: 48_000,
            channels: 1,
            length: None,
        };
        assert_eq!(metadata.format(), None);
    }

    #[test]
    fn test_encode_audio() {
        let frame = MediaFrame::new(AudioFormat::OUTBOUND, vec![1u8, 0, 2, 0]);
        let value: Value = serde_json::from_str(&encode_audio(&frame).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"kind": "AudioData", "audioData": {"data": STANDARD.encode([1u8, 0, 2, 0])}})
        );
    }
}
