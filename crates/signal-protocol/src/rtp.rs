//! RTP/ICE/DTLS parameter model.
//!
//! These types mirror the parameter bags the orchestrator relays
//! between peers and the media engine. The orchestrator never inspects
//! most of them; the one piece of logic it needs is
//! [`RtpCapabilities::can_consume`], the codec-compatibility gate that
//! decides whether a subscription attempt can proceed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Media kind of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio stream.
    Audio,
    /// Video stream.
    Video,
}

impl MediaKind {
    /// Returns the kind as a wire-format string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Role of a transport, chosen by the caller at creation time.
///
/// A peer conventionally holds one `Send` transport (publishing) and
/// one `Recv` transport (subscribing); explicit tagging supports any
/// number of either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportRole {
    /// Used to publish media toward the SFU.
    Send,
    /// Used to receive media from the SFU.
    Recv,
}

/// A codec a router or peer declares it can handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecCapability {
    /// Media kind this codec applies to.
    pub kind: MediaKind,
    /// Codec MIME type, e.g. `audio/opus`.
    pub mime_type: String,
    /// Clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count (audio only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific parameters, relayed verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl CodecCapability {
    /// The Opus configuration the service routes by default:
    /// 48 kHz stereo with in-band FEC and a 10 ms minimum ptime.
    #[must_use]
    pub fn opus() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("useinbandfec".to_string(), serde_json::json!(1));
        parameters.insert("minptime".to_string(), serde_json::json!(10));
        Self {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            clock_rate: 48_000,
            channels: Some(2),
            parameters,
        }
    }

    fn matches(&self, codec: &RtpCodecParameters) -> bool {
        self.mime_type.eq_ignore_ascii_case(&codec.mime_type)
            && self.clock_rate == codec.clock_rate
            && self.channels == codec.channels
    }
}

/// The set of codecs a peer or router can encode/decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    /// Supported codecs.
    pub codecs: Vec<CodecCapability>,
}

impl RtpCapabilities {
    /// Whether a peer with these capabilities can consume media
    /// described by the given producer parameters.
    ///
    /// True when at least one producer codec has a matching capability
    /// (MIME type case-insensitive, clock rate and channel count
    /// exact).
    #[must_use]
    pub fn can_consume(&self, producer: &RtpParameters) -> bool {
        producer
            .codecs
            .iter()
            .any(|codec| self.codecs.iter().any(|cap| cap.matches(codec)))
    }
}

/// One negotiated codec within a stream's RTP parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// Codec MIME type, e.g. `audio/opus`.
    pub mime_type: String,
    /// Negotiated payload type.
    pub payload_type: u8,
    /// Clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count (audio only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific parameters, relayed verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// RTP parameters describing one media stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// Media section identifier, if negotiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    /// Negotiated codecs.
    pub codecs: Vec<RtpCodecParameters>,
}

/// ICE parameters of a transport's local side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    /// ICE username fragment.
    pub username_fragment: String,
    /// ICE password.
    pub password: String,
    /// Whether the local side runs ICE lite.
    pub ice_lite: bool,
}

/// Transport protocol of an ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// UDP candidate.
    Udp,
    /// TCP candidate.
    Tcp,
}

/// One ICE candidate advertised to the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate foundation.
    pub foundation: String,
    /// Candidate priority.
    pub priority: u32,
    /// Candidate IP (announced address).
    pub ip: String,
    /// Candidate port.
    pub port: u16,
    /// Candidate transport protocol.
    pub protocol: TransportProtocol,
    /// Candidate type (`host` for an SFU).
    #[serde(rename = "type")]
    pub candidate_type: String,
}

/// DTLS role of one side of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    /// Role decided during negotiation.
    Auto,
    /// Active side of the handshake.
    Client,
    /// Passive side of the handshake.
    Server,
}

/// One certificate fingerprint within DTLS parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    /// Hash algorithm, e.g. `sha-256`.
    pub algorithm: String,
    /// Fingerprint value.
    pub value: String,
}

/// DTLS parameters for completing the secure-channel handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsParameters {
    /// DTLS role.
    pub role: DtlsRole,
    /// Certificate fingerprints.
    pub fingerprints: Vec<DtlsFingerprint>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn opus_parameters() -> RtpParameters {
        RtpParameters {
            mid: Some("0".to_string()),
            codecs: vec![RtpCodecParameters {
                mime_type: "audio/opus".to_string(),
                payload_type: 111,
                clock_rate: 48_000,
                channels: Some(2),
                parameters: BTreeMap::new(),
            }],
        }
    }

    #[test]
    fn opus_capability_matches_opus_producer() {
        let caps = RtpCapabilities {
            codecs: vec![CodecCapability::opus()],
        };
        assert!(caps.can_consume(&opus_parameters()));
    }

    #[test]
    fn mime_type_match_is_case_insensitive() {
        let mut caps = RtpCapabilities {
            codecs: vec![CodecCapability::opus()],
        };
        caps.codecs[0].mime_type = "Audio/OPUS".to_string();
        assert!(caps.can_consume(&opus_parameters()));
    }

    #[test]
    fn clock_rate_mismatch_rejects() {
        let mut caps = RtpCapabilities {
            codecs: vec![CodecCapability::opus()],
        };
        caps.codecs[0].clock_rate = 44_100;
        assert!(!caps.can_consume(&opus_parameters()));
    }

    #[test]
    fn empty_capabilities_reject() {
        let caps = RtpCapabilities::default();
        assert!(!caps.can_consume(&opus_parameters()));
    }

    #[test]
    fn codec_capability_serializes_camel_case() {
        let json = serde_json::to_value(CodecCapability::opus()).unwrap();
        assert_eq!(json["mimeType"], "audio/opus");
        assert_eq!(json["clockRate"], 48_000);
        assert_eq!(json["channels"], 2);
        assert_eq!(json["parameters"]["useinbandfec"], 1);
    }

    #[test]
    fn ice_candidate_type_field_renames() {
        let candidate = IceCandidate {
            foundation: "udpcandidate".to_string(),
            priority: 1_076_302_079,
            ip: "203.0.113.10".to_string(),
            port: 40_001,
            protocol: TransportProtocol::Udp,
            candidate_type: "host".to_string(),
        };
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["type"], "host");
        assert_eq!(json["protocol"], "udp");
    }
}
