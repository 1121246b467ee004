//! Detection findings: signed evidence records.

use serde::{Deserialize, Serialize};

/// A detection event, signed at creation for tamper evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub mission_id: String,
    /// Unix milliseconds at detection time.
    pub timestamp: u64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub detection_class: String,
    pub confidence: f64,
    /// Path of the saved evidence image (the detection crop).
    pub image_path: String,
    /// Content hash of the full frame, not the crop.
    pub image_hash: String,
    /// Hex Ed25519 signature over [`Finding::signable_payload`].
    pub signature: String,
}

impl Finding {
    /// The canonical byte string that gets signed.
    ///
    /// Covers every field that matters for evidence integrity. The id is
    /// assigned before signing and the signature is the output, so both
    /// are excluded. Coordinates and confidence use fixed decimal widths
    /// so the encoding is reproducible.
    pub fn signable_payload(&self) -> Vec<u8> {
        format!(
            "{}|{}|{:.8}|{:.8}|{:.2}|{}|{:.4}|{}",
            self.mission_id,
            self.timestamp,
            self.lat,
            self.lon,
            self.alt,
            self.detection_class,
            self.confidence,
            self.image_hash,
        )
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_finding() -> Finding {
        Finding {
            id: "f-1".to_string(),
            mission_id: "m-1".to_string(),
            timestamp: 1_700_000_000_000,
            lat: 25.033964,
            lon: 121.564468,
            alt: 30.0,
            detection_class: "person".to_string(),
            confidence: 0.92,
            image_path: "/var/skysentry/detections/person_1.ppm".to_string(),
            image_hash: "a".repeat(64),
            signature: String::new(),
        }
    }

    #[test]
    fn test_payload_excludes_id_and_signature() {
        let mut a = sample_finding();
        let mut b = a.clone();
        b.id = "different".to_string();
        b.signature = "deadbeef".to_string();
        assert_eq!(a.signable_payload(), b.signable_payload());

        a.confidence = 0.50;
        assert_ne!(a.signable_payload(), b.signable_payload());
    }

    #[test]
    fn test_payload_is_deterministic() {
        let finding = sample_finding();
        assert_eq!(finding.signable_payload(), finding.signable_payload());
        let expected = "m-1|1700000000000|25.03396400|121.56446800|30.00|person|0.9200|"
            .to_string()
            + &"a".repeat(64);
        assert_eq!(finding.signable_payload(), expected.into_bytes());
    }

    #[test]
    fn test_serde_round_trip() {
        let finding = sample_finding();
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }
}
