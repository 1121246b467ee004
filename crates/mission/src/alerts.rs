//! Detection-to-alert pipeline.
//!
//! Converts raw detections plus the current frame and position into
//! signed, stored, published findings. A per-class cooldown suppresses
//! repeat alerts; the cooldown stamp is taken on pass-through so a burst
//! inside the window produces exactly one finding.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use skysentry_audit::AuditLog;
use skysentry_core::{unix_millis, IdGenerator};
use skysentry_crypto::hash;
use skysentry_domain::{AuditDetails, Finding};
use skysentry_identity::CryptoEngine;
use skysentry_store::DataStore;
use skysentry_vision::{Detection, Frame};

use crate::error::MissionError;
use crate::transport::{AlertPayload, GeoPoint, Transport};

/// Pixels of context kept around a detection crop.
const CROP_PAD_PX: u32 = 50;

/// Per-mission alert pipeline. Owned and driven by one control loop;
/// the cooldown map needs no external synchronization.
pub struct AlertPipeline {
    store: Arc<DataStore>,
    engine: Arc<CryptoEngine>,
    audit: Arc<AuditLog>,
    transport: Option<Arc<dyn Transport>>,
    ids: Arc<IdGenerator>,
    mission_id: String,
    detections_dir: PathBuf,
    cooldown: Duration,
    last_alert: HashMap<String, Instant>,
}

impl AlertPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<DataStore>,
        engine: Arc<CryptoEngine>,
        audit: Arc<AuditLog>,
        transport: Option<Arc<dyn Transport>>,
        ids: Arc<IdGenerator>,
        mission_id: impl Into<String>,
        detections_dir: impl Into<PathBuf>,
        cooldown: Duration,
    ) -> Result<Self, MissionError> {
        let detections_dir = detections_dir.into();
        std::fs::create_dir_all(&detections_dir)?;
        Ok(Self {
            store,
            engine,
            audit,
            transport,
            ids,
            mission_id: mission_id.into(),
            detections_dir,
            cooldown,
            last_alert: HashMap::new(),
        })
    }

    /// Process detections into signed findings.
    ///
    /// Returns the findings that were actually created, i.e. that passed
    /// the cooldown filter.
    pub fn process_detections(
        &mut self,
        detections: &[Detection],
        frame: &Frame,
        lat: f64,
        lon: f64,
        alt: f64,
    ) -> Result<Vec<Finding>, MissionError> {
        let mut findings = Vec::new();

        for detection in detections {
            let now = Instant::now();
            if let Some(last) = self.last_alert.get(&detection.class_name) {
                if now.duration_since(*last) < self.cooldown {
                    continue;
                }
            }
            self.last_alert.insert(detection.class_name.clone(), now);

            let timestamp = unix_millis();

            // Save the padded crop; hash the full frame for evidence.
            let crop = frame.crop(detection.x1, detection.y1, detection.x2, detection.y2, CROP_PAD_PX);
            let image_path = self
                .detections_dir
                .join(format!("{}_{timestamp}.ppm", detection.class_name));
            std::fs::write(&image_path, crop.encode_ppm())?;
            let image_hash = hash::hash_bytes(&frame.encode_ppm());

            let mut finding = Finding {
                id: self.ids.generate(),
                mission_id: self.mission_id.clone(),
                timestamp,
                lat,
                lon,
                alt,
                detection_class: detection.class_name.clone(),
                confidence: detection.confidence,
                image_path: image_path.display().to_string(),
                image_hash,
                signature: String::new(),
            };
            finding.signature = self.engine.sign_data(&finding.signable_payload())?;

            self.store.save_finding(&finding)?;

            let mut details = AuditDetails::new();
            details.insert("finding_id".to_string(), finding.id.clone().into());
            details.insert("class".to_string(), detection.class_name.clone().into());
            details.insert("confidence".to_string(), detection.confidence.into());
            details.insert("location".to_string(), serde_json::json!([lat, lon, alt]));
            self.audit.log("detection", details)?;

            if let Some(transport) = &self.transport {
                if transport.is_connected() {
                    let alert = AlertPayload {
                        finding_id: finding.id.clone(),
                        mission_id: self.mission_id.clone(),
                        timestamp,
                        detection_class: finding.detection_class.clone(),
                        confidence: finding.confidence,
                        location: GeoPoint { lat, lon, alt },
                        image_hash: finding.image_hash.clone(),
                        signature: finding.signature.clone(),
                    };
                    if !transport.publish_alert(&alert) {
                        warn!(finding_id = %finding.id, "alert publish failed");
                    }
                }
            }

            info!(
                class = %finding.detection_class,
                confidence = finding.confidence,
                lat,
                lon,
                "alert raised"
            );
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Rig {
        pipeline: AlertPipeline,
        store: Arc<DataStore>,
        engine: Arc<CryptoEngine>,
        alerts: Arc<Recorder>,
        paths: Vec<PathBuf>,
    }

    #[derive(Default)]
    struct Recorder {
        alerts: Mutex<Vec<AlertPayload>>,
        connected: std::sync::atomic::AtomicBool,
    }

    impl Transport for Recorder {
        fn is_connected(&self) -> bool {
            self.connected.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn publish_alert(&self, alert: &AlertPayload) -> bool {
            self.alerts.lock().unwrap().push(alert.clone());
            true
        }

        fn publish_status(&self, _status: &crate::transport::StatusPayload) -> bool {
            true
        }

        fn publish_telemetry(&self, _telemetry: &skysentry_flight::TelemetryState) -> bool {
            true
        }
    }

    impl Drop for Rig {
        fn drop(&mut self) {
            for path in &self.paths {
                std::fs::remove_dir_all(path).ok();
                std::fs::remove_file(path).ok();
            }
        }
    }

    fn rig(cooldown: Duration) -> Rig {
        let base = std::env::temp_dir().join(format!("test_alerts_{}", uuid::Uuid::new_v4()));
        let identity_dir = base.join("identity");
        let db_path = base.join("missions.db");
        let detections_dir = base.join("detections");

        let ids = Arc::new(IdGenerator::new());
        let mut identity = skysentry_identity::DroneIdentity::load(&identity_dir).unwrap();
        identity.provision("test-org", &ids).unwrap();
        let engine = Arc::new(CryptoEngine::new(Arc::new(identity)));
        let store = Arc::new(DataStore::open(&db_path).unwrap());
        store
            .save_mission(&skysentry_domain::Mission::new(
                "m-1".to_string(),
                "drone-1",
                Vec::new(),
                skysentry_domain::MissionParameters::default(),
            ))
            .unwrap();
        let audit = Arc::new(AuditLog::new(store.clone(), engine.clone(), ids.clone(), "drone-1"));
        let alerts = Arc::new(Recorder::default());
        alerts.connected.store(true, std::sync::atomic::Ordering::SeqCst);

        let pipeline = AlertPipeline::new(
            store.clone(),
            engine.clone(),
            audit,
            Some(alerts.clone() as Arc<dyn Transport>),
            ids,
            "m-1",
            &detections_dir,
            cooldown,
        )
        .unwrap();

        Rig { pipeline, store, engine, alerts, paths: vec![base] }
    }

    fn detection(class: &str) -> Detection {
        Detection {
            class_name: class.to_string(),
            class_id: 0,
            confidence: 0.9,
            x1: 10,
            y1: 10,
            x2: 40,
            y2: 40,
        }
    }

    #[test]
    fn test_finding_is_signed_and_stored() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        let findings = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 25.0, 121.0, 30.0)
            .unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert!(rig.engine.verify_signature(&finding.signable_payload(), &finding.signature));
        assert_eq!(finding.image_hash, hash::hash_bytes(&frame.encode_ppm()));
        assert!(std::path::Path::new(&finding.image_path).exists());

        let stored = rig.store.findings_for_mission("m-1").unwrap();
        assert_eq!(stored, findings);
    }

    #[test]
    fn test_mutated_finding_fails_verification() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        let mut finding = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 25.0, 121.0, 30.0)
            .unwrap()
            .remove(0);
        finding.confidence = 0.5;
        assert!(!rig.engine.verify_signature(&finding.signable_payload(), &finding.signature));
    }

    #[test]
    fn test_same_class_cooldown_suppresses() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        let first = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 0.0, 0.0, 0.0)
            .unwrap();
        let second = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 0.0, 0.0, 0.0)
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "same class within cooldown is suppressed");
        assert_eq!(rig.store.finding_count("m-1").unwrap(), 1);
    }

    #[test]
    fn test_different_classes_both_alert() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        let findings = rig
            .pipeline
            .process_detections(
                &[detection("person"), detection("vehicle")],
                &frame,
                0.0,
                0.0,
                0.0,
            )
            .unwrap();
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_cooldown_expiry_allows_new_alert() {
        let mut rig = rig(Duration::from_millis(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        rig.pipeline
            .process_detections(&[detection("person")], &frame, 0.0, 0.0, 0.0)
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let again = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 0.0, 0.0, 0.0)
            .unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_alert_published_with_all_fields() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        let findings = rig
            .pipeline
            .process_detections(&[detection("person")], &frame, 25.0, 121.0, 30.0)
            .unwrap();

        let published = rig.alerts.alerts.lock().unwrap();
        assert_eq!(published.len(), 1);
        let alert = &published[0];
        assert_eq!(alert.finding_id, findings[0].id);
        assert_eq!(alert.mission_id, "m-1");
        assert_eq!(alert.detection_class, "person");
        assert_eq!(alert.location, GeoPoint { lat: 25.0, lon: 121.0, alt: 30.0 });
        assert_eq!(alert.signature, findings[0].signature);
    }

    #[test]
    fn test_detection_audited() {
        let mut rig = rig(Duration::from_secs(30));
        let frame = Frame::solid(100, 100, [7, 7, 7]);
        rig.pipeline
            .process_detections(&[detection("person")], &frame, 0.0, 0.0, 0.0)
            .unwrap();
        let entries = rig.store.audit_entries_asc().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "detection");
        assert_eq!(entries[0].details["class"], serde_json::json!("person"));
    }
}
