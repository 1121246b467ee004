//! Drone identity management.
//!
//! Identity material lives in a directory of small files:
//! `drone_id`, `signing_key` (owner read/write only), `verifying_key.pub`,
//! `hardware_fingerprint`, `org_id`, and `operators.json` (restricted).
//! Provisioning runs once per device; every later start loads from disk.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroize;

use skysentry_core::IdGenerator;
use skysentry_crypto::credential;

use crate::error::{IdentityError, Result};

const DRONE_ID_FILE: &str = "drone_id";
const SIGNING_KEY_FILE: &str = "signing_key";
const VERIFYING_KEY_FILE: &str = "verifying_key.pub";
const FINGERPRINT_FILE: &str = "hardware_fingerprint";
const ORG_ID_FILE: &str = "org_id";
const OPERATORS_FILE: &str = "operators.json";

/// Public identity info returned by provisioning.
///
/// `operator_secret` is shown exactly once; only its keyed hash persists.
#[derive(Debug, Clone)]
pub struct ProvisionResult {
    pub drone_id: String,
    pub org_id: String,
    pub public_key_hex: String,
    pub hardware_fingerprint: String,
    pub operator_id: String,
    pub operator_secret: String,
}

/// Device identity: keypair, hardware binding, operator credentials.
pub struct DroneIdentity {
    dir: PathBuf,
    drone_id: Option<String>,
    signing_key: Option<SigningKey>,
    verifying_key: Option<VerifyingKey>,
    hardware_fingerprint: Option<String>,
    org_id: Option<String>,
    operator_keys: HashMap<String, String>,
}

impl DroneIdentity {
    /// Open an identity directory, loading existing material if present.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut identity = Self {
            dir,
            drone_id: None,
            signing_key: None,
            verifying_key: None,
            hardware_fingerprint: None,
            org_id: None,
            operator_keys: HashMap::new(),
        };
        if identity.dir.join(DRONE_ID_FILE).exists() {
            identity.load_material()?;
        }
        Ok(identity)
    }

    pub fn is_provisioned(&self) -> bool {
        self.drone_id.is_some()
    }

    pub fn drone_id(&self) -> Option<&str> {
        self.drone_id.as_deref()
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    pub fn hardware_fingerprint(&self) -> Option<&str> {
        self.hardware_fingerprint.as_deref()
    }

    pub fn public_key_hex(&self) -> Option<String> {
        self.verifying_key.map(|k| hex::encode(k.to_bytes()))
    }

    /// Provision a new identity.
    ///
    /// Generates the keypair, computes the hardware fingerprint, mints one
    /// initial operator credential, and persists everything. Refuses to
    /// overwrite existing material.
    pub fn provision(&mut self, org_id: &str, ids: &IdGenerator) -> Result<ProvisionResult> {
        if self.is_provisioned() {
            return Err(IdentityError::AlreadyProvisioned {
                drone_id: self.drone_id.clone().unwrap_or_default(),
            });
        }

        std::fs::create_dir_all(&self.dir)?;

        let drone_id = ids.generate();
        let mut key_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let signing_key = SigningKey::from_bytes(&key_bytes);
        key_bytes.zeroize();
        let verifying_key = signing_key.verifying_key();
        let fingerprint = compute_hardware_fingerprint();

        std::fs::write(self.dir.join(DRONE_ID_FILE), &drone_id)?;

        let mut key_hex = hex::encode(signing_key.to_bytes());
        write_restricted(&self.dir.join(SIGNING_KEY_FILE), key_hex.as_bytes())?;
        key_hex.zeroize();

        let public_key_hex = hex::encode(verifying_key.to_bytes());
        std::fs::write(self.dir.join(VERIFYING_KEY_FILE), &public_key_hex)?;
        std::fs::write(self.dir.join(FINGERPRINT_FILE), &fingerprint)?;
        std::fs::write(self.dir.join(ORG_ID_FILE), org_id)?;

        // Initial operator credential: 32 random bytes, displayed once.
        let operator_id = ids.generate();
        let mut secret_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret_bytes);
        let operator_secret = hex::encode(secret_bytes);
        secret_bytes.zeroize();
        self.operator_keys
            .insert(operator_id.clone(), credential::hash_secret(&operator_secret));
        self.save_operator_keys()?;

        self.drone_id = Some(drone_id.clone());
        self.signing_key = Some(signing_key);
        self.verifying_key = Some(verifying_key);
        self.hardware_fingerprint = Some(fingerprint.clone());
        self.org_id = Some(org_id.to_string());

        info!(drone_id = %drone_id, org_id, "drone identity provisioned");

        Ok(ProvisionResult {
            drone_id,
            org_id: org_id.to_string(),
            public_key_hex,
            hardware_fingerprint: fingerprint,
            operator_id,
            operator_secret,
        })
    }

    fn load_material(&mut self) -> Result<()> {
        let dir = self.dir.clone();
        let read_trimmed = |name: &str| -> Result<String> {
            Ok(std::fs::read_to_string(dir.join(name))?.trim().to_string())
        };

        self.drone_id = Some(read_trimmed(DRONE_ID_FILE)?);

        let mut key_hex = read_trimmed(SIGNING_KEY_FILE)?;
        let mut key_vec = hex::decode(&key_hex)
            .map_err(|e| IdentityError::CorruptMaterial(format!("signing key: {e}")))?;
        key_hex.zeroize();
        let mut key_bytes: [u8; 32] = key_vec.as_slice().try_into().map_err(|_| {
            IdentityError::CorruptMaterial(format!("signing key length {}", key_vec.len()))
        })?;
        let signing_key = SigningKey::from_bytes(&key_bytes);
        key_bytes.zeroize();
        key_vec.zeroize();

        self.verifying_key = Some(signing_key.verifying_key());
        self.signing_key = Some(signing_key);

        let fp_path = self.dir.join(FINGERPRINT_FILE);
        if fp_path.exists() {
            self.hardware_fingerprint = Some(read_trimmed(FINGERPRINT_FILE)?);
        }
        let org_path = self.dir.join(ORG_ID_FILE);
        if org_path.exists() {
            self.org_id = Some(read_trimmed(ORG_ID_FILE)?);
        }

        let ops_path = self.dir.join(OPERATORS_FILE);
        if ops_path.exists() {
            let raw = std::fs::read_to_string(ops_path)?;
            self.operator_keys = serde_json::from_str(&raw)?;
        }

        Ok(())
    }

    /// Sign data with the device private key.
    pub fn sign(&self, data: &[u8]) -> Result<Signature> {
        let key = self.signing_key.as_ref().ok_or(IdentityError::NotProvisioned)?;
        Ok(key.sign(data))
    }

    /// Verify a signature against the device public key.
    pub fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        match self.verifying_key.as_ref() {
            Some(key) => key.verify(data, signature).is_ok(),
            None => false,
        }
    }

    /// Verify an operator's shared secret in constant time.
    pub fn verify_operator(&self, operator_id: &str, secret: &str) -> bool {
        match self.operator_keys.get(operator_id) {
            Some(stored) => credential::verify_secret(secret, stored),
            None => false,
        }
    }

    /// Register an additional operator credential and persist the map.
    pub fn add_operator(&mut self, operator_id: &str, secret: &str) -> Result<()> {
        self.operator_keys
            .insert(operator_id.to_string(), credential::hash_secret(secret));
        self.save_operator_keys()
    }

    fn save_operator_keys(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.operator_keys)?;
        write_restricted(&self.dir.join(OPERATORS_FILE), json.as_bytes())
    }
}

/// Write a file readable and writable by the owner only.
fn write_restricted(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Derive a hardware fingerprint from stable device identifiers.
///
/// Prefers the device-tree serial number, falls back to the machine id,
/// then to random bytes for dev hosts with neither. The first non-loopback
/// MAC address is mixed in when present.
fn compute_hardware_fingerprint() -> String {
    let mut parts: Vec<String> = Vec::new();

    let serial = Path::new("/proc/device-tree/serial-number");
    let machine_id = Path::new("/etc/machine-id");
    if let Ok(text) = std::fs::read_to_string(serial) {
        parts.push(text.trim_matches(['\0', '\n', ' ']).to_string());
    } else if let Ok(text) = std::fs::read_to_string(machine_id) {
        parts.push(text.trim().to_string());
    } else {
        let mut fallback = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut fallback);
        parts.push(hex::encode(fallback));
    }

    if let Some(mac) = first_interface_mac() {
        parts.push(mac);
    }

    blake3::hash(parts.join("|").as_bytes()).to_hex().to_string()
}

fn first_interface_mac() -> Option<String> {
    let net = Path::new("/sys/class/net");
    let mut names: Vec<PathBuf> = std::fs::read_dir(net)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    names.sort();
    for iface in names {
        if iface.file_name().is_some_and(|n| n == "lo") {
            continue;
        }
        if let Ok(mac) = std::fs::read_to_string(iface.join("address")) {
            let mac = mac.trim().to_string();
            if !mac.is_empty() && mac != "00:00:00:00:00:00" {
                return Some(mac);
            }
        }
    }
    None
}
