//! Wire types exchanged between validators: signup info, wait timers and
//! wait certificates. These are plain data containers — the only behavior
//! they carry is canonical (de)serialization of the fields that get signed,
//! kept separate from the `signature` field itself so that `serialize()`
//! always returns exactly the bytes a signature was computed over.

use serde::{Deserialize, Serialize};

use crate::canon;
use crate::error::Result;

/// Everything a validator needs to join the PoET network: its PoET public
/// key, the (fake) attestation proof, its anti-Sybil ID, and its sealed
/// signup data so it can be restored across a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupInfo {
    pub poet_public_key: String,
    pub proof_data: String,
    pub anti_sybil_id: String,
    pub sealed_signup_data: String,
}

impl SignupInfo {
    pub fn serialize(&self) -> String {
        canon::to_string(self)
    }

    pub fn from_serialized(serialized: &str) -> Result<Self> {
        canon::from_str(serialized)
    }
}

/// The payload that `unseal_signup_data` decodes back into a PoET keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSignupData {
    pub poet_public_key: String,
    pub poet_private_key: String,
}

/// `proof_data`'s evidence payload: a fake PSE manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePayload {
    pub pse_manifest: String,
}

/// The proof data bundled into a `SignupInfo`: the (fake) evidence payload,
/// the verification report it accompanies, and the report key's signature
/// over that report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofData {
    pub evidence_payload: EvidencePayload,
    pub verification_report: String,
    pub signature: String,
}

/// The attestation verification report (AVR). Field names mirror Intel's
/// IAS API verbatim since they're part of the wire format peers parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    #[serde(rename = "epidPseudonym")]
    pub epid_pseudonym: String,
    pub id: String,
    #[serde(rename = "isvEnclaveQuoteStatus")]
    pub isv_enclave_quote_status: String,
    #[serde(rename = "isvEnclaveQuoteBody")]
    pub isv_enclave_quote_body: String,
    #[serde(rename = "pseManifestStatus")]
    pub pse_manifest_status: String,
    #[serde(rename = "pseManifestHash")]
    pub pse_manifest_hash: String,
    pub nonce: String,
    pub timestamp: String,
}

/// The fields of a [`WaitTimer`] that get signed. Kept separate from the
/// signature itself so `WaitTimer::serialize` always returns exactly the
/// bytes a signature was computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WaitTimerPayload {
    validator_address: String,
    duration: f64,
    previous_certificate_id: String,
    local_mean: f64,
    request_time: f64,
}

/// A signed promise from the enclave that a validator must wait `duration`
/// seconds (from `request_time`) before it may claim a wait certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTimer {
    pub validator_address: String,
    pub duration: f64,
    pub previous_certificate_id: String,
    pub local_mean: f64,
    pub request_time: f64,
    #[serde(default)]
    pub signature: String,
}

impl WaitTimer {
    pub fn new(
        validator_address: String,
        duration: f64,
        previous_certificate_id: String,
        local_mean: f64,
        request_time: f64,
    ) -> Self {
        Self {
            validator_address,
            duration,
            previous_certificate_id,
            local_mean,
            request_time,
            signature: String::new(),
        }
    }

    /// Canonical JSON of the signed fields, excluding `signature`.
    pub fn serialize(&self) -> String {
        canon::to_string(&WaitTimerPayload {
            validator_address: self.validator_address.clone(),
            duration: self.duration,
            previous_certificate_id: self.previous_certificate_id.clone(),
            local_mean: self.local_mean,
            request_time: self.request_time,
        })
    }

    /// Reconstruct a timer from a previously-serialized payload and its
    /// signature, without re-deriving or checking the signature.
    pub fn from_serialized(serialized: &str, signature: String) -> Result<Self> {
        let payload: WaitTimerPayload = canon::from_str(serialized)?;
        Ok(Self {
            validator_address: payload.validator_address,
            duration: payload.duration,
            previous_certificate_id: payload.previous_certificate_id,
            local_mean: payload.local_mean,
            request_time: payload.request_time,
            signature,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WaitCertificatePayload {
    validator_address: String,
    duration: f64,
    previous_certificate_id: String,
    local_mean: f64,
    request_time: f64,
    nonce: String,
    block_hash: String,
}

/// A signed authorization for `validator_address` to publish the next
/// block, derived 1:1 from the [`WaitTimer`] it was built over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitCertificate {
    pub validator_address: String,
    pub duration: f64,
    pub previous_certificate_id: String,
    pub local_mean: f64,
    pub request_time: f64,
    pub nonce: String,
    pub block_hash: String,
    #[serde(default)]
    pub signature: String,
}

impl WaitCertificate {
    /// Build a (not yet signed) certificate inheriting a timer's fields.
    pub fn from_wait_timer(timer: &WaitTimer, nonce: String, block_hash: String) -> Self {
        Self {
            validator_address: timer.validator_address.clone(),
            duration: timer.duration,
            previous_certificate_id: timer.previous_certificate_id.clone(),
            local_mean: timer.local_mean,
            request_time: timer.request_time,
            nonce,
            block_hash,
            signature: String::new(),
        }
    }

    /// Canonical JSON of the signed fields, excluding `signature`.
    pub fn serialize(&self) -> String {
        canon::to_string(&WaitCertificatePayload {
            validator_address: self.validator_address.clone(),
            duration: self.duration,
            previous_certificate_id: self.previous_certificate_id.clone(),
            local_mean: self.local_mean,
            request_time: self.request_time,
            nonce: self.nonce.clone(),
            block_hash: self.block_hash.clone(),
        })
    }

    pub fn from_serialized(serialized: &str, signature: String) -> Result<Self> {
        let payload: WaitCertificatePayload = canon::from_str(serialized)?;
        Ok(Self {
            validator_address: payload.validator_address,
            duration: payload.duration,
            previous_certificate_id: payload.previous_certificate_id,
            local_mean: payload.local_mean,
            request_time: payload.request_time,
            nonce: payload.nonce,
            block_hash: payload.block_hash,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_timer_round_trips_through_serialize() {
        let timer = WaitTimer::new(
            "validator-1".to_string(),
            3.5,
            "prev-cert".to_string(),
            2.0,
            100.0,
        );
        let serialized = timer.serialize();
        let restored = WaitTimer::from_serialized(&serialized, "sig".to_string()).unwrap();
        assert_eq!(restored.validator_address, timer.validator_address);
        assert_eq!(restored.duration, timer.duration);
        assert_eq!(restored.signature, "sig");
    }

    #[test]
    fn wait_certificate_inherits_timer_fields() {
        let timer = WaitTimer::new(
            "validator-1".to_string(),
            3.5,
            "prev-cert".to_string(),
            2.0,
            100.0,
        );
        let cert = WaitCertificate::from_wait_timer(
            &timer,
            "nonce-1".to_string(),
            "block-hash-1".to_string(),
        );
        assert_eq!(cert.validator_address, timer.validator_address);
        assert_eq!(cert.duration, timer.duration);
        assert_eq!(cert.previous_certificate_id, timer.previous_certificate_id);
        assert_eq!(cert.local_mean, timer.local_mean);
        assert_eq!(cert.request_time, timer.request_time);
    }

    #[test]
    fn wait_certificate_round_trips_through_serialize() {
        let timer = WaitTimer::new("v1".to_string(), 1.0, "prev".to_string(), 1.0, 0.0);
        let cert = WaitCertificate::from_wait_timer(&timer, "n".to_string(), "b".to_string());
        let serialized = cert.serialize();
        let restored = WaitCertificate::from_serialized(&serialized, "sig".to_string()).unwrap();
        assert_eq!(restored.nonce, cert.nonce);
        assert_eq!(restored.block_hash, cert.block_hash);
    }

    #[test]
    fn signup_info_round_trips_through_serialize() {
        let info = SignupInfo {
            poet_public_key: "pub".to_string(),
            proof_data: "{}".to_string(),
            anti_sybil_id: "asid".to_string(),
            sealed_signup_data: "c2VhbGVk".to_string(),
        };
        let serialized = info.serialize();
        let restored = SignupInfo::from_serialized(&serialized).unwrap();
        assert_eq!(restored, info);
    }
}
