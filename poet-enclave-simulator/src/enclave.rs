use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use once_cell::sync::Lazy;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use secp256k1::SecretKey;
use serde::Serialize;
use sha2::{Digest, Sha256};

use poet_common::sgx::{SgxBasename, SgxMeasurement, SgxQuote, SgxReportBody, SgxReportData};
use poet_common::{
    canon, signing, EvidencePayload, PoetError, ProofData, Result, SealedSignupData, SignupInfo,
    VerificationReport, WaitCertificate, WaitTimer, NULL_BLOCK_ID, REPORT_PRIVATE_KEY_PEM,
    REPORT_PUBLIC_KEY_PEM, TIMER_TIMEOUT_PERIOD, VALID_BASENAME, VALID_ENCLAVE_MEASUREMENT,
};

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

static REPORT_KEYPAIR: Lazy<(RsaPrivateKey, RsaPublicKey)> = Lazy::new(|| {
    let private_key = RsaPrivateKey::from_pkcs8_pem(REPORT_PRIVATE_KEY_PEM)
        .expect("embedded report private key PEM is well-formed");
    let public_key = RsaPublicKey::from_public_key_pem(REPORT_PUBLIC_KEY_PEM)
        .expect("embedded report public key PEM is well-formed");
    (private_key, public_key)
});

static VALID_BASENAME_BYTES: Lazy<[u8; 32]> = Lazy::new(|| {
    hex::decode(VALID_BASENAME)
        .expect("VALID_BASENAME is valid hex")
        .try_into()
        .expect("VALID_BASENAME is 32 bytes")
});

static VALID_MEASUREMENT_BYTES: Lazy<[u8; 32]> = Lazy::new(|| {
    hex::decode(VALID_ENCLAVE_MEASUREMENT)
        .expect("VALID_ENCLAVE_MEASUREMENT is valid hex")
        .try_into()
        .expect("VALID_ENCLAVE_MEASUREMENT is 32 bytes")
});

fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs_f64()
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Default)]
struct EnclaveState {
    anti_sybil_id: Option<String>,
    poet_public_key: Option<String>,
    poet_private_key: Option<SecretKey>,
    active_wait_timer: Option<WaitTimer>,
}

#[derive(Serialize)]
struct NonceSource {
    wait_timer_signature: String,
    now: String,
}

/// A simulated PoET enclave: owns a seal key generated for its lifetime, the
/// baked-in report key it shares with every other enclave in the network,
/// and the mutable PoET keypair / active wait timer for one validator.
pub struct PoetEnclave {
    seal_private_key: SecretKey,
    state: Mutex<EnclaveState>,
}

impl Default for PoetEnclave {
    fn default() -> Self {
        Self::new()
    }
}

impl PoetEnclave {
    pub fn new() -> Self {
        Self {
            seal_private_key: signing::generate_privkey(),
            state: Mutex::new(EnclaveState::default()),
        }
    }

    /// Sets the anti-Sybil ID for this enclave. Idempotent per instance: a
    /// second call simply replaces the anti-Sybil ID.
    pub fn initialize(&self, node_name: Option<&str>) {
        let source = node_name.map(str::to_string).unwrap_or_else(iso_timestamp);
        let anti_sybil_id = hex::encode(Sha256::digest(source.as_bytes()));
        self.state.lock().unwrap().anti_sybil_id = Some(anti_sybil_id);
        tracing::debug!("enclave initialized");
    }

    pub fn create_signup_info(
        &self,
        originator_public_key_hash: &str,
        nonce: &str,
    ) -> Result<SignupInfo> {
        let mut guard = self.state.lock().unwrap();

        let poet_private_key = signing::generate_privkey();
        let poet_public_key = signing::generate_pubkey(&poet_private_key);
        guard.active_wait_timer = None;

        let sealed = SealedSignupData {
            poet_public_key: poet_public_key.clone(),
            poet_private_key: signing::privkey_to_hex(&poet_private_key),
        };
        let sealed_signup_data = BASE64.encode(canon::to_bytes(&sealed));

        let hash_input = format!(
            "{}{}",
            originator_public_key_hash.to_uppercase(),
            poet_public_key.to_uppercase()
        );
        let report_data = SgxReportData::from_digest(&Sha256::digest(hash_input.as_bytes()));
        let sgx_quote = SgxQuote::new(
            SgxBasename::new(*VALID_BASENAME_BYTES),
            SgxReportBody::new(SgxMeasurement::new(*VALID_MEASUREMENT_BYTES), report_data),
        );

        let pse_manifest = BASE64.encode(originator_public_key_hash.as_bytes());
        let timestamp = iso_timestamp();

        let verification_report = VerificationReport {
            epid_pseudonym: originator_public_key_hash.to_string(),
            id: BASE64.encode(hex::encode(Sha256::digest(timestamp.as_bytes()))),
            isv_enclave_quote_status: "OK".to_string(),
            isv_enclave_quote_body: BASE64.encode(sgx_quote.serialize_to_bytes()),
            pse_manifest_status: "OK".to_string(),
            pse_manifest_hash: BASE64.encode(hex::encode(Sha256::digest(pse_manifest.as_bytes()))),
            nonce: nonce.to_string(),
            timestamp,
        };
        let verification_report_json = canon::to_string(&verification_report);

        let digest = Sha256::digest(verification_report_json.as_bytes());
        let signature = REPORT_KEYPAIR
            .0
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| PoetError::malformed(format!("could not sign verification report: {e}")))?;

        let proof_data = ProofData {
            evidence_payload: EvidencePayload {
                pse_manifest,
            },
            verification_report: verification_report_json,
            signature: BASE64.encode(signature),
        };

        guard.poet_public_key = Some(poet_public_key.clone());
        guard.poet_private_key = Some(poet_private_key);
        drop(guard);

        tracing::debug!(originator_public_key_hash, "created signup info");

        Ok(SignupInfo {
            poet_public_key,
            proof_data: canon::to_string(&proof_data),
            anti_sybil_id: originator_public_key_hash.to_string(),
            sealed_signup_data,
        })
    }

    pub fn deserialize_signup_info(&self, serialized_signup_info: &str) -> Result<SignupInfo> {
        SignupInfo::from_serialized(serialized_signup_info)
    }

    pub fn unseal_signup_data(&self, sealed_signup_data: &str) -> Result<String> {
        let decoded = BASE64.decode(sealed_signup_data)?;
        let json = String::from_utf8(decoded)
            .map_err(|e| PoetError::malformed(format!("sealed signup data is not UTF-8: {e}")))?;
        let sealed: SealedSignupData = canon::from_str(&json)?;
        let poet_private_key = signing::privkey_from_hex(&sealed.poet_private_key)
            .ok_or_else(|| PoetError::malformed("sealed PoET private key is not valid hex"))?;

        let mut guard = self.state.lock().unwrap();
        guard.poet_public_key = Some(sealed.poet_public_key.clone());
        guard.poet_private_key = Some(poet_private_key);
        guard.active_wait_timer = None;

        tracing::debug!("unsealed signup data");
        Ok(sealed.poet_public_key)
    }

    pub fn verify_signup_info(
        &self,
        signup_info: &SignupInfo,
        originator_public_key_hash: &str,
    ) -> Result<()> {
        let proof_data: ProofData = canon::from_str(&signup_info.proof_data)
            .map_err(|_| PoetError::validation("proof data is not valid JSON"))?;

        let signature_bytes = BASE64
            .decode(&proof_data.signature)
            .map_err(|_| PoetError::validation("verification report signature is not valid base64"))?;
        let digest = Sha256::digest(proof_data.verification_report.as_bytes());
        REPORT_KEYPAIR
            .1
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature_bytes)
            .map_err(|_| PoetError::validation("verification report signature is invalid"))?;

        let report: VerificationReport = canon::from_str(&proof_data.verification_report)
            .map_err(|_| PoetError::validation("verification report is not valid JSON"))?;

        if report.epid_pseudonym != signup_info.anti_sybil_id {
            return Err(PoetError::validation(format!(
                "the anti-Sybil ID in the verification report [{}] does not match the one in \
                 the signup information [{}]",
                report.epid_pseudonym, signup_info.anti_sybil_id
            )));
        }

        if report.pse_manifest_status.to_uppercase() != "OK" {
            return Err(PoetError::validation(format!(
                "PSE manifest status is {} (i.e., not OK)",
                report.pse_manifest_status
            )));
        }

        let expected_pse_manifest_hash = BASE64.encode(hex::encode(Sha256::digest(
            proof_data.evidence_payload.pse_manifest.as_bytes(),
        )));
        if report.pse_manifest_hash.to_uppercase() != expected_pse_manifest_hash.to_uppercase() {
            return Err(PoetError::validation(format!(
                "PSE manifest hash {} does not match {}",
                report.pse_manifest_hash, expected_pse_manifest_hash
            )));
        }

        if report.isv_enclave_quote_status.to_uppercase() != "OK" {
            return Err(PoetError::validation(format!(
                "enclave quote status is {} (i.e., not OK)",
                report.isv_enclave_quote_status
            )));
        }

        let quote_bytes = BASE64
            .decode(&report.isv_enclave_quote_body)
            .map_err(|_| PoetError::validation("enclave quote body is not valid base64"))?;
        let quote = SgxQuote::parse_from_bytes(&quote_bytes)
            .map_err(|e| PoetError::validation(format!("enclave quote could not be parsed: {e}")))?;

        let configured_poet_public_key = self
            .state
            .lock()
            .unwrap()
            .poet_public_key
            .clone()
            .ok_or(PoetError::NotInitialized)?;

        let hash_input = format!(
            "{}{}",
            originator_public_key_hash.to_uppercase(),
            configured_poet_public_key.to_uppercase()
        );
        let expected_report_data = SgxReportData::from_digest(&Sha256::digest(hash_input.as_bytes()));

        if quote.report_body.report_data != expected_report_data {
            return Err(PoetError::validation(
                "AVR report data does not match the expected value",
            ));
        }

        if quote.report_body.mr_enclave.0 != *VALID_MEASUREMENT_BYTES {
            return Err(PoetError::validation(
                "AVR enclave measurement does not match the expected value",
            ));
        }

        if quote.basename.0 != *VALID_BASENAME_BYTES {
            return Err(PoetError::validation(
                "AVR enclave basename does not match the expected value",
            ));
        }

        Ok(())
    }

    pub fn create_wait_timer(
        &self,
        validator_address: &str,
        previous_certificate_id: &str,
        local_mean: f64,
        minimum_wait_time: f64,
    ) -> Result<WaitTimer> {
        let mut guard = self.state.lock().unwrap();
        let poet_private_key = guard
            .poet_private_key
            .clone()
            .ok_or(PoetError::NotInitialized)?;

        let tag_signature = signing::sign(previous_certificate_id.as_bytes(), &self.seal_private_key);
        let tag_bytes = BASE64
            .decode(&tag_signature)
            .map_err(|e| PoetError::malformed(format!("seal signature is not valid base64: {e}")))?;
        let last_8: [u8; 8] = tag_bytes[tag_bytes.len() - 8..]
            .try_into()
            .map_err(|_| PoetError::malformed("seal signature is shorter than 8 bytes"))?;
        let tagd = u64::from_le_bytes(last_8) as f64 / (u64::MAX as f64);

        let duration = minimum_wait_time - local_mean * tagd.ln();

        let mut wait_timer = WaitTimer::new(
            validator_address.to_string(),
            duration,
            previous_certificate_id.to_string(),
            local_mean,
            now_unix_seconds(),
        );
        wait_timer.signature = signing::sign(wait_timer.serialize().as_bytes(), &poet_private_key);

        guard.active_wait_timer = Some(wait_timer.clone());
        tracing::debug!(validator_address, duration, "issued wait timer");

        Ok(wait_timer)
    }

    pub fn deserialize_wait_timer(&self, serialized_timer: &str, signature: &str) -> Option<WaitTimer> {
        let poet_public_key = self.state.lock().unwrap().poet_public_key.clone()?;
        if !signing::verify(serialized_timer.as_bytes(), signature, &poet_public_key) {
            return None;
        }
        WaitTimer::from_serialized(serialized_timer, signature.to_string()).ok()
    }

    pub fn create_wait_certificate(
        &self,
        wait_timer: &WaitTimer,
        block_hash: &str,
    ) -> Result<WaitCertificate> {
        let mut guard = self.state.lock().unwrap();
        let poet_private_key = guard
            .poet_private_key
            .clone()
            .ok_or(PoetError::NotInitialized)?;

        let active = guard
            .active_wait_timer
            .clone()
            .ok_or_else(|| PoetError::validation("there is no current enclave active wait timer"))?;

        let expected_signature = signing::sign(wait_timer.serialize().as_bytes(), &poet_private_key);
        if active.signature != expected_signature {
            return Err(PoetError::validation("validator is not using the current wait timer"));
        }

        let is_not_genesis_block = active.previous_certificate_id != NULL_BLOCK_ID;
        let now = now_unix_seconds();
        let expire_time = active.request_time + active.duration;

        if is_not_genesis_block && now < expire_time {
            return Err(PoetError::validation(
                "cannot create wait certificate because timer has not expired",
            ));
        }

        let time_out_time = expire_time + TIMER_TIMEOUT_PERIOD;
        if is_not_genesis_block && now > time_out_time {
            return Err(PoetError::validation(
                "cannot create wait certificate because timer has timed out",
            ));
        }

        let nonce_source = NonceSource {
            wait_timer_signature: active.signature.clone(),
            now: chrono::Utc::now().to_rfc3339(),
        };
        let nonce = hex::encode(Sha256::digest(canon::to_string(&nonce_source).as_bytes()));

        let mut certificate = WaitCertificate::from_wait_timer(&active, nonce, block_hash.to_string());
        certificate.signature = signing::sign(certificate.serialize().as_bytes(), &poet_private_key);

        guard.active_wait_timer = None;
        tracing::debug!(block_hash, "issued wait certificate");

        Ok(certificate)
    }

    pub fn deserialize_wait_certificate(
        &self,
        serialized_certificate: &str,
        signature: &str,
    ) -> Result<WaitCertificate> {
        WaitCertificate::from_serialized(serialized_certificate, signature.to_string())
    }

    pub fn verify_wait_certificate(
        &self,
        certificate: &WaitCertificate,
        poet_public_key: &str,
    ) -> Result<()> {
        if signing::verify(certificate.serialize().as_bytes(), &certificate.signature, poet_public_key) {
            Ok(())
        } else {
            Err(PoetError::validation("wait certificate signature does not match"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_up_enclave(opkh: &str) -> (PoetEnclave, SignupInfo) {
        let enclave = PoetEnclave::new();
        enclave.initialize(Some("node-under-test"));
        let signup = enclave.create_signup_info(opkh, "nonce-1").unwrap();
        (enclave, signup)
    }

    #[test]
    fn signup_round_trips_through_verify() {
        let (enclave, signup) = signed_up_enclave("deadbeef");
        enclave.verify_signup_info(&signup, "deadbeef").unwrap();
    }

    #[test]
    fn verify_signup_info_rejects_a_different_opkh() {
        let (enclave, signup) = signed_up_enclave("deadbeef");
        let err = enclave.verify_signup_info(&signup, "0ff").unwrap_err();
        assert!(matches!(err, PoetError::Validation(_)));
    }

    #[test]
    fn verify_signup_info_rejects_a_tampered_verification_report() {
        let (enclave, signup) = signed_up_enclave("deadbeef");
        let mut proof_data: ProofData = canon::from_str(&signup.proof_data).unwrap();
        proof_data.verification_report.push('x');
        let tampered = SignupInfo {
            proof_data: canon::to_string(&proof_data),
            ..signup
        };
        let err = enclave.verify_signup_info(&tampered, "deadbeef").unwrap_err();
        assert!(matches!(err, PoetError::Validation(_)));
    }

    #[test]
    fn unseal_signup_data_restores_the_poet_keypair() {
        let (enclave, signup) = signed_up_enclave("deadbeef");
        let other = PoetEnclave::new();
        let restored_pubkey = other.unseal_signup_data(&signup.sealed_signup_data).unwrap();
        assert_eq!(restored_pubkey, signup.poet_public_key);
    }

    #[test]
    fn wait_timer_duration_is_deterministic_for_the_same_inputs() {
        let enclave = PoetEnclave::new();
        enclave.create_signup_info("deadbeef", "n").unwrap();
        let t1 = enclave.create_wait_timer("v1", "pcid-xyz", 5.0, 1.0).unwrap();
        let t2 = enclave.create_wait_timer("v1", "pcid-xyz", 5.0, 1.0).unwrap();
        assert_eq!(t1.duration, t2.duration);
        assert!(t1.duration >= 1.0);
    }

    #[test]
    fn create_wait_certificate_rejects_an_unexpired_timer() {
        let enclave = PoetEnclave::new();
        enclave.create_signup_info("deadbeef", "n").unwrap();
        let timer = enclave
            .create_wait_timer("v1", "pcid-xyz", 1000.0, 1000.0)
            .unwrap();
        let err = enclave.create_wait_certificate(&timer, "block-1").unwrap_err();
        assert!(matches!(err, PoetError::Validation(_)));
    }

    #[test]
    fn create_wait_certificate_succeeds_for_the_genesis_block_without_waiting() {
        let enclave = PoetEnclave::new();
        let signup = enclave.create_signup_info("deadbeef", "n").unwrap();
        let timer = enclave
            .create_wait_timer("v1", NULL_BLOCK_ID, 1000.0, 1000.0)
            .unwrap();
        let certificate = enclave.create_wait_certificate(&timer, "block-1").unwrap();
        enclave
            .verify_wait_certificate(&certificate, &signup.poet_public_key)
            .unwrap();
    }

    #[test]
    fn wait_certificate_round_trips_through_deserialize_and_verify() {
        let enclave = PoetEnclave::new();
        let signup = enclave.create_signup_info("deadbeef", "n").unwrap();
        let timer = enclave
            .create_wait_timer("v1", NULL_BLOCK_ID, 0.01, 0.0)
            .unwrap();
        let certificate = enclave.create_wait_certificate(&timer, "block-1").unwrap();

        let restored = enclave
            .deserialize_wait_certificate(&certificate.serialize(), &certificate.signature)
            .unwrap();
        assert_eq!(restored, certificate);
        enclave
            .verify_wait_certificate(&restored, &signup.poet_public_key)
            .unwrap();
    }

    #[test]
    fn create_wait_timer_without_signup_fails_with_not_initialized() {
        let enclave = PoetEnclave::new();
        let err = enclave.create_wait_timer("v1", "pcid", 1.0, 1.0).unwrap_err();
        assert!(matches!(err, PoetError::NotInitialized));
    }
}
