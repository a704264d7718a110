//! A software simulation of a Proof-of-Elapsed-Time (PoET) trusted enclave.
//!
//! [`PoetEnclave`] holds the keys and active wait timer for a single
//! simulated validator. It produces and checks the same externally visible
//! artifacts a real SGX enclave would — signup attestation, wait timers,
//! wait certificates — without requiring any actual hardware.

mod enclave;

use std::sync::OnceLock;

pub use enclave::PoetEnclave;
pub use poet_common::{PoetError, Result};
pub use poet_common::{ProofData, SignupInfo, WaitCertificate, WaitTimer};

/// The block ID used in place of a previous block when none exists yet.
pub use poet_common::NULL_BLOCK_ID;

static ENCLAVE: OnceLock<PoetEnclave> = OnceLock::new();

fn enclave() -> &'static PoetEnclave {
    ENCLAVE.get_or_init(PoetEnclave::new)
}

/// Initialize the process-wide enclave instance. `node_name` seeds the
/// anti-Sybil ID; absent a name, the current timestamp is used instead.
pub fn initialize(node_name: Option<&str>) {
    enclave().initialize(node_name)
}

pub fn create_signup_info(
    validator_address: &str,
    originator_public_key_hash: &str,
    nonce: &str,
) -> Result<SignupInfo> {
    let _ = validator_address;
    enclave().create_signup_info(originator_public_key_hash, nonce)
}

pub fn deserialize_signup_info(serialized_signup_info: &str) -> Result<SignupInfo> {
    enclave().deserialize_signup_info(serialized_signup_info)
}

pub fn unseal_signup_data(validator_address: &str, sealed_signup_data: &str) -> Result<String> {
    let _ = validator_address;
    enclave().unseal_signup_data(sealed_signup_data)
}

pub fn verify_signup_info(signup_info: &SignupInfo, originator_public_key_hash: &str) -> Result<()> {
    enclave().verify_signup_info(signup_info, originator_public_key_hash)
}

pub fn create_wait_timer(
    validator_address: &str,
    previous_certificate_id: &str,
    local_mean: f64,
    minimum_wait_time: f64,
) -> Result<WaitTimer> {
    enclave().create_wait_timer(
        validator_address,
        previous_certificate_id,
        local_mean,
        minimum_wait_time,
    )
}

pub fn deserialize_wait_timer(serialized_timer: &str, signature: &str) -> Option<WaitTimer> {
    enclave().deserialize_wait_timer(serialized_timer, signature)
}

pub fn create_wait_certificate(wait_timer: &WaitTimer, block_hash: &str) -> Result<WaitCertificate> {
    enclave().create_wait_certificate(wait_timer, block_hash)
}

pub fn deserialize_wait_certificate(
    serialized_certificate: &str,
    signature: &str,
) -> Result<WaitCertificate> {
    enclave().deserialize_wait_certificate(serialized_certificate, signature)
}

pub fn verify_wait_certificate(certificate: &WaitCertificate, poet_public_key: &str) -> Result<()> {
    enclave().verify_wait_certificate(certificate, poet_public_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_level_functions_wrap_one_process_wide_enclave() {
        initialize(Some("node-module-level"));
        let signup = create_signup_info("v1", "deadbeef", "nonce-1").unwrap();
        verify_signup_info(&signup, "deadbeef").unwrap();
    }
}
