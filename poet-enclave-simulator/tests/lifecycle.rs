//! End-to-end exercise of the module-level API: initialize, sign up, verify,
//! draw a wait timer, wait for it to expire, claim a certificate, verify it.
//!
//! A single test function is used deliberately: the module-level functions
//! dispatch to one process-wide enclave, so two tests mutating it
//! concurrently (the default for `cargo test`) would race each other.

use std::thread;
use std::time::Duration;

use poet_enclave_simulator::{
    create_signup_info, create_wait_certificate, create_wait_timer, deserialize_wait_certificate,
    initialize, verify_signup_info, verify_wait_certificate, NULL_BLOCK_ID,
};

#[test]
fn full_signup_timer_certificate_round_trip() {
    initialize(Some("node-lifecycle-test"));

    let originator_public_key_hash = "feedfacecafebeef";
    let signup = create_signup_info("validator-1", originator_public_key_hash, "nonce-1").unwrap();
    verify_signup_info(&signup, originator_public_key_hash).unwrap();

    // Genesis block: no real wait is required, so this exercises the
    // bypassed timing checks without slowing the test suite down.
    let local_mean = 0.01;
    let minimum_wait_time = 0.05;
    let genesis_timer = create_wait_timer("validator-1", NULL_BLOCK_ID, local_mean, minimum_wait_time)
        .unwrap();
    assert!(genesis_timer.duration >= minimum_wait_time);

    let genesis_certificate = create_wait_certificate(&genesis_timer, "block-hash-1").unwrap();
    verify_wait_certificate(&genesis_certificate, &signup.poet_public_key).unwrap();

    let restored = deserialize_wait_certificate(
        &genesis_certificate.serialize(),
        &genesis_certificate.signature,
    )
    .unwrap();
    assert_eq!(restored, genesis_certificate);

    // Non-genesis block: claiming before the timer expires fails; sleeping
    // it out lets the same timer be claimed successfully afterwards.
    let timer = create_wait_timer(
        "validator-1",
        "previous-certificate-id",
        local_mean,
        minimum_wait_time,
    )
    .unwrap();

    assert!(create_wait_certificate(&timer, "block-hash-2").is_err());

    thread::sleep(Duration::from_secs_f64(timer.duration + 0.05));

    let certificate = create_wait_certificate(&timer, "block-hash-2").unwrap();
    verify_wait_certificate(&certificate, &signup.poet_public_key).unwrap();
}
