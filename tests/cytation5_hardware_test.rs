//! Hardware integration tests for the Cytation 5
//!
//! These tests require the instrument connected over its USB-serial bridge.
//! Run with: cargo test --test cytation5_hardware_test --features instrument_serial -- --ignored --nocapture
//!
//! The port is taken from `cytation.toml` or `CYTATION_SERIAL__PORT`.
//! An empty plate must be loaded for the read test.

#![cfg(feature = "instrument_serial")]

use cytation_daq::config::Settings;
use cytation_daq::payload::ShakeType;
use cytation_daq::Cytation5;
use std::time::Duration;

fn connect() -> Cytation5 {
    let settings = Settings::load().expect("Failed to load settings");
    Cytation5::connect(settings).expect("Failed to open serial port")
}

#[tokio::test]
#[ignore] // Hardware-only test
async fn test_device_info() {
    let reader = connect();
    let serial = reader.get_serial_number().await.unwrap();
    let firmware = reader.get_firmware_version().await.unwrap();
    let temperature = reader.get_current_temperature().await.unwrap();
    println!("Serial: {serial}, firmware: {firmware}, temperature: {temperature} C");

    assert!(!serial.is_empty());
    assert!((10.0..=50.0).contains(&temperature));
}

#[tokio::test]
#[ignore]
async fn test_absorbance_read() {
    let reader = connect();
    let plate = reader.read_absorbance(600).await.unwrap();
    assert_eq!(plate.rows().len(), 8);
    println!("{}", serde_json::to_string(&plate).unwrap());
}

#[tokio::test]
#[ignore]
async fn test_shake_and_stop() {
    let reader = connect();
    reader.shake(ShakeType::Orbital).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    reader.stop_shaking().await.unwrap();
    assert!(!reader.is_shaking().await);
}
