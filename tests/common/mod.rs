//! Simulated Cytation 5 for integration tests.

#![allow(dead_code)]

use cytation_daq::adapters::{MockChannel, MockHandle};
use cytation_daq::config::Settings;
use cytation_daq::transport::TRIGGER_ACK;
use cytation_daq::Cytation5;

/// Plate body as sent after a read trigger: 8 rows of `row,column,value` groups.
pub fn plate_body(rows: usize, columns: usize) -> Vec<u8> {
    let lines: Vec<String> = (1..=rows)
        .map(|r| {
            (1..=columns)
                .map(|c| format!("{r:02},{c:02},{:.3}", r as f64 + c as f64 / 100.0))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    let mut body = b"\x06P,01,96,\r\n".to_vec();
    body.extend_from_slice(lines.join("\r\n,").as_bytes());
    body.extend_from_slice(b"\r\n\x03");
    body
}

/// Answer each write the way the instrument does.
///
/// Single-byte writes are command codes, longer writes are parameters. The read
/// trigger `O` is acknowledged and immediately followed by `plate`.
pub fn instrument(plate: Vec<u8>) -> impl FnMut(&[u8]) -> Vec<u8> + Send + 'static {
    move |written: &[u8]| match written {
        b"C" => b"\x0622120904 00 \x03".to_vec(),
        b"e" => b"\x061320200 Version 2.07 0000 9999\x03".to_vec(),
        b"h" => b"\x062500000\x03".to_vec(),
        b"J" | b"A" => TRIGGER_ACK.to_vec(),
        b"O" => [TRIGGER_ACK, plate.as_slice()].concat(),
        b"x" => Vec::new(),
        [_] => b"\x06".to_vec(),
        _ => b"\x03".to_vec(),
    }
}

pub fn reader_with_plate(plate: Vec<u8>) -> (Cytation5, MockHandle) {
    let (channel, handle) = MockChannel::with_responder(instrument(plate));
    (Cytation5::new(channel, Settings::default()), handle)
}

pub fn reader() -> (Cytation5, MockHandle) {
    reader_with_plate(plate_body(8, 12))
}

/// Parameter writes (everything longer than a command code), in order.
pub fn parameters(handle: &MockHandle) -> Vec<String> {
    handle
        .writes()
        .into_iter()
        .filter(|w| w.len() > 1)
        .map(|w| String::from_utf8_lossy(&w).into_owned())
        .collect()
}
