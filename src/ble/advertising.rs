//! Fixed advertising payload
//!
//! The bridge always advertises the same Eddystone-URL frame and puts the
//! device name in the scan response. These are data constants; the stack
//! owns the on-air encoding.

use serde::{Deserialize, Serialize};

/// Complete list of 16-bit service UUIDs.
pub const AD_TYPE_UUID16_ALL: u8 = 0x03;
/// Complete local name.
pub const AD_TYPE_NAME_COMPLETE: u8 = 0x09;
/// Service data with a 16-bit UUID.
pub const AD_TYPE_SVC_DATA16: u8 = 0x16;

/// Eddystone service UUID 0xFEAA, little endian.
const EDDYSTONE_UUID: [u8; 2] = [0xaa, 0xfe];

/// One typed element of an advertisement or scan response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdStructure {
    pub ad_type: u8,
    pub data: Vec<u8>,
}

impl AdStructure {
    pub fn new(ad_type: u8, data: &[u8]) -> Self {
        Self {
            ad_type,
            data: data.to_vec(),
        }
    }
}

/// Advertisement data: Eddystone-URL frame pointing at https://goo.gl/9FomQC.
pub fn eddystone_advertisement() -> Vec<AdStructure> {
    let mut frame = Vec::with_capacity(17);
    frame.extend_from_slice(&EDDYSTONE_UUID);
    frame.push(0x10); // URL frame
    frame.push(0x00); // calibrated tx power at 0m
    frame.push(0x03); // "https://"
    frame.extend_from_slice(b"goo.gl/9FomQC");

    vec![
        AdStructure::new(AD_TYPE_UUID16_ALL, &EDDYSTONE_UUID),
        AdStructure::new(AD_TYPE_SVC_DATA16, &frame),
        AdStructure::new(AD_TYPE_UUID16_ALL, &[0x00, 0xfc]),
    ]
}

/// Scan response carrying the complete device name.
pub fn scan_response(device_name: &str) -> Vec<AdStructure> {
    vec![AdStructure::new(AD_TYPE_NAME_COMPLETE, device_name.as_bytes())]
}

/// Hex dump of a payload for log lines.
pub fn describe(structures: &[AdStructure]) -> String {
    structures
        .iter()
        .map(|s| format!("{:02x}:{}", s.ad_type, hex::encode(&s.data)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eddystone_frame_layout() {
        let ad = eddystone_advertisement();
        assert_eq!(ad.len(), 3);
        assert_eq!(ad[0], AdStructure::new(AD_TYPE_UUID16_ALL, &[0xaa, 0xfe]));

        let frame = &ad[1];
        assert_eq!(frame.ad_type, AD_TYPE_SVC_DATA16);
        assert_eq!(&frame.data[..5], &[0xaa, 0xfe, 0x10, 0x00, 0x03]);
        assert_eq!(&frame.data[5..], b"goo.gl/9FomQC");
    }

    #[test]
    fn test_scan_response_name() {
        let sd = scan_response("Arduino101");
        assert_eq!(sd, vec![AdStructure::new(AD_TYPE_NAME_COMPLETE, b"Arduino101")]);
    }

    #[test]
    fn test_describe_is_hex() {
        let text = describe(&[AdStructure::new(AD_TYPE_UUID16_ALL, &[0xaa, 0xfe])]);
        assert_eq!(text, "03:aafe");
    }
}
