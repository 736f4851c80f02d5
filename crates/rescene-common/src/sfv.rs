//! SFV (Simple File Verification) listings.
//!
//! One `filename CRC32` pair per line, `;` starts a comment line.

use std::collections::BTreeMap;

/// Parse SFV text into a map of file name to CRC-32.
///
/// Lines without a trailing 8-digit hex checksum are ignored.
pub fn parse_sfv(text: &str) -> BTreeMap<String, u32> {
    let mut entries = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let Some((name, crc)) = line.rsplit_once(char::is_whitespace) else {
            continue;
        };
        if crc.len() != 8 {
            continue;
        }
        if let Ok(crc) = u32::from_str_radix(crc, 16) {
            entries.insert(name.trim().to_string(), crc);
        }
    }

    entries
}

/// Case-insensitive lookup; scene SFVs rarely agree with the archive on case.
pub fn lookup_crc(entries: &BTreeMap<String, u32>, name: &str) -> Option<u32> {
    entries.get(name).copied().or_else(|| {
        entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    })
}
