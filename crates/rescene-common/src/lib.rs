//! Rescene-Common: shared codecs and helpers.
//!
//! This crate provides the leaf functionality used by the SRR and SRS
//! reconstruction crates:
//!
//! - **VarInt codec**: EBML variable-length integers ([`vint`])
//! - **Field reader**: bounds-checked little-endian records ([`fields`])
//! - **Checksums**: CRC-32 and a CRC-computing writer ([`checksum`])
//! - **Paths**: source-file lookup and safe output paths ([`paths`])
//! - **SFV**: checksum listing parser ([`sfv`])
//!
//! # Examples
//!
//! ```
//! use rescene_common::{checksum::crc32, vint};
//!
//! assert_eq!(vint::encode(2), vec![0x82]);
//! assert_eq!(crc32(b"123456789"), 0xCBF43926);
//! ```

pub mod checksum;
pub mod error;
pub mod fields;
pub mod paths;
pub mod sfv;
pub mod vint;

pub use error::{Error, Result};
