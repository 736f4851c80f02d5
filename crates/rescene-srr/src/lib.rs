//! Rescene-SRR: SRR parsing and RAR volume reconstruction
//!
//! An SRR file keeps the block headers of a RAR 2.x-4.x archive set with the
//! packed file data removed, plus a few small files (NFO, SFV) stored inline.
//! Given the original uncompressed files, the archive volumes can be rebuilt
//! byte for byte.
//!
//! # Modules
//!
//! - `block` - Block header decoding and the typed [`Block`] variants
//! - `reader` - Sequential block reader over an SRR stream
//! - `volume` - Grouping of blocks into volumes ([`SrrFile`])
//! - `rebuild` - Volume reconstruction from source files
//! - `stored` - Extraction of inline stored files
//!
//! # Architecture
//!
//! 1. [`BlockReader`] checks the `69 69 69` magic and yields blocks in file
//!    order, consuming stored-file payloads so the stream stays aligned
//! 2. [`SrrFile::from_blocks`] splits the stream at every `SrrRarFile`
//!    block and orders the volumes `.rar`, `.r00`, `.r01`, ...
//! 3. [`RarRebuilder`] writes each volume's headers verbatim and fills in
//!    packed data from the source files through per-file cursors

pub mod block;
pub mod error;
pub mod reader;
pub mod rebuild;
pub mod stored;
pub mod volume;

pub use block::{Block, BlockHeader, PackedFile};
pub use error::{Error, Result};
pub use reader::BlockReader;
pub use rebuild::{RarRebuilder, RebuildOptions, VolumeOutcome, VolumeStats};
pub use stored::extract_stored_files;
pub use volume::{SrrFile, StoredFile, Volume};
