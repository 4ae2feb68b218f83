//! # Utility Types
//!
//! Bit-level buffer access and checksum helpers shared by every decoder in
//! the crate.
//!
//! ## Bit Cursor
//!
//! ```rust
//! use tsmarker::utils::BitCursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cursor = BitCursor::new();
//! cursor.write_uint(0x47, 8)?;
//! cursor.write_uint(0x1FFF, 13)?;
//!
//! cursor.set_position(8)?;
//! assert_eq!(cursor.read_uint(13)?, 0x1FFF);
//! # Ok(())
//! # }
//! ```
//!
//! ## CRC Calculation
//!
//! ```rust
//! use tsmarker::utils::Crc32Mpeg2;
//!
//! # fn main() {
//! let crc = Crc32Mpeg2::new().calculate(b"Hello, world!");
//! println!("CRC32: {:08x}", crc);
//! # }
//! ```

/// Growable MSB-first bit buffer with a cursor
pub mod bits;

/// CRC32/MPEG-2
pub mod crc;

pub use bits::{BitCursor, Endian};
pub use crc::Crc32Mpeg2;
