//! Frame integrity checksum.
//!
//! The link only needs one property from its checksum: appending the
//! little-endian checksum of `data` to `data` and checksumming the result
//! yields zero. The receiver can then validate a frame by checksumming all
//! of it, trailer included, and testing for zero.
//!
//! [`Crc32`] is the reflected IEEE 802.3 CRC (polynomial `0xEDB88320`) with
//! initial value `0xFFFFFFFF` and no final inversion. Skipping the final
//! inversion is what makes the residue zero.
//!
//! # Example
//!
//! ```rust
//! use arqlink::{Checksum, Crc32};
//!
//! let mut frame = heapless::Vec::<u8, 16>::new();
//! frame.extend_from_slice(b"abc").unwrap();
//! let crc = Crc32.checksum(&frame);
//! frame.extend_from_slice(&crc.to_le_bytes()).unwrap();
//!
//! assert_eq!(Crc32.checksum(&frame), 0);
//! ```

/// A 32-bit integrity code with a zero residue over `data ++ le(code)`.
pub trait Checksum {
    /// Computes the code of `data`.
    fn checksum(&self, data: &[u8]) -> u32;
}

/// CRC32 polynomial (IEEE 802.3, reflected).
const CRC32_POLYNOMIAL: u32 = 0xEDB88320;

const CRC32_TABLE: [u32; 256] = generate_crc32_table();

const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLYNOMIAL
            } else {
                crc >> 1
            };
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Zero-residue CRC32, the link's default checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32;

impl Crc32 {
    const INIT: u32 = 0xFFFFFFFF;

    /// Feeds `data` into a running register.
    #[inline]
    fn update(mut state: u32, data: &[u8]) -> u32 {
        for &byte in data {
            let index = ((state ^ byte as u32) & 0xFF) as usize;
            state = (state >> 8) ^ CRC32_TABLE[index];
        }
        state
    }
}

impl Checksum for Crc32 {
    #[inline]
    fn checksum(&self, data: &[u8]) -> u32 {
        Self::update(Self::INIT, data)
    }
}
