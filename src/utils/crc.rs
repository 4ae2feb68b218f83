//! CRC32/MPEG-2 as used by PSI sections (ISO/IEC 13818-1 Annex A).
//!
//! Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no reflection, no final xor.

const CRC32_MPEG2: u32 = 0x04C11DB7;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// MPEG-2 CRC32 calculator for PSI section validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    pub fn new() -> Self {
        Self
    }

    /// Checksum of `data`.
    ///
    /// ```
    /// use tsmarker::utils::Crc32Mpeg2;
    ///
    /// assert_eq!(Crc32Mpeg2::new().calculate(&[0x01, 0x01]), 0xD66FB816);
    /// ```
    pub fn calculate(&self, data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ TABLE[index as usize]
        })
    }

    /// True when `section` ends with a big-endian CRC32 matching the bytes before it.
    ///
    /// Running the checksum over a section including its CRC yields zero.
    pub fn verify(&self, section: &[u8]) -> bool {
        section.len() >= 4 && self.calculate(section) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crc32_mpeg2_vector() {
        // Test vector from the STMicroelectronics community forum
        assert_eq!(Crc32Mpeg2::new().calculate(&[0x01, 0x01]), 0xD66FB816);
        assert_eq!(Crc32Mpeg2::new().calculate(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_verify_pat_section() {
        let crc = Crc32Mpeg2::new();
        let mut pat = vec![
            0x00, // Table ID (PAT)
            0xB0, 0x0D, // Syntax indicator, reserved, section length 13
            0x00, 0x01, // Transport stream ID
            0xC1, // Reserved, version 0, current/next 1
            0x00, 0x00, // Section number, last section number
            0x00, 0x01, // Program number 1
            0xE1, 0x00, // Program map PID 0x100
        ];
        let value = crc.calculate(&pat);
        pat.extend_from_slice(&value.to_be_bytes());
        assert!(crc.verify(&pat));

        pat[9] ^= 0x01;
        assert!(!crc.verify(&pat));
        assert!(!crc.verify(&[0x00]));
    }
}
