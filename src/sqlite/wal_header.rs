use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::base::is_power_of_two;
use crate::error::Error;
use crate::error::Result;
use crate::sqlite::checksum;
use crate::sqlite::WAL_HEADER_BIG_ENDIAN_MAGIC;
use crate::sqlite::WAL_HEADER_LITTLE_ENDIAN_MAGIC;
use crate::sqlite::WAL_HEADER_SIZE;

/// A parsed SQLite WAL header. `raw` is kept so the shadow store can copy
/// it byte-for-byte into a fresh segment (spec I2: "its salts match the
/// real WAL's salts at the time the segment was created").
///
/// See: <https://www.sqlite.org/fileformat2.html#walformat>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalHeader {
    pub raw: [u8; WAL_HEADER_SIZE],
    pub page_size: u32,
    pub salt1: u32,
    pub salt2: u32,
    pub checksum1: u32,
    pub checksum2: u32,
    pub is_big_endian: bool,
}

impl WalHeader {
    pub fn parse(data: &[u8]) -> Result<WalHeader> {
        if data.len() < WAL_HEADER_SIZE {
            return Err(Error::SqliteInvalidWalHeaderError(
                "wal header shorter than 32 bytes".into(),
            ));
        }

        let magic: &[u8] = &data[0..4];
        let is_big_endian = if magic == WAL_HEADER_BIG_ENDIAN_MAGIC {
            true
        } else if magic == WAL_HEADER_LITTLE_ENDIAN_MAGIC {
            false
        } else {
            return Err(Error::SqliteInvalidWalHeaderError(
                "unknown wal header magic".into(),
            ));
        };

        let page_size = u32::from_be_bytes(data[8..12].try_into()?);
        if !is_power_of_two(page_size) || page_size < 1024 {
            return Err(Error::SqliteInvalidWalHeaderError(format!(
                "invalid wal page size {}",
                page_size
            )));
        }

        let salt1 = u32::from_be_bytes(data[16..20].try_into()?);
        let salt2 = u32::from_be_bytes(data[20..24].try_into()?);
        let checksum1 = u32::from_be_bytes(data[24..28].try_into()?);
        let checksum2 = u32::from_be_bytes(data[28..32].try_into()?);

        let (s1, s2) = checksum(&data[0..24], 0, 0, is_big_endian);
        if checksum1 != s1 || checksum2 != s2 {
            return Err(Error::SqliteInvalidWalHeaderError(
                "wal header checksum mismatch".into(),
            ));
        }

        let mut raw = [0u8; WAL_HEADER_SIZE];
        raw.copy_from_slice(&data[0..WAL_HEADER_SIZE]);

        Ok(WalHeader {
            raw,
            page_size,
            salt1,
            salt2,
            checksum1,
            checksum2,
            is_big_endian,
        })
    }

    pub fn read_from(reader: &mut impl Read) -> Result<WalHeader> {
        let mut data = [0u8; WAL_HEADER_SIZE];
        reader.read_exact(&mut data)?;
        Self::parse(&data)
    }

    pub fn read(path: &Path) -> Result<WalHeader> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Same salts as another header - i.e. the two headers describe the
    /// same WAL session (spec §4.4 Step C).
    pub fn same_session_as(&self, other: &WalHeader) -> bool {
        self.salt1 == other.salt1 && self.salt2 == other.salt2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(is_big_endian: bool, page_size: u32, salt1: u32, salt2: u32) -> Vec<u8> {
        let mut data = vec![0u8; WAL_HEADER_SIZE];
        let magic = if is_big_endian {
            WAL_HEADER_BIG_ENDIAN_MAGIC
        } else {
            WAL_HEADER_LITTLE_ENDIAN_MAGIC
        };
        data[0..4].copy_from_slice(&magic);
        data[4..8].copy_from_slice(&3_007_000u32.to_be_bytes());
        data[8..12].copy_from_slice(&page_size.to_be_bytes());
        data[12..16].copy_from_slice(&0u32.to_be_bytes());
        data[16..20].copy_from_slice(&salt1.to_be_bytes());
        data[20..24].copy_from_slice(&salt2.to_be_bytes());
        let (s1, s2) = checksum(&data[0..24], 0, 0, is_big_endian);
        data[24..28].copy_from_slice(&s1.to_be_bytes());
        data[28..32].copy_from_slice(&s2.to_be_bytes());
        data
    }

    #[test]
    fn parses_a_valid_header() -> Result<()> {
        let data = build_header(true, 4096, 11, 22);
        let header = WalHeader::parse(&data)?;
        assert_eq!(header.page_size, 4096);
        assert_eq!(header.salt1, 11);
        assert_eq!(header.salt2, 22);
        assert!(header.is_big_endian);
        Ok(())
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = build_header(true, 4096, 1, 2);
        data[0] = 0;
        assert!(WalHeader::parse(&data).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_page_size() {
        let data = build_header(true, 4097, 1, 2);
        assert!(WalHeader::parse(&data).is_err());
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let mut data = build_header(true, 4096, 1, 2);
        data[24] ^= 0xff;
        assert!(WalHeader::parse(&data).is_err());
    }

    #[test]
    fn same_session_compares_salts() -> Result<()> {
        let a = WalHeader::parse(&build_header(true, 4096, 5, 6))?;
        let b = WalHeader::parse(&build_header(true, 4096, 5, 6))?;
        let c = WalHeader::parse(&build_header(true, 4096, 5, 7))?;
        assert!(a.same_session_as(&b));
        assert!(!a.same_session_as(&c));
        Ok(())
    }
}
