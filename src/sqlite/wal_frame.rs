use std::io::Read;

use super::checksum;
use super::WAL_FRAME_HEADER_SIZE;
use crate::error::Error;
use crate::error::Result;

/// The parsed fields of a 24-byte WAL frame header. See:
/// <https://www.sqlite.org/fileformat2.html#walformat>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalFrameHeader {
    pub page_number: u32,
    pub db_size_after_commit: u32,
    pub salt1: u32,
    pub salt2: u32,
    pub checksum1: u32,
    pub checksum2: u32,
}

impl WalFrameHeader {
    pub const SIZE: usize = WAL_FRAME_HEADER_SIZE;

    pub fn parse(data: &[u8]) -> Result<WalFrameHeader> {
        if data.len() < Self::SIZE {
            return Err(Error::SqliteWalFrameHeaderError(
                "wal frame header shorter than 24 bytes",
            ));
        }
        Ok(WalFrameHeader {
            page_number: u32::from_be_bytes(data[0..4].try_into()?),
            db_size_after_commit: u32::from_be_bytes(data[4..8].try_into()?),
            salt1: u32::from_be_bytes(data[8..12].try_into()?),
            salt2: u32::from_be_bytes(data[12..16].try_into()?),
            checksum1: u32::from_be_bytes(data[16..20].try_into()?),
            checksum2: u32::from_be_bytes(data[20..24].try_into()?),
        })
    }
}

/// A whole WAL frame: header plus one page of data, kept as the exact
/// bytes they were read as (`raw`) so the Sync Engine can copy them
/// verbatim into the shadow WAL (spec I3: byte fidelity).
#[derive(Clone, Debug)]
pub struct WalFrame {
    pub raw: Vec<u8>,
    pub header: WalFrameHeader,
}

impl WalFrame {
    /// Read one frame's raw bytes and parse its header. Does not validate
    /// the checksum chain or salts - see `verify`.
    pub fn read_from(reader: &mut impl Read, page_size: u32) -> Result<WalFrame> {
        let mut raw = vec![0u8; WalFrameHeader::SIZE + page_size as usize];
        reader.read_exact(&mut raw)?;
        let header = WalFrameHeader::parse(&raw[..WalFrameHeader::SIZE])?;
        Ok(WalFrame { raw, header })
    }

    pub fn page(&self) -> &[u8] {
        &self.raw[WalFrameHeader::SIZE..]
    }

    pub fn raw_len(page_size: u32) -> u64 {
        WalFrameHeader::SIZE as u64 + page_size as u64
    }

    /// Validate this frame against the running checksum chain seeded by
    /// `(prev_s1, prev_s2)` and against the WAL's current salts. Returns
    /// the checksum state to continue the chain with on success.
    ///
    /// Returns `None`, never an error, when the frame is torn or its salts
    /// belong to a different WAL session - per spec §4.4 Step E, a
    /// checksum mismatch is a signal (stop appending / roll generation),
    /// not a failure.
    pub fn verify(
        &self,
        prev_s1: u32,
        prev_s2: u32,
        wal_salt1: u32,
        wal_salt2: u32,
        is_big_endian: bool,
    ) -> Option<(u32, u32)> {
        if self.header.salt1 != wal_salt1 || self.header.salt2 != wal_salt2 {
            return None;
        }

        let (s1, s2) = checksum(&self.raw[0..8], prev_s1, prev_s2, is_big_endian);
        let (s1, s2) = checksum(self.page(), s1, s2, is_big_endian);

        if s1 == self.header.checksum1 && s2 == self.header.checksum2 {
            Some((s1, s2))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_frame(
        is_big_endian: bool,
        page_size: usize,
        salt1: u32,
        salt2: u32,
        prev_s1: u32,
        prev_s2: u32,
        page_byte: u8,
    ) -> Vec<u8> {
        let mut data = vec![0u8; WalFrameHeader::SIZE + page_size];
        data[0..4].copy_from_slice(&7u32.to_be_bytes());
        data[4..8].copy_from_slice(&0u32.to_be_bytes());
        data[8..12].copy_from_slice(&salt1.to_be_bytes());
        data[12..16].copy_from_slice(&salt2.to_be_bytes());
        for b in data[WalFrameHeader::SIZE..].iter_mut() {
            *b = page_byte;
        }
        let (s1, s2) = checksum(&data[0..8], prev_s1, prev_s2, is_big_endian);
        let (s1, s2) = checksum(&data[WalFrameHeader::SIZE..], s1, s2, is_big_endian);
        data[16..20].copy_from_slice(&s1.to_be_bytes());
        data[20..24].copy_from_slice(&s2.to_be_bytes());
        data
    }

    #[test]
    fn reads_and_verifies_a_valid_frame() -> Result<()> {
        let bytes = build_frame(true, 16, 1, 2, 0, 0, 9);
        let mut cursor = Cursor::new(bytes);
        let frame = WalFrame::read_from(&mut cursor, 16)?;

        assert_eq!(frame.header.page_number, 7);
        assert_eq!(frame.page(), &[9u8; 16][..]);
        assert_eq!(
            frame.verify(0, 0, 1, 2, true),
            Some((frame.header.checksum1, frame.header.checksum2))
        );
        Ok(())
    }

    #[test]
    fn salt_mismatch_is_not_verified() -> Result<()> {
        let bytes = build_frame(true, 16, 1, 2, 0, 0, 9);
        let mut cursor = Cursor::new(bytes);
        let frame = WalFrame::read_from(&mut cursor, 16)?;

        assert_eq!(frame.verify(0, 0, 99, 2, true), None);
        Ok(())
    }

    #[test]
    fn corrupted_page_fails_verification() -> Result<()> {
        let mut bytes = build_frame(true, 16, 1, 2, 0, 0, 9);
        *bytes.last_mut().unwrap() ^= 0xff;
        let mut cursor = Cursor::new(bytes);
        let frame = WalFrame::read_from(&mut cursor, 16)?;

        assert_eq!(frame.verify(0, 0, 1, 2, true), None);
        Ok(())
    }

    #[test]
    fn chain_continues_across_frames() -> Result<()> {
        let first = build_frame(true, 16, 1, 2, 0, 0, 1);
        let mut cursor = Cursor::new(first);
        let frame1 = WalFrame::read_from(&mut cursor, 16)?;
        let (s1, s2) = frame1.verify(0, 0, 1, 2, true).unwrap();

        let second = build_frame(true, 16, 1, 2, s1, s2, 2);
        let mut cursor2 = Cursor::new(second);
        let frame2 = WalFrame::read_from(&mut cursor2, 16)?;
        assert!(frame2.verify(s1, s2, 1, 2, true).is_some());
        assert!(frame2.verify(0, 0, 1, 2, true).is_none());
        Ok(())
    }
}
