use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Error;
use crate::error::Result;

/// Read the page size out of the primary database file's 100-byte header
/// (bytes 16-17, big-endian u16). SQLite stores the special value `1` to
/// mean 65536, since a u16 can't hold that directly.
///
/// See: <https://www.sqlite.org/fileformat2.html#the_database_header>
pub fn read_db_page_size(path: &Path) -> Result<u32> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18];
    file.read_exact(&mut header)?;

    if &header[0..16] != b"SQLite format 3\0" {
        return Err(Error::SqliteInvalidWalHeaderError(
            "not a SQLite database file".into(),
        ));
    }

    let raw = u16::from_be_bytes(header[16..18].try_into()?);
    let page_size = if raw == 1 { 65536 } else { raw as u32 };

    if !crate::base::is_power_of_two(page_size) || page_size < 512 {
        return Err(Error::SqliteInvalidWalHeaderError(format!(
            "invalid database page size {}",
            page_size
        )));
    }

    Ok(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_db_header(page_size_field: u16) -> Vec<u8> {
        let mut data = vec![0u8; 100];
        data[0..16].copy_from_slice(b"SQLite format 3\0");
        data[16..18].copy_from_slice(&page_size_field.to_be_bytes());
        data
    }

    #[test]
    fn reads_a_normal_page_size() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut f = File::create(&path)?;
        f.write_all(&build_db_header(4096))?;

        assert_eq!(read_db_page_size(&path)?, 4096);
        Ok(())
    }

    #[test]
    fn maps_one_to_65536() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut f = File::create(&path)?;
        f.write_all(&build_db_header(1))?;

        assert_eq!(read_db_page_size(&path)?, 65536);
        Ok(())
    }

    #[test]
    fn rejects_bad_magic() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut f = File::create(&path)?;
        let mut data = build_db_header(4096);
        data[0] = b'X';
        f.write_all(&data)?;

        assert!(read_db_page_size(&path).is_err());
        Ok(())
    }
}
