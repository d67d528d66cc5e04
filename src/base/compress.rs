use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use lz4::Decoder;
use lz4::EncoderBuilder;

use crate::error::Result;

const COMPRESS_BUFFER_SIZE: usize = 102400;

/// Compress an entire file's contents (used for full-database snapshots).
pub fn compress_file(file_name: &Path) -> Result<Vec<u8>> {
    let mut reader = OpenOptions::new().read(true).open(file_name)?;
    let bytes = reader.metadata()?.len() as usize;
    let mut buffer = Vec::with_capacity(bytes);
    let mut encoder = EncoderBuilder::new().build(&mut buffer)?;

    let mut temp_buffer = vec![0; COMPRESS_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut temp_buffer)?;
        if bytes_read == 0 {
            break;
        }
        encoder.write_all(&temp_buffer[..bytes_read])?;
    }
    let (compressed_data, result) = encoder.finish();
    result?;

    Ok(compressed_data.to_owned())
}

/// Compress an in-memory buffer (used for shadow WAL segments handed to
/// replica transports).
pub fn compress_buffer(data: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(data.len());
    let mut encoder = EncoderBuilder::new().build(&mut buffer)?;
    encoder.write_all(data)?;
    let (compressed_data, result) = encoder.finish();
    result?;

    Ok(compressed_data.to_owned())
}

pub fn decompress_buffer(compressed_data: Vec<u8>) -> Result<Vec<u8>> {
    let compressed_data = compressed_data.as_slice();
    let mut decoder = Decoder::new(compressed_data)?;
    let mut decompressed = Vec::new();
    let mut buffer = vec![0; COMPRESS_BUFFER_SIZE];

    loop {
        let bytes_read = decoder.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_buffer() -> Result<()> {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = compress_buffer(&data)?;
        let decompressed = decompress_buffer(compressed)?;
        assert_eq!(decompressed, data);
        Ok(())
    }
}
