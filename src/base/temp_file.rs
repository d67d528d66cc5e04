use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Result;

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file,
/// `fsync` it, then rename over the destination. A crash between these two
/// steps leaves either the old contents or the new contents, never a
/// truncated or partially-written file — this is the mechanism behind I4
/// ("the `generation` file names a directory that exists") and, more
/// generally, behind never leaving the shadow store in a state that
/// violates I1-I5.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = tmp_path_for(path);
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces_atomically() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generation");

        atomic_write(&path, b"aaaaaaaaaaaaaaaa")?;
        assert_eq!(fs::read_to_string(&path)?, "aaaaaaaaaaaaaaaa");
        assert!(!tmp_path_for(&path).exists());

        atomic_write(&path, b"bbbbbbbbbbbbbbbb")?;
        assert_eq!(fs::read_to_string(&path)?, "bbbbbbbbbbbbbbbb");
        assert!(!tmp_path_for(&path).exists());

        Ok(())
    }
}
