use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::base::Generation;
use crate::error::Error;
use crate::error::Result;

const WAL_SEGMENT_EXTENSION: &str = ".wal";
static WAL_SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-f]{16})\.wal$").unwrap());

/// Return the base name of `path`. Pure; no I/O.
pub fn path_base(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidPath(format!("invalid path {}", path.display())))
}

/// `<P>-wal`: the primary database's real WAL file.
pub fn wal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("-wal");
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// `<dir(P)>/.<base(P)>-litestream`: the meta root, sibling of `P`.
///
/// The `-litestream` suffix is part of the stable on-disk layout (spec §6)
/// and is kept verbatim even though this crate's own binary is named
/// `litesync` — external tooling and existing replicas key off this exact
/// directory name.
pub fn meta_path(db_path: &Path) -> Result<PathBuf> {
    let base = path_base(db_path)?;
    let dir_name = format!(".{}-litestream", base);
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.join(dir_name)),
        _ => Ok(PathBuf::from(dir_name)),
    }
}

/// `<meta>/generation`: text file naming the current generation.
pub fn generation_name_path(meta_path: &Path) -> PathBuf {
    meta_path.join("generation")
}

/// `<meta>/generations`: parent of every generation's directory.
pub fn generations_dir(meta_path: &Path) -> PathBuf {
    meta_path.join("generations")
}

/// `<meta>/generations/<id>`
pub fn generation_dir(meta_path: &Path, id: &Generation) -> PathBuf {
    generations_dir(meta_path).join(id.as_str())
}

/// `<meta>/generations/<id>/wal`
pub fn shadow_wal_dir(meta_path: &Path, id: &Generation) -> PathBuf {
    generation_dir(meta_path, id).join("wal")
}

/// `<meta>/generations/<id>/wal/<index:016x>.wal`
pub fn shadow_wal_path(meta_path: &Path, id: &Generation, index: u64) -> PathBuf {
    shadow_wal_dir(meta_path, id).join(format_wal_segment_name(index))
}

/// Render a shadow WAL segment's filename: 16 lower-case hex digits + `.wal`.
pub fn format_wal_segment_name(index: u64) -> String {
    format!("{:016x}{}", index, WAL_SEGMENT_EXTENSION)
}

/// Parse a shadow WAL segment's filename back into its index.
pub fn parse_wal_segment_name(name: &str) -> Result<u64> {
    let captures = WAL_SEGMENT_REGEX
        .captures(name)
        .ok_or_else(|| Error::InvalidPath(format!("invalid wal segment name {}", name)))?;
    let hex = captures
        .get(1)
        .ok_or_else(|| Error::InvalidPath(format!("invalid wal segment name {}", name)))?
        .as_str();
    Ok(u64::from_str_radix(hex, 16)?)
}

// --- Remote (replica transport) key layout ---
//
// Object storage has no notion of "sibling of the primary file", so a
// replica transport namespaces every key it writes under the primary
// database's basename instead of the local meta root (spec §9 "dynamic
// dispatch over replicas" - transports are handed a `db_name` and a
// `Position`, not a filesystem path).

static REMOTE_SNAPSHOT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9a-f]{16})\.snapshot\.lz4$").unwrap());
static REMOTE_WAL_SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9a-f]{16})_([0-9a-f]{16})\.wal\.lz4$").unwrap());

/// `<db_name>/generations`: parent of every remote generation's directory.
pub fn remote_generations_dir(db_name: &str) -> String {
    format!("{}/generations", db_name)
}

/// `<db_name>/generations/<id>`
pub fn remote_generation_dir(db_name: &str, generation: &str) -> String {
    format!("{}/{}", remote_generations_dir(db_name), generation)
}

/// `<db_name>/generations/<id>/snapshots`
pub fn snapshots_dir(db_name: &str, generation: &str) -> String {
    format!("{}/snapshots", remote_generation_dir(db_name, generation))
}

/// `<db_name>/generations/<id>/snapshots/<index:016x>.snapshot.lz4`
pub fn snapshot_file(db_name: &str, generation: &str, index: u64) -> String {
    format!(
        "{}/{:016x}.snapshot.lz4",
        snapshots_dir(db_name, generation),
        index
    )
}

/// `<db_name>/generations/<id>/wal`
pub fn walsegments_dir(db_name: &str, generation: &str) -> String {
    format!("{}/wal", remote_generation_dir(db_name, generation))
}

/// `<db_name>/generations/<id>/wal/<index:016x>_<offset:016x>.wal.lz4`
///
/// The offset is embedded so that a partially-uploaded segment (one whose
/// local shadow counterpart kept growing after the last successful upload)
/// never collides with, or is mistaken for, a later upload of the same
/// segment index - each upload of segment `index` through offset `offset`
/// is a distinct, immutable remote object.
pub fn walsegment_file(db_name: &str, generation: &str, index: u64, offset: u64) -> String {
    format!(
        "{}/{:016x}_{:016x}.wal.lz4",
        walsegments_dir(db_name, generation),
        index,
        offset
    )
}

/// Parse a remote snapshot key (or bare filename) back into its index.
pub fn parse_snapshot_path(name: &str) -> Result<u64> {
    let captures = REMOTE_SNAPSHOT_REGEX
        .captures(name)
        .ok_or_else(|| Error::InvalidPath(format!("invalid snapshot path {}", name)))?;
    Ok(u64::from_str_radix(&captures[1], 16)?)
}

/// Parse a remote WAL segment key (or bare filename) back into its
/// `(index, offset)`.
pub fn parse_wal_segment_path(name: &str) -> Result<(u64, u64)> {
    let captures = REMOTE_WAL_SEGMENT_REGEX
        .captures(name)
        .ok_or_else(|| Error::InvalidPath(format!("invalid wal segment path {}", name)))?;
    let index = u64::from_str_radix(&captures[1], 16)?;
    let offset = u64::from_str_radix(&captures[2], 16)?;
    Ok((index, offset))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn absolute_path_derivation() -> Result<()> {
        let db = Path::new("/tmp/db");
        assert_eq!(wal_path(db), Path::new("/tmp/db-wal"));
        assert_eq!(meta_path(db)?, Path::new("/tmp/.db-litestream"));
        assert_eq!(
            generation_name_path(&meta_path(db)?),
            Path::new("/tmp/.db-litestream/generation")
        );

        let id = Generation::try_from_name("0123456789abcdef")?;
        assert_eq!(
            generation_dir(&meta_path(db)?, &id),
            Path::new("/tmp/.db-litestream/generations/0123456789abcdef")
        );
        assert_eq!(
            shadow_wal_dir(&meta_path(db)?, &id),
            Path::new("/tmp/.db-litestream/generations/0123456789abcdef/wal")
        );
        assert_eq!(
            shadow_wal_path(&meta_path(db)?, &id, 1000),
            Path::new("/tmp/.db-litestream/generations/0123456789abcdef/wal/00000000000003e8.wal")
        );
        Ok(())
    }

    #[test]
    fn relative_path_derivation() -> Result<()> {
        let db = Path::new("db");
        assert_eq!(meta_path(db)?, Path::new(".db-litestream"));
        assert_eq!(wal_path(db), Path::new("db-wal"));
        Ok(())
    }

    #[test]
    fn wal_segment_name_round_trips() -> Result<()> {
        let name = format_wal_segment_name(19);
        assert_eq!(parse_wal_segment_name(&name)?, 19);

        let name = format_wal_segment_name(0x3e8);
        assert_eq!(name, "00000000000003e8.wal");
        assert_eq!(parse_wal_segment_name(&name)?, 1000);

        assert!(parse_wal_segment_name("0000019.wal").is_err());
        Ok(())
    }

    #[test]
    fn path_base_rejects_dotdot() {
        assert!(path_base(Path::new("a-b/..")).is_err());
    }

    #[test]
    fn remote_snapshot_key_round_trips() -> Result<()> {
        let key = snapshot_file("app.db", "0123456789abcdef", 3);
        assert_eq!(
            key,
            "app.db/generations/0123456789abcdef/snapshots/0000000000000003.snapshot.lz4"
        );
        assert_eq!(parse_snapshot_path(&key)?, 3);
        Ok(())
    }

    #[test]
    fn remote_wal_segment_key_round_trips() -> Result<()> {
        let key = walsegment_file("app.db", "0123456789abcdef", 2, 4096);
        assert_eq!(
            key,
            "app.db/generations/0123456789abcdef/wal/0000000000000002_0000000000001000.wal.lz4"
        );
        assert_eq!(parse_wal_segment_path(&key)?, (2, 4096));
        Ok(())
    }
}
