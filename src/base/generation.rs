use std::fmt::Display;
use std::fmt::Formatter;

use uuid::NoContext;
use uuid::Uuid;
use uuid::timestamp;

use crate::error::Error;
use crate::error::Result;

/// A 16-hex-character generation identifier.
///
/// Generations are created whenever continuity with the previous shadow WAL
/// cannot be proved (§4.4 Step B/C). Internally a UUIDv7 is kept alongside
/// the rendered name: v7 embeds a millisecond timestamp, which gives
/// generations a free, comparable creation order without a separate
/// "created_at" field to keep in sync with the name.
#[derive(Eq, PartialEq, PartialOrd, Ord, Debug, Clone, Default, Hash)]
pub struct Generation {
    uuid: Uuid,
    name: String,
}

impl Generation {
    /// Create a brand-new generation identity.
    pub fn new() -> Self {
        let timestamp = timestamp::Timestamp::now(NoContext);
        Self::from_uuid(Uuid::new_v7(timestamp))
    }

    fn from_uuid(uuid: Uuid) -> Self {
        let simple = uuid.simple().to_string();
        let name = simple[..16].to_string();
        Generation { uuid, name }
    }

    /// Reconstruct a generation identity from its on-disk 16-hex-character
    /// name (the `generation` file's contents). Only the truncated bits
    /// survive a round trip through disk, which is enough to compare and
    /// display recovered generations; it is not the exact original UUID.
    pub fn try_from_name(name: &str) -> Result<Self> {
        if name.len() != 16 || !name.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidConfig(format!(
                "invalid generation name: {}",
                name
            )));
        }
        let mut padded = name.to_string();
        padded.push_str(&"0".repeat(32 - name.len()));
        let uuid = Uuid::parse_str(&format!(
            "{}-{}-{}-{}-{}",
            &padded[0..8],
            &padded[8..12],
            &padded[12..16],
            &padded[16..20],
            &padded[20..32]
        ))?;
        Ok(Generation {
            uuid,
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.uuid.is_nil()
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::Generation;

    #[test]
    fn new_generation_is_16_hex_chars() {
        let g = Generation::new();
        assert_eq!(g.as_str().len(), 16);
        assert!(g.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(!g.is_empty());
    }

    #[test]
    fn empty_generation_is_empty() {
        // Spec §3: "The empty position is ("", 0, 0)" - the sentinel
        // generation name is the empty string, never written to disk.
        let g = Generation::default();
        assert!(g.is_empty());
        assert_eq!(g.as_str(), "");
    }

    #[test]
    fn generations_order_by_creation() {
        let a = Generation::new();
        let b = Generation::new();
        assert!(a <= b);
    }

    #[test]
    fn round_trips_through_name() -> crate::error::Result<()> {
        let g = Generation::new();
        let parsed = Generation::try_from_name(g.as_str())?;
        assert_eq!(parsed.as_str(), g.as_str());
        Ok(())
    }

    #[test]
    fn rejects_malformed_name() {
        assert!(Generation::try_from_name("not-hex-at-all!!").is_err());
        assert!(Generation::try_from_name("abc").is_err());
    }
}
