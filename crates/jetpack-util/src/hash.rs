use std::fmt;

/// BLAKE3 digest of a module's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Hash raw bytes.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(blake3::hash(data))
    }

    /// Full hex-encoded digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// First 16 hex digits, enough to tell modules apart in reports.
    #[must_use]
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(16);
        hex
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // Known BLAKE3 hash of "hello world"
        let hash = ContentHash::of(b"hello world");
        assert_eq!(
            hash.to_hex(),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
        assert_eq!(hash.short(), "d74981efa70a0c88");
        assert_eq!(hash.to_string(), hash.to_hex());
    }

    #[test]
    fn test_distinct_sources() {
        assert_ne!(ContentHash::of(b"var a;"), ContentHash::of(b"var b;"));
    }
}
