//! TLS version labels
//!
//! Pure mapping from the wire (major, minor) version byte pair to a
//! canonical label. Unrecognized pairs map to an explicit unknown label;
//! classification never fails.

use serde::Serialize;

/// Canonical protocol version named by a record's version bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersion {
    Ssl30,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Unknown { major: u8, minor: u8 },
}

impl TlsVersion {
    /// Classify a (major, minor) version byte pair.
    pub fn from_bytes(major: u8, minor: u8) -> Self {
        match (major, minor) {
            (3, 0) => TlsVersion::Ssl30,
            (3, 1) => TlsVersion::Tls10,
            (3, 2) => TlsVersion::Tls11,
            (3, 3) => TlsVersion::Tls12,
            (3, 4) => TlsVersion::Tls13,
            (major, minor) => TlsVersion::Unknown { major, minor },
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TlsVersion::Unknown { .. })
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsVersion::Ssl30 => write!(f, "SSL 3.0"),
            TlsVersion::Tls10 => write!(f, "TLS 1.0"),
            TlsVersion::Tls11 => write!(f, "TLS 1.1"),
            TlsVersion::Tls12 => write!(f, "TLS 1.2"),
            TlsVersion::Tls13 => write!(f, "TLS 1.3"),
            TlsVersion::Unknown { major, minor } => write!(f, "unknown ({}.{})", major, minor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_versions() {
        assert_eq!(TlsVersion::from_bytes(3, 0).to_string(), "SSL 3.0");
        assert_eq!(TlsVersion::from_bytes(3, 1).to_string(), "TLS 1.0");
        assert_eq!(TlsVersion::from_bytes(3, 2).to_string(), "TLS 1.1");
        assert_eq!(TlsVersion::from_bytes(3, 3).to_string(), "TLS 1.2");
        assert_eq!(TlsVersion::from_bytes(3, 4).to_string(), "TLS 1.3");
    }

    #[test]
    fn test_unknown_pair_gets_distinct_label() {
        let v = TlsVersion::from_bytes(9, 9);
        assert!(!v.is_known());
        assert_eq!(v.to_string(), "unknown (9.9)");
        assert_ne!(v, TlsVersion::from_bytes(3, 3));
        assert!(!v.to_string().is_empty());
    }
}
