//! Probe payload generation.

use bytes::Bytes;

use crate::error::ConfigError;

/// Largest payload the prober will send, and the size of its read buffer.
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Produces the bytes sent for each probe sequence index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    /// MD5 digest of the little-endian sequence index (16 bytes).
    #[default]
    Derived,
    /// The same user-supplied bytes for every probe.
    Fixed(Bytes),
}

impl Payload {
    /// Build a payload source from an optional hex pattern.
    ///
    /// An empty or absent pattern selects derived payloads.
    pub fn from_pattern(pattern: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = match pattern {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(Payload::Derived),
        };

        let decoded = hex::decode(pattern)?;
        if decoded.len() > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::PatternTooLong(decoded.len()));
        }

        Ok(Payload::Fixed(Bytes::from(decoded)))
    }

    /// Payload for probe `index`. Pure: equal indices yield equal bytes.
    pub fn generate(&self, index: u64) -> Bytes {
        match self {
            Payload::Derived => {
                let digest = md5::compute(index.to_le_bytes());
                Bytes::copy_from_slice(&digest.0)
            }
            Payload::Fixed(bytes) => bytes.clone(),
        }
    }

    /// Whether a fixed pattern is in use.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Payload::Fixed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_derived_is_deterministic() {
        let a = Payload::Derived;
        let b = Payload::Derived;
        for i in [0u64, 1, 42, u64::MAX] {
            assert_eq!(a.generate(i), a.generate(i));
            assert_eq!(a.generate(i), b.generate(i));
            assert_eq!(a.generate(i).len(), 16);
        }
    }

    #[test]
    fn test_derived_known_digest() {
        // md5 of eight zero bytes
        let payload = Payload::Derived.generate(0);
        assert_eq!(hex::encode(&payload), "7dea362b3fac8e00956a4952a3d4f474");
    }

    #[test]
    fn test_derived_varies_by_index() {
        let payload = Payload::Derived;
        let seen: HashSet<Bytes> = (0..1000).map(|i| payload.generate(i)).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_fixed_pattern() {
        let payload = Payload::from_pattern(Some("00ff")).unwrap();
        assert!(payload.is_fixed());
        for i in 0..5 {
            assert_eq!(&payload.generate(i)[..], &[0x00, 0xff]);
        }
    }

    #[test]
    fn test_empty_pattern_is_derived() {
        assert_eq!(Payload::from_pattern(Some("")).unwrap(), Payload::Derived);
        assert_eq!(Payload::from_pattern(None).unwrap(), Payload::Derived);
    }

    #[test]
    fn test_invalid_pattern() {
        match Payload::from_pattern(Some("zz")) {
            Err(ConfigError::InvalidPattern(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }

        // Odd number of digits
        assert!(matches!(
            Payload::from_pattern(Some("abc")),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_pattern_too_long() {
        let pattern = "ab".repeat(MAX_PAYLOAD_SIZE + 1);
        match Payload::from_pattern(Some(pattern.as_str())) {
            Err(ConfigError::PatternTooLong(65)) => {}
            other => panic!("unexpected: {:?}", other),
        }

        let pattern = "ab".repeat(MAX_PAYLOAD_SIZE);
        assert!(Payload::from_pattern(Some(pattern.as_str())).is_ok());
    }
}
