use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::IdentError;

/// Base-62 digit alphabet, in digit-value order.
pub const B62_DIGITS: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of digits in the fixed-width text form.
pub const NB_DIGITS: usize = 11;

/// The text radix.
pub const BASE: u64 = 62;

/// Smallest legal non-null serial.
pub const MIN_SERIAL: u64 = 62 * 62;

/// One past the largest legal serial (10 * 62^10, below 2^63).
pub const MAX_SERIAL: u64 = 10 * 62u64.pow(10);

/// Width of the legal serial band.
pub const DELTA_SERIAL: u64 = MAX_SERIAL - MIN_SERIAL;

/// Number of contiguous equal-width buckets partitioning the band.
pub const MAX_BUCKET: u32 = 10 * 62;

/// Width of one bucket.
pub const BUCKET_WIDTH: u64 = DELTA_SERIAL / MAX_BUCKET as u64;

/// A 63-bit serial number.
///
/// A serial is either the reserved null value 0 or a value inside
/// `[MIN_SERIAL, MAX_SERIAL)`. The band is partitioned into [`MAX_BUCKET`]
/// contiguous buckets; the bucket number of a serial is derivable by pure
/// division, which the object registry relies on for shard selection.
///
/// The text form is `_` followed by exactly [`NB_DIGITS`] base-62 digits
/// (the null serial prints as a bare `_`). The encoding is bijective:
/// fixed width with leading zero digits emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Serial63(u64);

impl Serial63 {
    /// The null serial.
    pub const NULL: Serial63 = Serial63(0);

    /// Range-checked construction. Zero (the null sentinel) is accepted.
    pub fn new(n: u64) -> Result<Self, IdentError> {
        if n == 0 || (MIN_SERIAL..MAX_SERIAL).contains(&n) {
            Ok(Serial63(n))
        } else {
            Err(IdentError::OutOfRange(n))
        }
    }

    /// Trusted construction, skipping the range check.
    ///
    /// Only for values already known valid (e.g. reserved constants or
    /// values coming straight out of the generator).
    pub const fn new_unchecked(n: u64) -> Self {
        Serial63(n)
    }

    /// The raw serial value.
    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Bucket number, in `0..MAX_BUCKET` for a valid serial.
    ///
    /// The band width is not an exact multiple of [`BUCKET_WIDTH`]; the
    /// last bucket absorbs the division slack at the top of the band, so
    /// every valid serial maps to a bucket below [`MAX_BUCKET`].
    pub const fn bucket(self) -> u32 {
        let b = (self.0 / BUCKET_WIDTH) as u32;
        if b >= MAX_BUCKET {
            MAX_BUCKET - 1
        } else {
            b
        }
    }

    /// Offset of this serial within its bucket.
    pub const fn bucket_offset(self) -> u64 {
        self.0 - (self.bucket() as u64) * BUCKET_WIDTH
    }

    /// Draw a uniformly random serial strictly inside the legal band.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let r = rng.gen::<u64>() & ((1u64 << 63) - 1);
            if r > MIN_SERIAL && r < MAX_SERIAL {
                return Serial63(r);
            }
        }
    }

    /// Draw a random serial whose bucket number is exactly `bucket`.
    pub fn random_of_bucket(bucket: u32) -> Result<Self, IdentError> {
        if bucket >= MAX_BUCKET {
            return Err(IdentError::BadBucket(bucket));
        }
        let mut rng = rand::thread_rng();
        // Keep the offset clear of the low MIN_SERIAL slack so the
        // resulting serial never spills into the next bucket.
        let ds = rng.gen_range(0..BUCKET_WIDTH - MIN_SERIAL);
        let s = bucket as u64 * BUCKET_WIDTH + ds + MIN_SERIAL;
        debug_assert!(s >= MIN_SERIAL && s < MAX_SERIAL);
        Ok(Serial63(s))
    }

    /// Parse a serial from the head of `s`, returning the rest of the input.
    ///
    /// The grammar is exact: `_` followed by [`NB_DIGITS`] base-62 digits.
    pub fn parse_prefix(s: &str) -> Result<(Self, &str), IdentError> {
        let bytes = s.as_bytes();
        if bytes.first() != Some(&b'_') {
            return Err(IdentError::BadFormat {
                text: s.chars().take(NB_DIGITS + 1).collect(),
                reason: "missing leading underscore",
            });
        }
        if bytes.len() < NB_DIGITS + 1 {
            return Err(IdentError::BadFormat {
                text: s.to_string(),
                reason: "too short",
            });
        }
        let mut n: u64 = 0;
        for &b in &bytes[1..=NB_DIGITS] {
            let d = digit_value(b).ok_or(IdentError::BadFormat {
                text: s[..NB_DIGITS + 1].to_string(),
                reason: "invalid base-62 digit",
            })?;
            n = n * BASE + d;
        }
        let serial = Serial63::new(n)?;
        Ok((serial, &s[NB_DIGITS + 1..]))
    }
}

fn digit_value(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'a'..=b'z' => Some((b - b'a') as u64 + 10),
        b'A'..=b'Z' => Some((b - b'A') as u64 + 36),
        _ => None,
    }
}

impl fmt::Display for Serial63 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "_");
        }
        let mut buf = [b'0'; NB_DIGITS];
        let mut n = self.0;
        for slot in buf.iter_mut().rev() {
            *slot = B62_DIGITS[(n % BASE) as usize];
            n /= BASE;
        }
        write!(f, "_{}", std::str::from_utf8(&buf).expect("ascii digits"))
    }
}

impl FromStr for Serial63 {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, IdentError> {
        let (serial, rest) = Serial63::parse_prefix(s)?;
        if !rest.is_empty() {
            return Err(IdentError::BadFormat {
                text: s.to_string(),
                reason: "trailing characters",
            });
        }
        Ok(serial)
    }
}

impl TryFrom<u64> for Serial63 {
    type Error = IdentError;

    fn try_from(n: u64) -> Result<Self, IdentError> {
        Serial63::new(n)
    }
}

impl From<Serial63> for u64 {
    fn from(s: Serial63) -> u64 {
        s.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_encoding() {
        let s = Serial63::new(2_734_358_116_516_558_954).unwrap();
        assert_eq!(s.to_string(), "_3fZo81e6aIa");
    }

    #[test]
    fn known_decoding() {
        let s: Serial63 = "_4Fgo2LZq1AS".parse().unwrap();
        assert_eq!(s.value(), 3_915_796_129_876_347_282);
    }

    #[test]
    fn null_prints_as_bare_underscore() {
        assert_eq!(Serial63::NULL.to_string(), "_");
    }

    #[test]
    fn zero_is_accepted_by_new() {
        assert!(Serial63::new(0).unwrap().is_null());
    }

    #[test]
    fn below_band_is_rejected() {
        assert_eq!(Serial63::new(1), Err(IdentError::OutOfRange(1)));
        assert_eq!(
            Serial63::new(MIN_SERIAL - 1),
            Err(IdentError::OutOfRange(MIN_SERIAL - 1))
        );
    }

    #[test]
    fn above_band_is_rejected() {
        assert!(Serial63::new(MAX_SERIAL).is_err());
        assert!(Serial63::new(u64::MAX).is_err());
    }

    #[test]
    fn band_edges_are_accepted() {
        assert!(Serial63::new(MIN_SERIAL).is_ok());
        assert!(Serial63::new(MAX_SERIAL - 1).is_ok());
    }

    #[test]
    fn parse_rejects_bad_text() {
        assert!("".parse::<Serial63>().is_err());
        assert!("3fZo81e6aIa".parse::<Serial63>().is_err()); // no underscore
        assert!("_3fZo81e6aI".parse::<Serial63>().is_err()); // too short
        assert!("_3fZo81e6a!a".parse::<Serial63>().is_err()); // bad digit
        assert!("_3fZo81e6aIax".parse::<Serial63>().is_err()); // trailing
    }

    #[test]
    fn parse_prefix_returns_remainder() {
        let s = Serial63::new(MIN_SERIAL).unwrap();
        let text = format!("{s}rest");
        let (parsed, rest) = Serial63::parse_prefix(&text).unwrap();
        assert_eq!(parsed, s);
        assert_eq!(rest, "rest");
    }

    #[test]
    fn random_is_in_band() {
        for _ in 0..64 {
            let s = Serial63::random();
            assert!(!s.is_null());
            assert!(s.value() > MIN_SERIAL && s.value() < MAX_SERIAL);
        }
    }

    #[test]
    fn top_of_band_lands_in_last_bucket() {
        // MAX_SERIAL - MIN_SERIAL does not divide evenly by MAX_BUCKET;
        // the serials above MAX_BUCKET * BUCKET_WIDTH belong to the last
        // bucket rather than a nonexistent one past it.
        let top = Serial63::new(MAX_SERIAL - 1).unwrap();
        assert_eq!(top.bucket(), MAX_BUCKET - 1);
        assert!(top.bucket_offset() >= BUCKET_WIDTH);

        let edge = Serial63::new(MAX_BUCKET as u64 * BUCKET_WIDTH).unwrap();
        assert_eq!(edge.bucket(), MAX_BUCKET - 1);
    }

    #[test]
    fn random_of_bucket_rejects_big_bucket() {
        assert_eq!(
            Serial63::random_of_bucket(MAX_BUCKET),
            Err(IdentError::BadBucket(MAX_BUCKET))
        );
    }

    #[test]
    fn serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Serial63>("17").is_err());
        let s: Serial63 = serde_json::from_str("3844").unwrap();
        assert_eq!(s.value(), MIN_SERIAL);
    }

    proptest! {
        #[test]
        fn text_roundtrip(n in MIN_SERIAL..MAX_SERIAL) {
            let s = Serial63::new(n).unwrap();
            let back: Serial63 = s.to_string().parse().unwrap();
            prop_assert_eq!(s, back);
        }

        #[test]
        fn bucket_of_random_of_bucket(b in 0u32..MAX_BUCKET) {
            let s = Serial63::random_of_bucket(b).unwrap();
            prop_assert_eq!(s.bucket(), b);
        }

        #[test]
        fn bucket_stays_in_range(n in MIN_SERIAL..MAX_SERIAL) {
            prop_assert!(Serial63::new(n).unwrap().bucket() < MAX_BUCKET);
        }

        #[test]
        fn text_is_fixed_width(n in MIN_SERIAL..MAX_SERIAL) {
            let text = Serial63::new(n).unwrap().to_string();
            prop_assert_eq!(text.len(), NB_DIGITS + 1);
            prop_assert!(text.starts_with('_'));
        }
    }
}
