//! Boundary and difficulty checks
//!
//! Final hashes and boundaries are compared as 256-bit big-endian unsigned
//! integers, which is the same as comparing their bytes lexicographically.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::hash::Hash256;

/// `final_hash <= boundary`
#[inline(always)]
pub fn check_boundary(final_hash: &Hash256, boundary: &Hash256) -> bool {
    final_hash.data <= boundary.data
}

fn two_pow_256() -> BigUint {
    BigUint::one() << 256u32
}

fn to_hash256(value: &BigUint) -> Hash256 {
    let bytes = value.to_bytes_be();
    let mut out = Hash256::zero();
    out.data[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Boundary for a difficulty: `floor(2^256 / difficulty)`.
///
/// Difficulty 0 and 1 map to the maximum boundary (every hash passes).
pub fn difficulty_to_boundary(difficulty: &Hash256) -> Hash256 {
    let d = BigUint::from_bytes_be(&difficulty.data);
    if d <= BigUint::one() {
        return Hash256::from_bytes([0xFF; 32]);
    }
    to_hash256(&(two_pow_256() / d))
}

/// `final_hash * difficulty <= 2^256`
pub fn check_against_difficulty(final_hash: &Hash256, difficulty: &Hash256) -> bool {
    let h = BigUint::from_bytes_be(&final_hash.data);
    let d = BigUint::from_bytes_be(&difficulty.data);
    if d.is_zero() {
        return true;
    }
    h * d <= two_pow_256()
}

/// Convenience for integer difficulties (pool/stratum share targets)
pub fn difficulty_u64_to_boundary(difficulty: u64) -> Hash256 {
    let mut d = Hash256::zero();
    d.data[24..].copy_from_slice(&difficulty.to_be_bytes());
    difficulty_to_boundary(&d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_u64(v: u64) -> Hash256 {
        let mut h = Hash256::zero();
        h.data[24..].copy_from_slice(&v.to_be_bytes());
        h
    }

    #[test]
    fn test_equal_accepted_one_above_rejected() {
        let boundary = from_u64(0x1_0000);
        assert!(check_boundary(&from_u64(0x1_0000), &boundary));
        assert!(check_boundary(&from_u64(0xFFFF), &boundary));
        assert!(!check_boundary(&from_u64(0x1_0001), &boundary));
    }

    #[test]
    fn test_comparison_is_big_endian() {
        let mut high = Hash256::zero();
        high.data[0] = 1;
        let mut low = Hash256::zero();
        low.data[31] = 0xFF;
        assert!(check_boundary(&low, &high));
        assert!(!check_boundary(&high, &low));
    }

    #[test]
    fn test_difficulty_to_boundary() {
        assert_eq!(difficulty_to_boundary(&Hash256::zero()), Hash256::from_bytes([0xFF; 32]));
        assert_eq!(difficulty_u64_to_boundary(1), Hash256::from_bytes([0xFF; 32]));

        let mut half = Hash256::zero();
        half.data[0] = 0x80;
        assert_eq!(difficulty_u64_to_boundary(2), half);

        // 2^256 / 3 = 0x5555...55
        assert_eq!(difficulty_u64_to_boundary(3), Hash256::from_bytes([0x55; 32]));
    }

    #[test]
    fn test_difficulty_check_agrees_with_boundary() {
        let hashes = [
            Hash256::zero(),
            Hash256::from_bytes([0xFF; 32]),
            Hash256::from_bytes([0x55; 32]),
            Hash256::from_bytes([0x56; 32]),
            from_u64(12345),
            {
                let mut h = Hash256::from_bytes([0xFF; 32]);
                h.data[0] = 0x7F;
                h
            },
        ];
        let difficulties = [0u64, 1, 2, 3, 4, 7, 1000, 0x3ff800000, u64::MAX];
        for d in difficulties {
            let dh = from_u64(d);
            let boundary = difficulty_to_boundary(&dh);
            for h in &hashes {
                assert_eq!(
                    check_against_difficulty(h, &dh),
                    check_boundary(h, &boundary),
                    "difficulty {d} hash {h}"
                );
            }
            // The boundary itself always passes
            assert!(check_against_difficulty(&boundary, &dh));
        }
    }
}
