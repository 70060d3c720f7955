use crate::error::TypesError;
use crate::u256::U256;

pub type Target = U256;
pub type Work = U256;

/// `0x0007ffff_ffff_…_ffff` — 256 bits, compile-time ceiling on any retargeted
/// target. Koto's proof-of-work-limit target.
pub const MAX_TARGET: Target = U256::new(
    0x0007_ffff_ffff_ffff_ffff_ffff_ffff_ffff,
    0xffff_ffff_ffff_ffff_ffff_ffff_ffff_ffff,
);

/// Decomposes a compact `bits` word into a target, validating the exponent and
/// mantissa ranges. Fails with [`TypesError::InvalidBits`] outside
/// `0x03 <= exponent <= 0x1f` and `0x8000 <= mantissa <= 0x7fffff`, matching the
/// consensus rule (mantissa must not set its sign bit).
pub fn bits_to_target(bits: u32) -> Result<Target, TypesError> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x00FF_FFFF;

    if !(0x03..=0x1F).contains(&exponent) || !(0x8000..=0x7F_FFFF).contains(&mantissa) {
        return Err(TypesError::InvalidBits {
            bits,
            exponent,
            mantissa,
        });
    }

    Ok(Target::from(mantissa) << (8 * (exponent - 3)))
}

/// Inverse of [`bits_to_target`]; normalizes by shifting one extra byte when the
/// leading mantissa byte would otherwise set the sign bit.
#[must_use]
pub fn target_to_bits(target: &Target) -> u32 {
    target.target_to_bits()
}

/// `floor((2^256 - target - 1) / (target + 1)) + 1`, the chainwork contributed by a
/// single header whose target is `target`.
#[must_use]
pub fn chainwork_of_target(target: &Target) -> Work {
    target.inverse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_to_target_round_trips_within_validity_range() {
        for bits in [0x1d00_ffffu32, 0x1c00_8000, 0x0300_8000, 0x1f00_ffff] {
            let target = bits_to_target(bits).unwrap();
            assert_eq!(target_to_bits(&target), bits);
        }
    }

    #[test]
    fn bits_to_target_rejects_out_of_range_exponent() {
        assert!(bits_to_target(0x0200_ffff).is_err());
        assert!(bits_to_target(0x2000_ffff).is_err());
    }

    #[test]
    fn bits_to_target_rejects_out_of_range_mantissa() {
        assert!(bits_to_target(0x1d00_7fff).is_err());
    }

    #[test]
    fn max_target_round_trips_through_compact_bits() {
        let bits = target_to_bits(&MAX_TARGET);
        assert_eq!(bits_to_target(bits).unwrap(), MAX_TARGET);
    }
}
