use std::num::Wrapping;

/// Deterministic, non-cryptographic string hash used for bucketing.
///
/// Runs `acc = (acc << 5) - acc + unit` over the UTF-16 code units of `input`
/// with a wrapping 32-bit signed accumulator, then takes the absolute value.
/// The width and the UTF-16 walk are fixed so assignments match the ones the
/// mobile client already handed out.
pub fn hash_string(input: &str) -> u32 {
    let acc = input
        .encode_utf16()
        .fold(Wrapping(0i32), |acc, unit| {
            (acc << 5) - acc + Wrapping(i32::from(unit))
        });
    // i32::MIN has no positive i32 counterpart; as u32 it is 2^31.
    acc.0.unsigned_abs()
}

/// Bucket of `input` in `1..=100`.
pub fn percentile(input: &str) -> u8 {
    (hash_string(input) % 100 + 1) as u8
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", 0)]
    #[case("a", 97)]
    #[case("abc", 96354)]
    #[case("user-42", 147182656)]
    #[case("user-1", 836031825)]
    #[case("UI_VARIANT_TEST_abc", 1543875558)]
    fn test_hash_matches_reference_values(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(hash_string(input), expected);
    }

    #[test]
    fn test_hash_is_deterministic() {
        for input in ["", "user-42", "ママ", "a much longer user identifier 1234567890"] {
            assert_eq!(hash_string(input), hash_string(input));
        }
    }

    #[test]
    fn test_hash_walks_utf16_code_units() {
        // U+1F600 is a surrogate pair in UTF-16: 0xD83D 0xDE00
        let expected = (Wrapping(0xD83Di32) * Wrapping(31) + Wrapping(0xDE00i32)).0;
        assert_eq!(hash_string("\u{1F600}"), expected.unsigned_abs());
    }

    #[test]
    fn test_percentile_range() {
        assert_eq!(percentile(""), 1);
        assert_eq!(percentile("user-42"), 57);
        for i in 0..1_000 {
            let p = percentile(&format!("user-{}", i));
            assert!((1..=100).contains(&p));
        }
    }

    #[test]
    fn test_percentiles_spread_across_buckets() {
        let mut below_half = 0;
        for i in 0..10_000 {
            if percentile(&format!("distinct-id-{}", i)) <= 50 {
                below_half += 1;
            }
        }
        // roughly half, with generous slack
        assert!((4_000..=6_000).contains(&below_half), "{}", below_half);
    }
}
