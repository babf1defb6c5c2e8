//! Base58 integer encoding, ported from the alphabet and algorithm in
//! `examples/original_source/helpers.py` (`int_to_base58`/`base58_to_int`).

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes a non-negative integer as base58 text.
#[must_use]
pub fn int_to_base58(mut value: BigUint) -> String {
    if value.is_zero() {
        return (ALPHABET[0] as char).to_string();
    }
    let base = BigUint::from(58u8);
    let mut digits = Vec::new();
    while !value.is_zero() {
        let remainder = (&value % &base).to_u8().expect("remainder < 58");
        digits.push(ALPHABET[remainder as usize]);
        value /= &base;
    }
    digits.reverse();
    String::from_utf8(digits).expect("alphabet is ASCII")
}

/// Decodes base58 text back to its integer value.
pub fn base58_to_int(text: &str) -> Result<BigUint, Base58Error> {
    let base = BigUint::from(58u8);
    let mut value = BigUint::zero();
    for ch in text.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|&c| c == ch)
            .ok_or(Base58Error::InvalidCharacter(ch as char))?;
        value = value * &base + BigUint::from(digit as u8);
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum Base58Error {
    #[error("character '{0}' is not part of the base58 alphabet")]
    InvalidCharacter(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_integers() {
        for n in [0u64, 1, 57, 58, 12345, u64::MAX] {
            let encoded = int_to_base58(BigUint::from(n));
            let decoded = base58_to_int(&encoded).unwrap();
            assert_eq!(decoded, BigUint::from(n));
        }
    }

    #[test]
    fn zero_encodes_to_first_alphabet_character() {
        assert_eq!(int_to_base58(BigUint::zero()), "1");
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        assert!(base58_to_int("0OIl").is_err());
    }
}
