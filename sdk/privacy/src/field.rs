//! BN254 Scalar Field
//!
//! All ledger values live in the BN254 scalar field Fr:
//!
//! ```text
//! P = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//! ```
//!
//! Arithmetic is delegated to arkworks, whose `Fr` is always kept in
//! canonical form, so every result lies in `[0, P)` and subtraction never
//! produces a negative representation.

use ark_bn254::Fr;
use ark_ff::{BigInteger, Field, PrimeField};
use num_bigint::BigUint;
use num_traits::Num;

use crate::errors::{PrivacyError, Result};

/// An element of the BN254 scalar field
pub type FieldElement = Fr;

/// Decimal representation of the field modulus
pub const MODULUS_DECIMAL: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

pub fn add(a: FieldElement, b: FieldElement) -> FieldElement {
    a + b
}

pub fn sub(a: FieldElement, b: FieldElement) -> FieldElement {
    a - b
}

pub fn mul(a: FieldElement, b: FieldElement) -> FieldElement {
    a * b
}

pub fn neg(a: FieldElement) -> FieldElement {
    -a
}

/// Multiplicative inverse (binary extended Euclid inside arkworks)
///
/// Zero has no inverse; callers hitting this have a bug upstream.
pub fn inverse(a: FieldElement) -> Result<FieldElement> {
    a.inverse().ok_or(PrivacyError::DivisionByZero)
}

pub fn from_u64(value: u64) -> FieldElement {
    Fr::from(value)
}

pub fn from_u128(value: u128) -> FieldElement {
    Fr::from(value)
}

/// The field modulus P as a big integer
pub fn modulus() -> BigUint {
    BigUint::from_bytes_le(&Fr::MODULUS.to_bytes_le())
}

/// Integer view of a field element, used for range comparisons
pub fn to_biguint(value: FieldElement) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

/// Convert an integer into the field, rejecting anything `>= P`
pub fn from_biguint(value: &BigUint) -> Result<FieldElement> {
    if value >= &modulus() {
        return Err(PrivacyError::InvalidFieldElement(format!(
            "{} is not below the field modulus",
            value
        )));
    }
    Ok(Fr::from_le_bytes_mod_order(&value.to_bytes_le()))
}

/// Parse a canonical decimal or `0x`-prefixed hexadecimal string
pub fn parse(input: &str) -> Result<FieldElement> {
    let trimmed = input.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) => BigUint::from_str_radix(digits, 16),
        None => BigUint::from_str_radix(trimmed, 10),
    };

    let value = parsed.map_err(|e| {
        PrivacyError::InvalidFieldElement(format!("{:?}: {}", trimmed, e))
    })?;
    from_biguint(&value)
}

/// Canonical decimal string
pub fn to_decimal(value: FieldElement) -> String {
    to_biguint(value).to_str_radix(10)
}

/// `0x` followed by 64 big-endian hex digits
pub fn to_hex(value: FieldElement) -> String {
    format!("0x{}", hex::encode(value.into_bigint().to_bytes_be()))
}

/// Serde adapter: field elements as decimal strings (hex accepted on input)
pub mod serde_field {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FieldElement;

    pub fn serialize<S: Serializer>(
        value: &FieldElement,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_decimal(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<FieldElement, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional field elements
pub mod serde_field_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FieldElement;

    pub fn serialize<S: Serializer>(
        value: &Option<FieldElement>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&super::to_decimal(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<FieldElement>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for sequences of field elements
pub mod serde_field_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FieldElement;

    pub fn serialize<S: Serializer>(
        values: &[FieldElement],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&super::to_decimal(*value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<FieldElement>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::parse(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{AdditiveGroup, Field};
    use ark_std::UniformRand;

    #[test]
    fn test_field_closure() {
        let mut rng = ark_std::test_rng();
        let p = modulus();

        for _ in 0..100 {
            let a = Fr::rand(&mut rng);
            let b = Fr::rand(&mut rng);

            assert!(to_biguint(add(a, b)) < p);
            assert!(to_biguint(sub(a, b)) < p);
            assert!(to_biguint(mul(a, b)) < p);
            assert!(to_biguint(neg(a)) < p);
        }
    }

    #[test]
    fn test_sub_wraps_to_canonical() {
        let result = sub(Fr::ZERO, Fr::ONE);
        assert_eq!(to_biguint(result), modulus() - 1u32);
        assert_eq!(add(result, Fr::ONE), Fr::ZERO);
    }

    #[test]
    fn test_inverse_correctness() {
        let mut rng = ark_std::test_rng();

        for _ in 0..50 {
            let a = Fr::rand(&mut rng);
            if a == Fr::ZERO {
                continue;
            }
            let inv = inverse(a).unwrap();
            assert_eq!(mul(a, inv), Fr::ONE);
        }

        assert_eq!(inverse(from_u64(2)).unwrap() * from_u64(2), Fr::ONE);
    }

    #[test]
    fn test_inverse_of_zero_rejected() {
        assert_eq!(inverse(Fr::ZERO), Err(PrivacyError::DivisionByZero));
    }

    #[test]
    fn test_parse_decimal_and_hex_agree() {
        let dec = parse("1311768467294899695").unwrap();
        let hex = parse("0x1234567890abcdef").unwrap();
        assert_eq!(dec, hex);
        assert_eq!(dec, from_u64(0x1234567890abcdef));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            parse(MODULUS_DECIMAL),
            Err(PrivacyError::InvalidFieldElement(_))
        ));
        assert!(parse("not-a-number").is_err());
        assert!(parse("0x").is_err());
        assert!(parse("-5").is_err());

        let max = modulus() - 1u32;
        assert_eq!(parse(&max.to_str_radix(10)).unwrap(), -Fr::ONE);
    }

    #[test]
    fn test_formatting() {
        let value = from_u64(255);
        assert_eq!(to_decimal(value), "255");
        assert_eq!(
            to_hex(value),
            "0x00000000000000000000000000000000000000000000000000000000000000ff"
        );
        assert_eq!(parse(&to_hex(value)).unwrap(), value);
        assert_eq!(to_decimal(Fr::ONE.double()), "2");
    }

    #[test]
    fn test_serde_as_decimal_strings() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "serde_field")]
            single: FieldElement,
            #[serde(with = "serde_field_vec")]
            many: Vec<FieldElement>,
            #[serde(with = "serde_field_opt")]
            maybe: Option<FieldElement>,
        }

        let wrapper = Wrapper {
            single: from_u64(42),
            many: vec![from_u64(1), from_u64(2)],
            maybe: None,
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert_eq!(json, r#"{"single":"42","many":["1","2"],"maybe":null}"#);

        let back: Wrapper =
            serde_json::from_str(r#"{"single":"0x2a","many":["1","0x02"],"maybe":"7"}"#).unwrap();
        assert_eq!(back.single, from_u64(42));
        assert_eq!(back.many, vec![from_u64(1), from_u64(2)]);
        assert_eq!(back.maybe, Some(from_u64(7)));
    }
}
