//! Baby Jubjub Curve Arithmetic
//!
//! Twisted Edwards curve embedded in the BN254 scalar field:
//!
//! ```text
//! a*x^2 + y^2 = 1 + d*x^2*y^2   (mod P),   a = 168700, d = 168696
//! ```
//!
//! Points are plain affine coordinate pairs. The identity `(0, 1)` doubles as
//! the "point at infinity": whenever an addition denominator vanishes the
//! result is the identity instead of an error, and that rule lives only in
//! [`CurvePoint::add`].

use std::sync::LazyLock;

use ark_bn254::Fr;
use ark_ff::{AdditiveGroup, BigInteger, Field, MontFp, PrimeField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{PrivacyError, Result};
use crate::field::{self, FieldElement};
use crate::poseidon2::hash2;

/// Curve coefficient a
pub const COEFF_A: Fr = MontFp!("168700");

/// Curve coefficient d
pub const COEFF_D: Fr = MontFp!("168696");

/// Number of scalar bits walked by double-and-add
pub const SCALAR_BITS: usize = 254;

/// An affine Baby Jubjub point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurvePoint {
    pub x: FieldElement,
    pub y: FieldElement,
}

impl CurvePoint {
    /// Neutral element, also the degenerate-addition sentinel
    pub const IDENTITY: Self = Self {
        x: Fr::ZERO,
        y: Fr::ONE,
    };

    /// Construct a point, rejecting coordinates off the curve
    pub fn new(x: FieldElement, y: FieldElement) -> Result<Self> {
        let point = Self { x, y };
        if point.is_on_curve() {
            Ok(point)
        } else {
            Err(PrivacyError::PointNotOnCurve {
                x: field::to_decimal(x),
                y: field::to_decimal(y),
            })
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_on_curve(&self) -> bool {
        let x2 = self.x.square();
        let y2 = self.y.square();
        COEFF_A * x2 + y2 == Fr::ONE + COEFF_D * x2 * y2
    }

    /// Edwards addition
    ///
    /// ```text
    /// tau = x1*x2*y1*y2
    /// x3  = (x1*y2 + y1*x2) / (1 + d*tau)
    /// y3  = (y1*y2 - a*x1*x2) / (1 - d*tau)
    /// ```
    pub fn add(&self, other: &Self) -> Self {
        let x1x2 = self.x * other.x;
        let y1y2 = self.y * other.y;
        let tau = COEFF_D * x1x2 * y1y2;

        let (Some(inv_x), Some(inv_y)) = ((Fr::ONE + tau).inverse(), (Fr::ONE - tau).inverse())
        else {
            return Self::IDENTITY;
        };

        Self {
            x: (self.x * other.y + self.y * other.x) * inv_x,
            y: (y1y2 - COEFF_A * x1x2) * inv_y,
        }
    }

    pub fn double(&self) -> Self {
        self.add(self)
    }

    pub fn neg(&self) -> Self {
        Self {
            x: -self.x,
            y: self.y,
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Double-and-add over all 254 bits, most significant first
    pub fn scalar_mul(&self, scalar: FieldElement) -> Self {
        if scalar == Fr::ZERO {
            return Self::IDENTITY;
        }

        let bits = scalar.into_bigint();
        let mut acc = Self::IDENTITY;
        for i in (0..SCALAR_BITS).rev() {
            acc = acc.double();
            if bits.get_bit(i) {
                acc = acc.add(self);
            }
        }
        acc
    }
}

impl Default for CurvePoint {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Serialize, Deserialize)]
struct PointRepr {
    #[serde(with = "field::serde_field")]
    x: FieldElement,
    #[serde(with = "field::serde_field")]
    y: FieldElement,
}

impl Serialize for CurvePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        PointRepr {
            x: self.x,
            y: self.y,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = PointRepr::deserialize(deserializer)?;
        Self::new(repr.x, repr.y).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Generators
// ============================================================================

/// G: the standard Baby Jubjub generator (shares base)
pub const GENERATOR_G: CurvePoint = CurvePoint {
    x: MontFp!("995203441582195749578291179787384436505546430278305826713579947235728471134"),
    y: MontFp!("5472060717959818805561601436314318772137091100104008585924551046643952123905"),
};

/// BASE8 = 8*G, the prime-order subgroup base used for note keys
pub const BASE8: CurvePoint = CurvePoint {
    x: MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553"),
    y: MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203"),
};

/// The five Pedersen bases `{G, H, D, K, J}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generators {
    /// shares
    pub g: CurvePoint,
    /// nullifier
    pub h: CurvePoint,
    /// spending key
    pub d: CurvePoint,
    /// unlock time
    pub k: CurvePoint,
    /// nonce commitment
    pub j: CurvePoint,
}

static GENERATORS: LazyLock<Generators> = LazyLock::new(|| Generators {
    g: GENERATOR_G,
    h: hash_to_curve(b"shadevault.H"),
    d: hash_to_curve(b"shadevault.D"),
    k: hash_to_curve(b"shadevault.K"),
    j: hash_to_curve(b"shadevault.J"),
});

/// Process-wide generator set, derived once and never mutated
pub fn generators() -> &'static Generators {
    &GENERATORS
}

/// Try-and-increment hash-to-curve with cofactor clearing
///
/// `y = hash2(tag, counter)`, `x = sqrt((1 - y^2) / (a - d*y^2))`, smaller root
/// wins, result multiplied by 8.
fn hash_to_curve(tag: &[u8]) -> CurvePoint {
    let seed = Fr::from_be_bytes_mod_order(tag);
    let mut counter = 0u64;
    loop {
        if let Some(point) = point_from_y(hash2(seed, Fr::from(counter))) {
            let cleared = point.scalar_mul(Fr::from(8u64));
            if !cleared.is_identity() {
                return cleared;
            }
        }
        counter += 1;
    }
}

fn point_from_y(y: Fr) -> Option<CurvePoint> {
    let y2 = y.square();
    let denominator = (COEFF_A - COEFF_D * y2).inverse()?;
    let x = ((Fr::ONE - y2) * denominator).sqrt()?;
    let neg_x = -x;
    let x = if neg_x.into_bigint() < x.into_bigint() {
        neg_x
    } else {
        x
    };
    Some(CurvePoint { x, y })
}
