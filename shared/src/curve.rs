//! Prime-field elliptic-curve arithmetic: modular inverse, Legendre symbol,
//! Tonelli-Shanks square roots, point addition/doubling, scalar
//! multiplication, ECDSA sign/verify and compressed-key (de)serialization.
//!
//! Grounded on `examples/original_source/cryptography.py`'s `EllipticCurve`
//! class, reimplemented over `num-bigint` instead of Python's arbitrary
//! precision integers.

use crate::codec::pad_hex;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveError {
    #[error("curve group order is not prime")]
    CurveOrderNotPrime,
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("value has no square root modulo p")]
    NoSquareRoot,
}

/// A point on the curve, or the identity (point at infinity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point {
    Identity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    #[must_use]
    pub fn affine(x: BigUint, y: BigUint) -> Self {
        Self::Affine { x, y }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    #[must_use]
    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Self::Identity => None,
            Self::Affine { x, .. } => Some(x),
        }
    }

    #[must_use]
    pub fn y(&self) -> Option<&BigUint> {
        match self {
            Self::Identity => None,
            Self::Affine { y, .. } => Some(y),
        }
    }
}

/// `y^2 = x^3 + ax + b (mod p)`, with generator `G = (gx, gy)` of order `n`.
#[derive(Debug, Clone)]
pub struct Curve {
    pub a: BigInt,
    pub b: BigInt,
    pub p: BigUint,
    pub g: Point,
    pub n: BigUint,
}

impl Curve {
    /// The default curve named throughout the spec: secp256k1.
    #[must_use]
    pub fn secp256k1() -> Self {
        let p = hex_biguint(
            "fffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
        );
        let gx = hex_biguint("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
        let gy = hex_biguint("483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b");
        let n = hex_biguint("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");
        Self {
            a: BigInt::zero(),
            b: BigInt::from(7u8),
            p,
            g: Point::affine(gx, gy),
            n,
        }
    }

    /// `true` for the identity and for `(x, y)` satisfying the curve equation.
    #[must_use]
    pub fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Identity => true,
            Point::Affine { x, y } => {
                let lhs = mod_reduce(signed(y) * signed(y), &self.p);
                let rhs = mod_reduce(
                    signed(x).pow(3) + &self.a * signed(x) + &self.b,
                    &self.p,
                );
                lhs == rhs
            }
        }
    }

    /// Point addition (and, when `p == q`, doubling via the tangent slope).
    #[must_use]
    pub fn add(&self, p: &Point, q: &Point) -> Point {
        let (x1, y1) = match p {
            Point::Identity => return q.clone(),
            Point::Affine { x, y } => (x, y),
        };
        let (x2, y2) = match q {
            Point::Identity => return p.clone(),
            Point::Affine { x, y } => (x, y),
        };

        if x1 == x2 {
            let sum_y = mod_reduce(signed(y1) + signed(y2), &self.p);
            if sum_y.is_zero() {
                return Point::Identity;
            }
        }

        let m = if x1 == x2 {
            let numerator = mod_reduce(BigInt::from(3u8) * signed(x1) * signed(x1) + &self.a, &self.p);
            let denom = mod_reduce(BigInt::from(2u8) * signed(y1), &self.p);
            let inv = mod_inverse(&denom, &self.p).expect("denominator is invertible mod prime p");
            mod_reduce(signed(&numerator) * signed(&inv), &self.p)
        } else {
            let numerator = mod_reduce(signed(y1) - signed(y2), &self.p);
            let denom = mod_reduce(signed(x1) - signed(x2), &self.p);
            let inv = mod_inverse(&denom, &self.p).expect("x1 != x2 so denominator is invertible");
            mod_reduce(signed(&numerator) * signed(&inv), &self.p)
        };

        let x3 = mod_reduce(signed(&m) * signed(&m) - signed(x1) - signed(x2), &self.p);
        let y3 = mod_reduce(signed(y1) + signed(&m) * (signed(&x3) - signed(x1)), &self.p);
        Point::affine(x3, y3)
    }

    /// Left-to-right double-and-add scalar multiplication, skipping the MSB.
    #[must_use]
    pub fn scalar_mul(&self, scalar: &BigUint, point: &Point) -> Point {
        if point.is_identity() {
            return Point::Identity;
        }
        let n = &(scalar % &self.n);
        if n.is_zero() {
            return Point::Identity;
        }
        let bits = n.to_str_radix(2);
        let mut result = point.clone();
        for bit in bits.chars().skip(1) {
            result = self.add(&result, &result);
            if bit == '1' {
                result = self.add(&result, point);
            }
        }
        result
    }

    /// Integer value of the first `n.bits()` bits of `tx_id_hex`, the `Z`
    /// value used by both sign and verify.
    fn hash_to_scalar(&self, tx_id_hex: &str) -> BigUint {
        let full = BigUint::parse_bytes(tx_id_hex.as_bytes(), 16).unwrap_or_else(BigUint::zero);
        let total_bits = (tx_id_hex.len() as u64) * 4;
        let n_bits = self.n.bits();
        if n_bits < total_bits {
            full >> (total_bits - n_bits)
        } else {
            full
        }
    }

    /// ECDSA sign over `tx_id_hex` with private scalar `k`.
    pub fn sign(&self, tx_id_hex: &str, k: &BigUint) -> Result<(BigUint, BigUint), CurveError> {
        if !is_probably_prime(&self.n) {
            return Err(CurveError::CurveOrderNotPrime);
        }
        let z = self.hash_to_scalar(tx_id_hex);
        let public = self.scalar_mul(k, &self.g);
        loop {
            let t = random_below(&self.n);
            if t.is_zero() {
                continue;
            }
            let point = self.scalar_mul(&t, &self.g);
            let x = match point {
                Point::Identity => continue,
                Point::Affine { x, .. } => x,
            };
            let r = &x % &self.n;
            if r.is_zero() {
                continue;
            }
            let t_inv = match mod_inverse(&t, &self.n) {
                Some(v) => v,
                None => continue,
            };
            let s = (&t_inv * (&z + &r * k)) % &self.n;
            if s.is_zero() {
                continue;
            }
            if self.verify_signature(&r, &s, tx_id_hex, &public)? {
                return Ok((r, s));
            }
        }
    }

    /// ECDSA verify of `(r, s)` over `tx_id_hex` against public point `point`.
    pub fn verify_signature(
        &self,
        r: &BigUint,
        s: &BigUint,
        tx_id_hex: &str,
        point: &Point,
    ) -> Result<bool, CurveError> {
        if !is_probably_prime(&self.n) {
            return Err(CurveError::CurveOrderNotPrime);
        }
        if r.is_zero() || *r >= self.n || s.is_zero() || *s >= self.n {
            return Ok(false);
        }
        let z = self.hash_to_scalar(tx_id_hex);
        let s_inv = match mod_inverse(s, &self.n) {
            Some(v) => v,
            None => return Ok(false),
        };
        let u1 = (&z * &s_inv) % &self.n;
        let u2 = (r * &s_inv) % &self.n;
        let p1 = self.scalar_mul(&u1, &self.g);
        let p2 = self.scalar_mul(&u2, point);
        let sum = self.add(&p1, &p2);
        match sum {
            Point::Identity => Ok(false),
            Point::Affine { x, .. } => Ok(&x % &self.n == *r),
        }
    }

    /// 33-byte compressed public key hex: 1-byte parity + 32-byte x.
    pub fn compress(&self, point: &Point) -> Result<String, CurveError> {
        match point {
            Point::Identity => Err(CurveError::NotOnCurve),
            Point::Affine { x, y } => {
                let prefix = if (y % 2u8).is_zero() { "02" } else { "03" };
                Ok(format!("{prefix}{}", pad_hex(&x.to_str_radix(16), 64)))
            }
        }
    }

    /// Recovers the full point from a compressed public key hex string.
    pub fn decompress(&self, cpk_hex: &str) -> Result<Point, CurveError> {
        if cpk_hex.len() != 66 {
            return Err(CurveError::NotOnCurve);
        }
        let prefix = &cpk_hex[0..2];
        let x = BigUint::parse_bytes(cpk_hex[2..].as_bytes(), 16).ok_or(CurveError::NotOnCurve)?;
        let rhs = mod_reduce(signed(&x).pow(3) + &self.a * signed(&x) + &self.b, &self.p);
        let y = tonelli_shanks(&rhs, &self.p).ok_or(CurveError::NoSquareRoot)?;
        let wants_odd = prefix == "03";
        let y_is_odd = !(&y % 2u8).is_zero();
        let y = if y_is_odd == wants_odd { y } else { &self.p - &y };
        let point = Point::affine(x, y);
        if !self.is_on_curve(&point) {
            return Err(CurveError::NotOnCurve);
        }
        Ok(point)
    }
}

fn hex_biguint(hex_text: &str) -> BigUint {
    BigUint::parse_bytes(hex_text.as_bytes(), 16).expect("valid curve constant")
}

fn signed(n: &BigUint) -> BigInt {
    BigInt::from(n.clone())
}

/// Reduces a (possibly negative) `BigInt` into `[0, p)`.
fn mod_reduce(value: BigInt, p: &BigUint) -> BigUint {
    let p_signed = BigInt::from(p.clone());
    let mut r = value % &p_signed;
    if r.is_negative() {
        r += &p_signed;
    }
    r.to_biguint().expect("non-negative after reduction")
}

/// Modular inverse via the extended Euclidean algorithm; `None` if `a` and
/// `m` are not coprime.
#[must_use]
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let (gcd, x, _) = extended_gcd(BigInt::from(a.clone()), BigInt::from(m.clone()));
    if gcd != BigInt::one() {
        return None;
    }
    Some(mod_reduce(x, m))
}

fn extended_gcd(a: BigInt, b: BigInt) -> (BigInt, BigInt, BigInt) {
    if b.is_zero() {
        (a, BigInt::one(), BigInt::zero())
    } else {
        let (g, x1, y1) = extended_gcd(b.clone(), &a % &b);
        let x = y1.clone();
        let y = x1 - (&a / &b) * y1;
        (g, x, y)
    }
}

/// Euler's criterion: `n` is a quadratic residue mod `p` iff `n^((p-1)/2) == 1`.
#[must_use]
pub fn is_quadratic_residue(n: &BigUint, p: &BigUint) -> bool {
    if (n % p).is_zero() {
        return true;
    }
    let exp = (p - BigUint::one()) / BigUint::from(2u8);
    n.modpow(&exp, p) == BigUint::one()
}

/// Modular square root via Tonelli-Shanks, with the `p ≡ 3 (mod 4)` shortcut.
#[must_use]
pub fn tonelli_shanks(n: &BigUint, p: &BigUint) -> Option<BigUint> {
    if !is_quadratic_residue(n, p) {
        return None;
    }
    if (n % p).is_zero() {
        return Some(BigUint::zero());
    }
    let four = BigUint::from(4u8);
    if (p % &four) == BigUint::from(3u8) {
        let exp = (p + BigUint::one()) / &four;
        return Some(n.modpow(&exp, p));
    }

    let mut q = p - BigUint::one();
    let mut s = 0u32;
    while (&q % 2u8).is_zero() {
        s += 1;
        q /= 2u8;
    }

    let mut z = BigUint::from(2u8);
    while is_quadratic_residue(&z, p) {
        z += BigUint::one();
    }

    let mut m = s;
    let mut c = z.modpow(&q, p);
    let mut t = n.modpow(&q, p);
    let mut r = n.modpow(&((&q + BigUint::one()) / 2u8), p);

    while t != BigUint::one() {
        let mut i = 0u32;
        let mut factor = t.clone();
        while factor != BigUint::one() {
            i += 1;
            factor = (&factor * &factor) % p;
        }

        let exp = BigUint::from(1u8) << (m - i - 1) as usize;
        let b = c.modpow(&exp, p);
        m = i;
        c = (&b * &b) % p;
        t = (&t * &b * &b) % p;
        r = (&r * &b) % p;
    }

    Some(r)
}

/// Rejection-sampled uniform value in `[1, bound)`.
fn random_below(bound: &BigUint) -> BigUint {
    let byte_len = ((bound.bits() as usize) + 7) / 8;
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = vec![0u8; byte_len.max(1)];
        rng.fill_bytes(&mut bytes);
        let candidate = BigUint::from_bytes_be(&bytes);
        if !candidate.is_zero() && candidate < *bound {
            return candidate;
        }
    }
}

/// Miller-Rabin primality test, used to validate the curve's group order
/// before signing/verifying per the spec's `CurveOrderNotPrime` contract.
#[must_use]
pub fn is_probably_prime(n: &BigUint) -> bool {
    let two = BigUint::from(2u8);
    let three = BigUint::from(3u8);
    if *n < two {
        return false;
    }
    if *n == two || *n == three {
        return true;
    }
    if (n % &two).is_zero() {
        return false;
    }

    let mut d = n - BigUint::one();
    let mut r = 0u32;
    while (&d % &two).is_zero() {
        r += 1;
        d /= 2u8;
    }

    'witness: for _ in 0..24 {
        let a = random_below_at_least(n, &two);
        let mut x = a.modpow(&d, n);
        if x == BigUint::one() || x == n - BigUint::one() {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n - BigUint::one() {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn random_below_at_least(bound: &BigUint, min: &BigUint) -> BigUint {
    loop {
        let candidate = random_below(bound);
        if candidate >= *min {
            return candidate;
        }
    }
}
