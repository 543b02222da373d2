//! 96-bit scaled decimals.
//!
//! [`Decimal`] is the managed counterpart of the 16-byte native `DECIMAL`: a 96-bit unsigned
//! mantissa, a power-of-ten scale between 0 and 28 and a sign. It also backs the currency
//! conversions, where values are fixed-point integers scaled by 10 000.
//!
//! # Native Layout
//!
//! | Offset | Size | Field                    |
//! |--------|------|--------------------------|
//! | 0      | 2    | reserved                 |
//! | 2      | 1    | scale                    |
//! | 3      | 1    | sign (`0x80` = negative) |
//! | 4      | 4    | high 32 mantissa bits    |
//! | 8      | 8    | low 64 mantissa bits     |

use std::{cmp::Ordering, fmt};

use crate::{
    wire::io::{read_le_at, write_le_at},
    Error, Result,
};

const MANTISSA_LIMIT: u128 = 1 << 96;
const SIGN_NEGATIVE: u8 = 0x80;
const CURRENCY_SCALE: u8 = 4;

/// A 96-bit scaled decimal number.
///
/// Equality compares numeric value, so `1.50` equals `1.5`.
///
/// # Examples
///
/// ```rust
/// use dispbind::wire::Decimal;
///
/// let price = Decimal::new(-12345, 2)?;
/// assert_eq!(price.to_string(), "-123.45");
/// assert_eq!(price, Decimal::new(-123450, 3)?);
/// # Ok::<(), dispbind::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct Decimal {
    mantissa: u128,
    scale: u8,
    negative: bool,
}

impl Decimal {
    /// Zero
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
        negative: false,
    };

    /// Largest supported scale
    pub const MAX_SCALE: u8 = 28;

    /// Creates `mantissa * 10^-scale`.
    ///
    /// # Errors
    /// Returns [`Error::ConversionOverflow`] if the mantissa exceeds 96 bits or the scale
    /// exceeds [`Decimal::MAX_SCALE`].
    pub fn new(mantissa: i128, scale: u8) -> Result<Self> {
        Self::from_parts(mantissa.unsigned_abs(), scale, mantissa < 0)
    }

    fn from_parts(mantissa: u128, scale: u8, negative: bool) -> Result<Self> {
        if mantissa >= MANTISSA_LIMIT || scale > Self::MAX_SCALE {
            return Err(Error::ConversionOverflow {
                value: format!("{}{}e-{}", if negative { "-" } else { "" }, mantissa, scale),
                to: "Decimal".to_string(),
            });
        }
        Ok(Decimal {
            mantissa,
            scale,
            negative: negative && mantissa != 0,
        })
    }

    /// The signed mantissa.
    #[must_use]
    pub fn mantissa(&self) -> i128 {
        if self.negative {
            -(self.mantissa as i128)
        } else {
            self.mantissa as i128
        }
    }

    /// The power-of-ten scale.
    #[must_use]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Returns `true` for values below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Nearest 64-bit float.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        let value = self.mantissa as f64 / 10f64.powi(i32::from(self.scale));
        if self.negative {
            -value
        } else {
            value
        }
    }

    /// Converts a float, keeping up to 15 significant digits.
    ///
    /// # Errors
    /// Returns [`Error::ConversionOverflow`] for non-finite or out-of-range values.
    pub fn from_f64(value: f64) -> Result<Self> {
        let overflow = || Error::ConversionOverflow {
            value: value.to_string(),
            to: "Decimal".to_string(),
        };
        if !value.is_finite() {
            return Err(overflow());
        }
        let text = format!("{:.*e}", 14, value);
        let (digits, exponent) = text.split_once('e').ok_or_else(overflow)?;
        let exponent: i32 = exponent.parse().map_err(|_| overflow())?;
        let negative = digits.starts_with('-');
        let digits: String = digits.chars().filter(char::is_ascii_digit).collect();
        let mut mantissa: u128 = digits.parse().map_err(|_| overflow())?;

        let mut scale = 14 - exponent;
        while scale < 0 {
            mantissa = mantissa.checked_mul(10).ok_or_else(overflow)?;
            scale += 1;
        }
        while scale > i32::from(Self::MAX_SCALE) {
            mantissa /= 10;
            scale -= 1;
        }
        let scale = u8::try_from(scale).map_err(|_| overflow())?;
        Ok(Self::from_parts(mantissa, scale, negative)?.normalized())
    }

    /// The same value with trailing fractional zeros removed.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut result = *self;
        while result.scale > 0 && result.mantissa % 10 == 0 {
            result.mantissa /= 10;
            result.scale -= 1;
        }
        result
    }

    /// The integral part, truncated towards zero.
    #[must_use]
    pub fn trunc(&self) -> i128 {
        let value = (self.mantissa / 10u128.pow(u32::from(self.scale))) as i128;
        if self.negative {
            -value
        } else {
            value
        }
    }

    /// Rescales to `scale` digits, rounding half to even.
    fn rescaled(&self, scale: u8) -> Option<u128> {
        match scale.cmp(&self.scale) {
            Ordering::Equal => Some(self.mantissa),
            Ordering::Greater => self
                .mantissa
                .checked_mul(10u128.checked_pow(u32::from(scale - self.scale))?),
            Ordering::Less => {
                let divisor = 10u128.pow(u32::from(self.scale - scale));
                let quotient = self.mantissa / divisor;
                let remainder = self.mantissa % divisor;
                let half = divisor / 2;
                let round_up = remainder > half || (remainder == half && quotient % 2 == 1);
                Some(if round_up { quotient + 1 } else { quotient })
            }
        }
    }

    /// Converts to the 64-bit integer currency representation (value × 10 000).
    ///
    /// # Errors
    /// Returns [`Error::ConversionOverflow`] if the value does not fit.
    pub fn to_currency(&self) -> Result<i64> {
        let overflow = || Error::ConversionOverflow {
            value: self.to_string(),
            to: "Currency".to_string(),
        };
        let scaled = self.rescaled(CURRENCY_SCALE).ok_or_else(overflow)?;
        let scaled = i128::try_from(scaled).map_err(|_| overflow())?;
        let signed = if self.negative { -scaled } else { scaled };
        i64::try_from(signed).map_err(|_| overflow())
    }

    /// Converts from the 64-bit integer currency representation.
    #[must_use]
    pub fn from_currency(value: i64) -> Self {
        Decimal {
            mantissa: u128::from(value.unsigned_abs()),
            scale: CURRENCY_SCALE,
            negative: value < 0,
        }
    }

    fn encode(&self, bytes: &mut [u8; 16]) -> Result<()> {
        let mut offset = 0;
        write_le_at(bytes, &mut offset, 0u16)?;
        write_le_at(bytes, &mut offset, self.scale)?;
        write_le_at(
            bytes,
            &mut offset,
            if self.negative { SIGN_NEGATIVE } else { 0 },
        )?;
        write_le_at(bytes, &mut offset, (self.mantissa >> 64) as u32)?;
        write_le_at(bytes, &mut offset, self.mantissa as u64)
    }

    /// Encodes into the native 16-byte layout; the reserved field is zero.
    #[must_use]
    pub fn to_wire_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        let encoded = self.encode(&mut bytes);
        debug_assert!(encoded.is_ok(), "decimal fields fill exactly 16 bytes");
        bytes
    }

    /// Decodes the native 16-byte layout; the reserved field is ignored.
    ///
    /// # Errors
    /// Returns [`Error::ConversionOverflow`] if the scale is out of range.
    pub fn from_wire_bytes(bytes: &[u8; 16]) -> Result<Self> {
        let mut offset = 2;
        let scale = read_le_at::<u8>(bytes, &mut offset)?;
        let sign = read_le_at::<u8>(bytes, &mut offset)?;
        let hi = read_le_at::<u32>(bytes, &mut offset)?;
        let lo = read_le_at::<u64>(bytes, &mut offset)?;
        let mantissa = (u128::from(hi) << 64) | u128::from(lo);
        Self::from_parts(mantissa, scale, sign & SIGN_NEGATIVE != 0)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.mantissa == b.mantissa && a.scale == b.scale && a.negative == b.negative
    }
}

impl Eq for Decimal {}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::ZERO
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.to_string();
        let scale = usize::from(self.scale);
        let sign = if self.negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

macro_rules! decimal_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Decimal {
                fn from(value: $ty) -> Self {
                    Decimal {
                        mantissa: value.unsigned_abs() as u128,
                        scale: 0,
                        negative: value < 0,
                    }
                }
            }
        )*
    };
}

decimal_from_int!(i8, i16, i32, i64);

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal {
            mantissa: u128::from(value),
            scale: 0,
            negative: false,
        }
    }
}
