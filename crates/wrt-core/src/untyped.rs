//! The engine's uniform value-stack slot (spec.md §3, §9: "a single contiguous
//! buffer of 64-bit slots"). All four numeric types and both reference types
//! fit into one slot; `v128` needs a second adjacent slot (the low half lives
//! here, the high half in the slot above it, little-endian, per spec.md §3).
//!
//! This module also hosts the WebAssembly numeric instruction semantics
//! (spec.md §4.3 "Numeric semantics") as inherent methods, mirroring the
//! teacher's `wasmi_core::UntypedVal` ("dense interface to all functional
//! Wasm operations").

use crate::{
    float::{F32, F64},
    trap::{Trap, TrapCode},
};

/// An untyped 64-bit value-stack slot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct UntypedVal(u64);

macro_rules! impl_conv {
    ($ty:ty, $as_name:ident) => {
        impl From<$ty> for UntypedVal {
            fn from(value: $ty) -> Self {
                UntypedVal(value as u64)
            }
        }

        impl UntypedVal {
            pub fn $as_name(self) -> $ty {
                self.0 as $ty
            }
        }
    };
}

impl_conv!(i32, as_i32);
impl_conv!(u32, as_u32);
impl_conv!(i64, as_i64);
impl_conv!(u64, as_u64);

impl From<bool> for UntypedVal {
    fn from(value: bool) -> Self {
        UntypedVal(value as u64)
    }
}

impl From<f32> for UntypedVal {
    fn from(value: f32) -> Self {
        UntypedVal(value.to_bits() as u64)
    }
}

impl From<f64> for UntypedVal {
    fn from(value: f64) -> Self {
        UntypedVal(value.to_bits())
    }
}

impl From<F32> for UntypedVal {
    fn from(value: F32) -> Self {
        UntypedVal(value.to_bits() as u64)
    }
}

impl From<F64> for UntypedVal {
    fn from(value: F64) -> Self {
        UntypedVal(value.to_bits())
    }
}

impl UntypedVal {
    pub fn as_f32(self) -> F32 {
        F32::from_bits(self.0 as u32)
    }

    pub fn as_f64(self) -> F64 {
        F64::from_bits(self.0)
    }

    pub fn as_bool(self) -> bool {
        self.0 != 0
    }

    /// Raw 64-bit payload, as used for the low half of a `v128` or for an
    /// opaque reference/function-address encoding.
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        UntypedVal(raw)
    }
}

macro_rules! int_binops {
    ($i:ty, $u:ty, $as_i:ident, $as_u:ident,
     $add:ident, $sub:ident, $mul:ident,
     $div_s:ident, $div_u:ident, $rem_s:ident, $rem_u:ident,
     $and:ident, $or:ident, $xor:ident,
     $shl:ident, $shr_s:ident, $shr_u:ident, $rotl:ident, $rotr:ident,
     $clz:ident, $ctz:ident, $popcnt:ident,
     $eqz:ident, $eq:ident, $ne:ident,
     $lt_s:ident, $lt_u:ident, $gt_s:ident, $gt_u:ident,
     $le_s:ident, $le_u:ident, $ge_s:ident, $ge_u:ident) => {
        impl UntypedVal {
            pub fn $add(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i().wrapping_add(other.$as_i()))
            }
            pub fn $sub(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i().wrapping_sub(other.$as_i()))
            }
            pub fn $mul(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i().wrapping_mul(other.$as_i()))
            }
            pub fn $div_s(self, other: Self) -> Result<Self, Trap> {
                let (a, b) = (self.$as_i(), other.$as_i());
                if b == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                if a == <$i>::MIN && b == -1 {
                    return Err(TrapCode::IntegerOverflow.into());
                }
                Ok(UntypedVal::from(a.wrapping_div(b)))
            }
            pub fn $div_u(self, other: Self) -> Result<Self, Trap> {
                let (a, b) = (self.$as_u(), other.$as_u());
                if b == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                Ok(UntypedVal::from(a.wrapping_div(b)))
            }
            pub fn $rem_s(self, other: Self) -> Result<Self, Trap> {
                let (a, b) = (self.$as_i(), other.$as_i());
                if b == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                Ok(UntypedVal::from(a.wrapping_rem(b)))
            }
            pub fn $rem_u(self, other: Self) -> Result<Self, Trap> {
                let (a, b) = (self.$as_u(), other.$as_u());
                if b == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                Ok(UntypedVal::from(a.wrapping_rem(b)))
            }
            pub fn $and(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() & other.$as_u())
            }
            pub fn $or(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() | other.$as_u())
            }
            pub fn $xor(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() ^ other.$as_u())
            }
            pub fn $shl(self, other: Self) -> Self {
                let bits = (core::mem::size_of::<$u>() * 8) as u32;
                UntypedVal::from(self.$as_u().wrapping_shl(other.$as_u() as u32 % bits))
            }
            pub fn $shr_s(self, other: Self) -> Self {
                let bits = (core::mem::size_of::<$i>() * 8) as u32;
                UntypedVal::from(self.$as_i().wrapping_shr(other.$as_u() as u32 % bits))
            }
            pub fn $shr_u(self, other: Self) -> Self {
                let bits = (core::mem::size_of::<$u>() * 8) as u32;
                UntypedVal::from(self.$as_u().wrapping_shr(other.$as_u() as u32 % bits))
            }
            pub fn $rotl(self, other: Self) -> Self {
                let bits = (core::mem::size_of::<$u>() * 8) as u32;
                UntypedVal::from(self.$as_u().rotate_left(other.$as_u() as u32 % bits))
            }
            pub fn $rotr(self, other: Self) -> Self {
                let bits = (core::mem::size_of::<$u>() * 8) as u32;
                UntypedVal::from(self.$as_u().rotate_right(other.$as_u() as u32 % bits))
            }
            pub fn $clz(self) -> Self {
                UntypedVal::from(self.$as_u().leading_zeros() as $u)
            }
            pub fn $ctz(self) -> Self {
                UntypedVal::from(self.$as_u().trailing_zeros() as $u)
            }
            pub fn $popcnt(self) -> Self {
                UntypedVal::from(self.$as_u().count_ones() as $u)
            }
            pub fn $eqz(self) -> Self {
                UntypedVal::from(self.$as_u() == 0)
            }
            pub fn $eq(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() == other.$as_u())
            }
            pub fn $ne(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() != other.$as_u())
            }
            pub fn $lt_s(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i() < other.$as_i())
            }
            pub fn $lt_u(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() < other.$as_u())
            }
            pub fn $gt_s(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i() > other.$as_i())
            }
            pub fn $gt_u(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() > other.$as_u())
            }
            pub fn $le_s(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i() <= other.$as_i())
            }
            pub fn $le_u(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() <= other.$as_u())
            }
            pub fn $ge_s(self, other: Self) -> Self {
                UntypedVal::from(self.$as_i() >= other.$as_i())
            }
            pub fn $ge_u(self, other: Self) -> Self {
                UntypedVal::from(self.$as_u() >= other.$as_u())
            }
        }
    };
}

int_binops!(
    i32, u32, as_i32, as_u32, i32_add, i32_sub, i32_mul, i32_div_s, i32_div_u, i32_rem_s,
    i32_rem_u, i32_and, i32_or, i32_xor, i32_shl, i32_shr_s, i32_shr_u, i32_rotl, i32_rotr,
    i32_clz, i32_ctz, i32_popcnt, i32_eqz, i32_eq, i32_ne, i32_lt_s, i32_lt_u, i32_gt_s, i32_gt_u,
    i32_le_s, i32_le_u, i32_ge_s, i32_ge_u
);

int_binops!(
    i64, u64, as_i64, as_u64, i64_add, i64_sub, i64_mul, i64_div_s, i64_div_u, i64_rem_s,
    i64_rem_u, i64_and, i64_or, i64_xor, i64_shl, i64_shr_s, i64_shr_u, i64_rotl, i64_rotr,
    i64_clz, i64_ctz, i64_popcnt, i64_eqz, i64_eq, i64_ne, i64_lt_s, i64_lt_u, i64_gt_s, i64_gt_u,
    i64_le_s, i64_le_u, i64_ge_s, i64_ge_u
);

macro_rules! float_binops {
    ($f:ty, $as_f:ident,
     $add:ident, $sub:ident, $mul:ident, $div:ident,
     $min:ident, $max:ident, $copysign:ident,
     $abs:ident, $neg:ident, $sqrt:ident, $ceil:ident, $floor:ident, $trunc:ident, $nearest:ident,
     $eq:ident, $ne:ident, $lt:ident, $gt:ident, $le:ident, $ge:ident) => {
        impl UntypedVal {
            pub fn $add(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() + other.$as_f())
            }
            pub fn $sub(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() - other.$as_f())
            }
            pub fn $mul(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() * other.$as_f())
            }
            pub fn $div(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() / other.$as_f())
            }
            pub fn $min(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f().min(other.$as_f()))
            }
            pub fn $max(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f().max(other.$as_f()))
            }
            pub fn $copysign(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f().copysign(other.$as_f()))
            }
            pub fn $abs(self) -> Self {
                UntypedVal::from(self.$as_f().abs())
            }
            pub fn $neg(self) -> Self {
                UntypedVal::from(self.$as_f().neg())
            }
            pub fn $sqrt(self) -> Self {
                UntypedVal::from(self.$as_f().sqrt())
            }
            pub fn $ceil(self) -> Self {
                UntypedVal::from(self.$as_f().ceil())
            }
            pub fn $floor(self) -> Self {
                UntypedVal::from(self.$as_f().floor())
            }
            pub fn $trunc(self) -> Self {
                UntypedVal::from(self.$as_f().trunc())
            }
            pub fn $nearest(self) -> Self {
                UntypedVal::from(self.$as_f().nearest())
            }
            pub fn $eq(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() == other.$as_f())
            }
            pub fn $ne(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() != other.$as_f())
            }
            pub fn $lt(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() < other.$as_f())
            }
            pub fn $gt(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() > other.$as_f())
            }
            pub fn $le(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() <= other.$as_f())
            }
            pub fn $ge(self, other: Self) -> Self {
                UntypedVal::from(self.$as_f() >= other.$as_f())
            }
        }
    };
}

float_binops!(
    F32, as_f32, f32_add, f32_sub, f32_mul, f32_div, f32_min, f32_max, f32_copysign, f32_abs,
    f32_neg, f32_sqrt, f32_ceil, f32_floor, f32_trunc, f32_nearest, f32_eq, f32_ne, f32_lt, f32_gt,
    f32_le, f32_ge
);

float_binops!(
    F64, as_f64, f64_add, f64_sub, f64_mul, f64_div, f64_min, f64_max, f64_copysign, f64_abs,
    f64_neg, f64_sqrt, f64_ceil, f64_floor, f64_trunc, f64_nearest, f64_eq, f64_ne, f64_lt, f64_gt,
    f64_le, f64_ge
);

macro_rules! trunc_impl {
    ($name:ident, $src_as:ident, $dst:ty, $bits:literal, $signed:literal) => {
        pub fn $name(self) -> Result<Self, Trap> {
            let value = self.$src_as().to_float() as f64;
            let result = Self::trunc_range::<$signed>(value, $bits).map_err(Trap::from)? as $dst;
            Ok(UntypedVal::from(result))
        }
    };
}

macro_rules! trunc_sat_impl {
    ($name:ident, $src_as:ident, $dst:ty, $bits:literal, $signed:literal) => {
        pub fn $name(self) -> Self {
            let value = self.$src_as().to_float() as f64;
            let result = Self::trunc_sat::<$signed>(value, $bits) as $dst;
            UntypedVal::from(result)
        }
    };
}

/// Conversions between numeric types, including the trapping and saturating
/// float-to-int truncations of spec.md §4.3.
impl UntypedVal {
    pub fn i32_wrap_i64(self) -> Self {
        UntypedVal::from(self.as_i64() as i32)
    }

    pub fn i64_extend_i32_s(self) -> Self {
        UntypedVal::from(self.as_i32() as i64)
    }

    pub fn i64_extend_i32_u(self) -> Self {
        UntypedVal::from(self.as_u32() as u64)
    }

    pub fn i32_extend8_s(self) -> Self {
        UntypedVal::from(self.as_i32() as i8 as i32)
    }

    pub fn i32_extend16_s(self) -> Self {
        UntypedVal::from(self.as_i32() as i16 as i32)
    }

    pub fn i64_extend8_s(self) -> Self {
        UntypedVal::from(self.as_i64() as i8 as i64)
    }

    pub fn i64_extend16_s(self) -> Self {
        UntypedVal::from(self.as_i64() as i16 as i64)
    }

    pub fn i64_extend32_s(self) -> Self {
        UntypedVal::from(self.as_i64() as i32 as i64)
    }

    pub fn f32_demote_f64(self) -> Self {
        UntypedVal::from(self.as_f64().to_float() as f32)
    }

    pub fn f64_promote_f32(self) -> Self {
        UntypedVal::from(self.as_f32().to_float() as f64)
    }

    pub fn f32_convert_i32_s(self) -> Self {
        UntypedVal::from(self.as_i32() as f32)
    }
    pub fn f32_convert_i32_u(self) -> Self {
        UntypedVal::from(self.as_u32() as f32)
    }
    pub fn f32_convert_i64_s(self) -> Self {
        UntypedVal::from(self.as_i64() as f32)
    }
    pub fn f32_convert_i64_u(self) -> Self {
        UntypedVal::from(self.as_u64() as f32)
    }
    pub fn f64_convert_i32_s(self) -> Self {
        UntypedVal::from(self.as_i32() as f64)
    }
    pub fn f64_convert_i32_u(self) -> Self {
        UntypedVal::from(self.as_u32() as f64)
    }
    pub fn f64_convert_i64_s(self) -> Self {
        UntypedVal::from(self.as_i64() as f64)
    }
    pub fn f64_convert_i64_u(self) -> Self {
        UntypedVal::from(self.as_u64() as f64)
    }

    pub fn i32_reinterpret_f32(self) -> Self {
        UntypedVal::from(self.as_f32().to_bits() as i32)
    }
    pub fn f32_reinterpret_i32(self) -> Self {
        UntypedVal::from(F32::from_bits(self.as_u32()))
    }
    pub fn i64_reinterpret_f64(self) -> Self {
        UntypedVal::from(self.as_f64().to_bits() as i64)
    }
    pub fn f64_reinterpret_i64(self) -> Self {
        UntypedVal::from(F64::from_bits(self.as_u64()))
    }

    fn trunc_range<const SIGNED: bool>(value: f64, dst_bits: u32) -> Result<i128, TrapCode> {
        if value.is_nan() {
            return Err(TrapCode::BadConversionToInteger);
        }
        let truncated = value.trunc();
        let (lo, hi): (f64, f64) = if SIGNED {
            let half = 2f64.powi(dst_bits as i32 - 1);
            (-half, half)
        } else {
            (0.0, 2f64.powi(dst_bits as i32))
        };
        if truncated < lo || truncated >= hi {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(truncated as i128)
    }

    fn trunc_sat<const SIGNED: bool>(value: f64, dst_bits: u32) -> i128 {
        if value.is_nan() {
            return 0;
        }
        let truncated = value.trunc();
        let (lo, hi): (f64, i128) = if SIGNED {
            let half = 2f64.powi(dst_bits as i32 - 1);
            (-half, half as i128 - 1)
        } else {
            (0.0, (2f64.powi(dst_bits as i32) - 1.0) as i128)
        };
        if truncated < lo {
            if SIGNED {
                -((1i128) << (dst_bits - 1))
            } else {
                0
            }
        } else if truncated >= lo && SIGNED && truncated >= 2f64.powi(dst_bits as i32 - 1) {
            hi
        } else if !SIGNED && truncated >= 2f64.powi(dst_bits as i32) {
            hi
        } else {
            truncated as i128
        }
    }

    trunc_impl!(i32_trunc_f32_s, as_f32, i32, 32, true);
    trunc_impl!(i32_trunc_f32_u, as_f32, u32, 32, false);
    trunc_impl!(i32_trunc_f64_s, as_f64, i32, 32, true);
    trunc_impl!(i32_trunc_f64_u, as_f64, u32, 32, false);
    trunc_impl!(i64_trunc_f32_s, as_f32, i64, 64, true);
    trunc_impl!(i64_trunc_f32_u, as_f32, u64, 64, false);
    trunc_impl!(i64_trunc_f64_s, as_f64, i64, 64, true);
    trunc_impl!(i64_trunc_f64_u, as_f64, u64, 64, false);

    trunc_sat_impl!(i32_trunc_sat_f32_s, as_f32, i32, 32, true);
    trunc_sat_impl!(i32_trunc_sat_f32_u, as_f32, u32, 32, false);
    trunc_sat_impl!(i32_trunc_sat_f64_s, as_f64, i32, 32, true);
    trunc_sat_impl!(i32_trunc_sat_f64_u, as_f64, u32, 32, false);
    trunc_sat_impl!(i64_trunc_sat_f32_s, as_f32, i64, 64, true);
    trunc_sat_impl!(i64_trunc_sat_f32_u, as_f32, u64, 64, false);
    trunc_sat_impl!(i64_trunc_sat_f64_s, as_f64, i64, 64, true);
    trunc_sat_impl!(i64_trunc_sat_f64_u, as_f64, u64, 64, false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_div_overflow_traps() {
        let a = UntypedVal::from(i32::MIN);
        let b = UntypedVal::from(-1i32);
        assert_eq!(
            a.i32_div_s(b).unwrap_err().trap_code(),
            Some(TrapCode::IntegerOverflow)
        );
    }

    #[test]
    fn unsigned_div_max_by_one() {
        let a = UntypedVal::from(0xFFFF_FFFFu32);
        let b = UntypedVal::from(1u32);
        assert_eq!(a.i32_div_u(b).unwrap().as_u32(), 0xFFFF_FFFF);
    }

    #[test]
    fn convert_int_min_to_f32_is_exact() {
        let a = UntypedVal::from(i32::MIN);
        assert_eq!(a.f32_convert_i32_s().as_f32().to_float(), -2f32.powi(31));
    }

    #[test]
    fn trunc_nan_traps_saturating_yields_zero() {
        let nan = UntypedVal::from(f32::NAN);
        assert!(nan.i32_trunc_f32_s().is_err());
        assert_eq!(nan.i32_trunc_sat_f32_s().as_i32(), 0);
    }
}
