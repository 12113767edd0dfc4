//! Mapping from value types to the integer types that carry their taint labels.

use crate::ir::{Const, Type};

/// The type of the shadow that carries the taint label of a value of type `ty`.
///
/// Booleans get a 32-bit shadow rather than a 1-bit one, so that no shadow computation ever has to
/// deal with `I1` labels. Panics on types with no shadow representation.
pub fn shadow_type(ty: Type) -> Type {
    match ty {
        Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::I128 => ty,
        Type::I1 | Type::F32 | Type::D32 => Type::I32,
        Type::F64 | Type::D64 => Type::I64,
        Type::F128 | Type::D128 => Type::I128,
        Type::V128 | Type::V256 => ty,
        Type::F16 => panic!("Unsupported type {} has no shadow type", ty),
    }
}

/// Whether `ty` is the shadow type of some value type
pub fn is_shadow_type(ty: Type) -> bool {
    matches!(
        ty,
        Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::I128 | Type::V128 | Type::V256
    )
}

/// The fully-untainted label of a shadow type.
pub fn defined_value(shadow_ty: Type) -> Const {
    assert!(
        is_shadow_type(shadow_ty),
        "Asked for defined value of non-shadow type {}",
        shadow_ty
    );
    Const::zero_of(shadow_ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_types_are_stable_shadow_types() {
        for ty in Type::ALL.iter().copied().filter(|t| *t != Type::F16) {
            let s = shadow_type(ty);
            assert!(is_shadow_type(s), "{} -> {}", ty, s);
            assert_eq!(shadow_type(s), s, "shadow of shadow type {} moved", s);
        }
    }

    #[test]
    fn booleans_and_floats() {
        assert_eq!(shadow_type(Type::I1), Type::I32);
        assert_eq!(shadow_type(Type::F32), Type::I32);
        assert_eq!(shadow_type(Type::D64), Type::I64);
        assert_eq!(shadow_type(Type::F128), Type::I128);
        assert_eq!(shadow_type(Type::V256), Type::V256);
    }

    #[test]
    fn defined_values_are_zero() {
        for ty in Type::ALL.iter().copied().filter(|t| is_shadow_type(*t)) {
            let c = defined_value(ty);
            assert_eq!(c.ty(), ty);
            assert_eq!(c.raw_bits(), (0, 0));
        }
    }

    #[test]
    #[should_panic(expected = "no shadow type")]
    fn half_floats_are_unsupported() {
        shadow_type(Type::F16);
    }
}
