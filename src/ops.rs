//! The operator set of the IR.
//!
//! Each operator has a printable name (the one used in the textual block format) and a fixed
//! type signature. How the operator propagates taint is decided separately, in
//! [`crate::op_rules`].

use crate::ir::Type;
use std::fmt;

/// The argument types and result type of an operator
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signature {
    pub args: &'static [Type],
    pub result: Type,
}

impl Signature {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

macro_rules! operators {
    ($($name:ident = $text:literal : ($($arg:ident),*) -> $res:ident;)*) => {
        /// An IR operator
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Op {
            $($name,)*
        }

        impl Op {
            /// Every operator, in discriminant order
            pub const ALL: &'static [Op] = &[$(Op::$name,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Op::$name => $text,)*
                }
            }

            pub fn signature(self) -> Signature {
                match self {
                    $(Op::$name => Signature {
                        args: &[$(Type::$arg),*],
                        result: Type::$res,
                    },)*
                }
            }
        }
    };
}

operators! {
    // Scalar integer arithmetic and logic
    Add8 = "Add8" : (I8, I8) -> I8;
    Add16 = "Add16" : (I16, I16) -> I16;
    Add32 = "Add32" : (I32, I32) -> I32;
    Add64 = "Add64" : (I64, I64) -> I64;
    Sub8 = "Sub8" : (I8, I8) -> I8;
    Sub16 = "Sub16" : (I16, I16) -> I16;
    Sub32 = "Sub32" : (I32, I32) -> I32;
    Sub64 = "Sub64" : (I64, I64) -> I64;
    Mul8 = "Mul8" : (I8, I8) -> I8;
    Mul16 = "Mul16" : (I16, I16) -> I16;
    Mul32 = "Mul32" : (I32, I32) -> I32;
    Mul64 = "Mul64" : (I64, I64) -> I64;
    Or1 = "Or1" : (I1, I1) -> I1;
    Or8 = "Or8" : (I8, I8) -> I8;
    Or16 = "Or16" : (I16, I16) -> I16;
    Or32 = "Or32" : (I32, I32) -> I32;
    Or64 = "Or64" : (I64, I64) -> I64;
    And1 = "And1" : (I1, I1) -> I1;
    And8 = "And8" : (I8, I8) -> I8;
    And16 = "And16" : (I16, I16) -> I16;
    And32 = "And32" : (I32, I32) -> I32;
    And64 = "And64" : (I64, I64) -> I64;
    Xor8 = "Xor8" : (I8, I8) -> I8;
    Xor16 = "Xor16" : (I16, I16) -> I16;
    Xor32 = "Xor32" : (I32, I32) -> I32;
    Xor64 = "Xor64" : (I64, I64) -> I64;
    Shl8 = "Shl8" : (I8, I8) -> I8;
    Shl16 = "Shl16" : (I16, I8) -> I16;
    Shl32 = "Shl32" : (I32, I8) -> I32;
    Shl64 = "Shl64" : (I64, I8) -> I64;
    Shr8 = "Shr8" : (I8, I8) -> I8;
    Shr16 = "Shr16" : (I16, I8) -> I16;
    Shr32 = "Shr32" : (I32, I8) -> I32;
    Shr64 = "Shr64" : (I64, I8) -> I64;
    Sar8 = "Sar8" : (I8, I8) -> I8;
    Sar16 = "Sar16" : (I16, I8) -> I16;
    Sar32 = "Sar32" : (I32, I8) -> I32;
    Sar64 = "Sar64" : (I64, I8) -> I64;
    Not1 = "Not1" : (I1) -> I1;
    Not8 = "Not8" : (I8) -> I8;
    Not16 = "Not16" : (I16) -> I16;
    Not32 = "Not32" : (I32) -> I32;
    Not64 = "Not64" : (I64) -> I64;
    Max32U = "Max32U" : (I32, I32) -> I32;
    QAdd32S = "QAdd32S" : (I32, I32) -> I32;
    Sad8Ux4 = "Sad8Ux4" : (I32, I32) -> I32;

    // Integer comparisons
    CmpEQ8 = "CmpEQ8" : (I8, I8) -> I1;
    CmpEQ16 = "CmpEQ16" : (I16, I16) -> I1;
    CmpEQ32 = "CmpEQ32" : (I32, I32) -> I1;
    CmpEQ64 = "CmpEQ64" : (I64, I64) -> I1;
    CmpNE8 = "CmpNE8" : (I8, I8) -> I1;
    CmpNE16 = "CmpNE16" : (I16, I16) -> I1;
    CmpNE32 = "CmpNE32" : (I32, I32) -> I1;
    CmpNE64 = "CmpNE64" : (I64, I64) -> I1;
    CmpLT32S = "CmpLT32S" : (I32, I32) -> I1;
    CmpLT32U = "CmpLT32U" : (I32, I32) -> I1;
    CmpLE32S = "CmpLE32S" : (I32, I32) -> I1;
    CmpLE32U = "CmpLE32U" : (I32, I32) -> I1;
    CmpLT64S = "CmpLT64S" : (I64, I64) -> I1;
    CmpLT64U = "CmpLT64U" : (I64, I64) -> I1;
    CmpLE64S = "CmpLE64S" : (I64, I64) -> I1;
    CmpLE64U = "CmpLE64U" : (I64, I64) -> I1;
    CmpORD32S = "CmpORD32S" : (I32, I32) -> I32;
    CmpORD32U = "CmpORD32U" : (I32, I32) -> I32;
    CmpORD64S = "CmpORD64S" : (I64, I64) -> I64;
    CmpORD64U = "CmpORD64U" : (I64, I64) -> I64;
    CasCmpEQ8 = "CasCmpEQ8" : (I8, I8) -> I1;
    CasCmpEQ16 = "CasCmpEQ16" : (I16, I16) -> I1;
    CasCmpEQ32 = "CasCmpEQ32" : (I32, I32) -> I1;
    CasCmpEQ64 = "CasCmpEQ64" : (I64, I64) -> I1;
    CasCmpNE8 = "CasCmpNE8" : (I8, I8) -> I1;
    CasCmpNE16 = "CasCmpNE16" : (I16, I16) -> I1;
    CasCmpNE32 = "CasCmpNE32" : (I32, I32) -> I1;
    CasCmpNE64 = "CasCmpNE64" : (I64, I64) -> I1;
    ExpCmpNE8 = "ExpCmpNE8" : (I8, I8) -> I1;
    ExpCmpNE16 = "ExpCmpNE16" : (I16, I16) -> I1;
    ExpCmpNE32 = "ExpCmpNE32" : (I32, I32) -> I1;
    ExpCmpNE64 = "ExpCmpNE64" : (I64, I64) -> I1;
    CmpNEZ8 = "CmpNEZ8" : (I8) -> I1;
    CmpNEZ16 = "CmpNEZ16" : (I16) -> I1;
    CmpNEZ32 = "CmpNEZ32" : (I32) -> I1;
    CmpNEZ64 = "CmpNEZ64" : (I64) -> I1;
    CmpwNEZ32 = "CmpwNEZ32" : (I32) -> I32;
    CmpwNEZ64 = "CmpwNEZ64" : (I64) -> I64;
    Left8 = "Left8" : (I8) -> I8;
    Left16 = "Left16" : (I16) -> I16;
    Left32 = "Left32" : (I32) -> I32;
    Left64 = "Left64" : (I64) -> I64;
    Clz32 = "Clz32" : (I32) -> I32;
    Clz64 = "Clz64" : (I64) -> I64;
    Ctz32 = "Ctz32" : (I32) -> I32;
    Ctz64 = "Ctz64" : (I64) -> I64;

    // Widening multiplies
    MullS8 = "MullS8" : (I8, I8) -> I16;
    MullU8 = "MullU8" : (I8, I8) -> I16;
    MullS16 = "MullS16" : (I16, I16) -> I32;
    MullU16 = "MullU16" : (I16, I16) -> I32;
    MullS32 = "MullS32" : (I32, I32) -> I64;
    MullU32 = "MullU32" : (I32, I32) -> I64;
    MullS64 = "MullS64" : (I64, I64) -> I128;
    MullU64 = "MullU64" : (I64, I64) -> I128;

    // Division
    DivU32 = "DivU32" : (I32, I32) -> I32;
    DivS32 = "DivS32" : (I32, I32) -> I32;
    DivU64 = "DivU64" : (I64, I64) -> I64;
    DivS64 = "DivS64" : (I64, I64) -> I64;
    DivModU64to32 = "DivModU64to32" : (I64, I32) -> I64;
    DivModS64to32 = "DivModS64to32" : (I64, I32) -> I64;
    DivModU128to64 = "DivModU128to64" : (I128, I64) -> I128;
    DivModS128to64 = "DivModS128to64" : (I128, I64) -> I128;
    DivModS64to64 = "DivModS64to64" : (I64, I64) -> I128;

    // Widening conversions
    U1to8 = "1Uto8" : (I1) -> I8;
    U1to32 = "1Uto32" : (I1) -> I32;
    U1to64 = "1Uto64" : (I1) -> I64;
    S1to8 = "1Sto8" : (I1) -> I8;
    S1to16 = "1Sto16" : (I1) -> I16;
    S1to32 = "1Sto32" : (I1) -> I32;
    S1to64 = "1Sto64" : (I1) -> I64;
    U8to16 = "8Uto16" : (I8) -> I16;
    U8to32 = "8Uto32" : (I8) -> I32;
    U8to64 = "8Uto64" : (I8) -> I64;
    S8to16 = "8Sto16" : (I8) -> I16;
    S8to32 = "8Sto32" : (I8) -> I32;
    S8to64 = "8Sto64" : (I8) -> I64;
    U16to32 = "16Uto32" : (I16) -> I32;
    U16to64 = "16Uto64" : (I16) -> I64;
    S16to32 = "16Sto32" : (I16) -> I32;
    S16to64 = "16Sto64" : (I16) -> I64;
    U32to64 = "32Uto64" : (I32) -> I64;
    S32to64 = "32Sto64" : (I32) -> I64;

    // Narrowing conversions
    Trunc64to1 = "64to1" : (I64) -> I1;
    Trunc32to1 = "32to1" : (I32) -> I1;
    Trunc64to8 = "64to8" : (I64) -> I8;
    Trunc32to8 = "32to8" : (I32) -> I8;
    Trunc64to16 = "64to16" : (I64) -> I16;
    Trunc32to16 = "32to16" : (I32) -> I16;
    Trunc16to8 = "16to8" : (I16) -> I8;
    Hi16to8 = "16HIto8" : (I16) -> I8;
    Trunc64to32 = "64to32" : (I64) -> I32;
    Hi64to32 = "64HIto32" : (I64) -> I32;
    Hi32to16 = "32HIto16" : (I32) -> I16;
    Trunc128to64 = "128to64" : (I128) -> I64;
    Hi128to64 = "128HIto64" : (I128) -> I64;

    // Concatenation
    Hl8to16 = "8HLto16" : (I8, I8) -> I16;
    Hl16to32 = "16HLto32" : (I16, I16) -> I32;
    Hl32to64 = "32HLto64" : (I32, I32) -> I64;
    Hl64to128 = "64HLto128" : (I64, I64) -> I128;

    // Scalar binary floating point, with rounding mode
    AddF64 = "AddF64" : (I32, F64, F64) -> F64;
    SubF64 = "SubF64" : (I32, F64, F64) -> F64;
    MulF64 = "MulF64" : (I32, F64, F64) -> F64;
    DivF64 = "DivF64" : (I32, F64, F64) -> F64;
    AddF32 = "AddF32" : (I32, F32, F32) -> F32;
    SubF32 = "SubF32" : (I32, F32, F32) -> F32;
    MulF32 = "MulF32" : (I32, F32, F32) -> F32;
    DivF32 = "DivF32" : (I32, F32, F32) -> F32;
    AtanF64 = "AtanF64" : (I32, F64, F64) -> F64;
    AddF128 = "AddF128" : (I32, F128, F128) -> F128;
    MulF128 = "MulF128" : (I32, F128, F128) -> F128;
    AddD64 = "AddD64" : (I32, D64, D64) -> D64;
    SubD64 = "SubD64" : (I32, D64, D64) -> D64;
    MulD64 = "MulD64" : (I32, D64, D64) -> D64;
    DivD64 = "DivD64" : (I32, D64, D64) -> D64;
    AddD128 = "AddD128" : (I32, D128, D128) -> D128;
    SubD128 = "SubD128" : (I32, D128, D128) -> D128;

    // Fused multiply-add
    MAddF64 = "MAddF64" : (I32, F64, F64, F64) -> F64;
    MSubF64 = "MSubF64" : (I32, F64, F64, F64) -> F64;
    MAddF32 = "MAddF32" : (I32, F32, F32, F32) -> F32;
    MSubF32 = "MSubF32" : (I32, F32, F32, F32) -> F32;

    // Scalar floating point with rounding mode, and comparisons
    SqrtF64 = "SqrtF64" : (I32, F64) -> F64;
    SqrtF32 = "SqrtF32" : (I32, F32) -> F32;
    RoundF64toInt = "RoundF64toInt" : (I32, F64) -> F64;
    F64toF32 = "F64toF32" : (I32, F64) -> F32;
    F64toI32S = "F64toI32S" : (I32, F64) -> I32;
    F64toI32U = "F64toI32U" : (I32, F64) -> I32;
    F64toI64S = "F64toI64S" : (I32, F64) -> I64;
    F32toI32S = "F32toI32S" : (I32, F32) -> I32;
    I64StoF64 = "I64StoF64" : (I32, I64) -> F64;
    I64UtoF64 = "I64UtoF64" : (I32, I64) -> F64;
    I32StoF32 = "I32StoF32" : (I32, I32) -> F32;
    F128toF64 = "F128toF64" : (I32, F128) -> F64;
    D64toI64S = "D64toI64S" : (I32, D64) -> I64;
    I64StoD64 = "I64StoD64" : (I32, I64) -> D64;
    D128toD64 = "D128toD64" : (I32, D128) -> D64;
    CmpF64 = "CmpF64" : (F64, F64) -> I32;
    CmpF32 = "CmpF32" : (F32, F32) -> I32;
    CmpD64 = "CmpD64" : (D64, D64) -> I32;
    MinNumF64 = "MinNumF64" : (F64, F64) -> F64;
    MaxNumF64 = "MaxNumF64" : (F64, F64) -> F64;
    F64HLtoF128 = "F64HLtoF128" : (F64, F64) -> F128;
    D64HLtoD128 = "D64HLtoD128" : (D64, D64) -> D128;

    // Scalar floating point unary
    NegF64 = "NegF64" : (F64) -> F64;
    AbsF64 = "AbsF64" : (F64) -> F64;
    NegF32 = "NegF32" : (F32) -> F32;
    AbsF32 = "AbsF32" : (F32) -> F32;
    NegF128 = "NegF128" : (F128) -> F128;
    F32toF64 = "F32toF64" : (F32) -> F64;
    F64toF128 = "F64toF128" : (F64) -> F128;
    I32StoF64 = "I32StoF64" : (I32) -> F64;
    I32UtoF64 = "I32UtoF64" : (I32) -> F64;
    ReinterpF64asI64 = "ReinterpF64asI64" : (F64) -> I64;
    ReinterpI64asF64 = "ReinterpI64asF64" : (I64) -> F64;
    ReinterpF32asI32 = "ReinterpF32asI32" : (F32) -> I32;
    ReinterpI32asF32 = "ReinterpI32asF32" : (I32) -> F32;
    ReinterpD64asI64 = "ReinterpD64asI64" : (D64) -> I64;
    ReinterpI64asD64 = "ReinterpI64asD64" : (I64) -> D64;
    D32toD64 = "D32toD64" : (D32) -> D64;
    D64toD128 = "D64toD128" : (D64) -> D128;
    F128HItoF64 = "F128HItoF64" : (F128) -> F64;
    F128LOtoF64 = "F128LOtoF64" : (F128) -> F64;
    D128HItoD64 = "D128HItoD64" : (D128) -> D64;
    D128LOtoD64 = "D128LOtoD64" : (D128) -> D64;

    // 128-bit vector bitwise
    AndV128 = "AndV128" : (V128, V128) -> V128;
    OrV128 = "OrV128" : (V128, V128) -> V128;
    XorV128 = "XorV128" : (V128, V128) -> V128;
    NotV128 = "NotV128" : (V128) -> V128;

    // 128-bit vector integer lanes
    Add8x16 = "Add8x16" : (V128, V128) -> V128;
    Add16x8 = "Add16x8" : (V128, V128) -> V128;
    Add32x4 = "Add32x4" : (V128, V128) -> V128;
    Add64x2 = "Add64x2" : (V128, V128) -> V128;
    Sub8x16 = "Sub8x16" : (V128, V128) -> V128;
    Sub16x8 = "Sub16x8" : (V128, V128) -> V128;
    Sub32x4 = "Sub32x4" : (V128, V128) -> V128;
    Sub64x2 = "Sub64x2" : (V128, V128) -> V128;
    Mul8x16 = "Mul8x16" : (V128, V128) -> V128;
    Mul16x8 = "Mul16x8" : (V128, V128) -> V128;
    Mul32x4 = "Mul32x4" : (V128, V128) -> V128;
    MulHi16Ux8 = "MulHi16Ux8" : (V128, V128) -> V128;
    MulHi16Sx8 = "MulHi16Sx8" : (V128, V128) -> V128;
    QAdd8Ux16 = "QAdd8Ux16" : (V128, V128) -> V128;
    QAdd8Sx16 = "QAdd8Sx16" : (V128, V128) -> V128;
    QAdd16Ux8 = "QAdd16Ux8" : (V128, V128) -> V128;
    QAdd16Sx8 = "QAdd16Sx8" : (V128, V128) -> V128;
    QSub8Ux16 = "QSub8Ux16" : (V128, V128) -> V128;
    QSub16Sx8 = "QSub16Sx8" : (V128, V128) -> V128;
    Avg8Ux16 = "Avg8Ux16" : (V128, V128) -> V128;
    Max8Ux16 = "Max8Ux16" : (V128, V128) -> V128;
    Min8Ux16 = "Min8Ux16" : (V128, V128) -> V128;
    Max16Sx8 = "Max16Sx8" : (V128, V128) -> V128;
    Min16Sx8 = "Min16Sx8" : (V128, V128) -> V128;
    Max32Sx4 = "Max32Sx4" : (V128, V128) -> V128;
    Min32Sx4 = "Min32Sx4" : (V128, V128) -> V128;
    CmpEQ8x16 = "CmpEQ8x16" : (V128, V128) -> V128;
    CmpEQ16x8 = "CmpEQ16x8" : (V128, V128) -> V128;
    CmpEQ32x4 = "CmpEQ32x4" : (V128, V128) -> V128;
    CmpEQ64x2 = "CmpEQ64x2" : (V128, V128) -> V128;
    CmpGT8Sx16 = "CmpGT8Sx16" : (V128, V128) -> V128;
    CmpGT16Sx8 = "CmpGT16Sx8" : (V128, V128) -> V128;
    CmpGT32Sx4 = "CmpGT32Sx4" : (V128, V128) -> V128;
    CmpGT64Sx2 = "CmpGT64Sx2" : (V128, V128) -> V128;
    Abs8x16 = "Abs8x16" : (V128) -> V128;
    Abs16x8 = "Abs16x8" : (V128) -> V128;
    Abs32x4 = "Abs32x4" : (V128) -> V128;
    CmpNEZ8x16 = "CmpNEZ8x16" : (V128) -> V128;
    CmpNEZ16x8 = "CmpNEZ16x8" : (V128) -> V128;
    CmpNEZ32x4 = "CmpNEZ32x4" : (V128) -> V128;
    CmpNEZ64x2 = "CmpNEZ64x2" : (V128) -> V128;

    // 128-bit vector shifts
    ShlN8x16 = "ShlN8x16" : (V128, I8) -> V128;
    ShlN16x8 = "ShlN16x8" : (V128, I8) -> V128;
    ShlN32x4 = "ShlN32x4" : (V128, I8) -> V128;
    ShlN64x2 = "ShlN64x2" : (V128, I8) -> V128;
    ShrN8x16 = "ShrN8x16" : (V128, I8) -> V128;
    ShrN16x8 = "ShrN16x8" : (V128, I8) -> V128;
    ShrN32x4 = "ShrN32x4" : (V128, I8) -> V128;
    ShrN64x2 = "ShrN64x2" : (V128, I8) -> V128;
    SarN8x16 = "SarN8x16" : (V128, I8) -> V128;
    SarN16x8 = "SarN16x8" : (V128, I8) -> V128;
    SarN32x4 = "SarN32x4" : (V128, I8) -> V128;
    ShlV128 = "ShlV128" : (V128, I8) -> V128;
    ShrV128 = "ShrV128" : (V128, I8) -> V128;
    Shl8x16 = "Shl8x16" : (V128, V128) -> V128;
    Shl16x8 = "Shl16x8" : (V128, V128) -> V128;
    Shl32x4 = "Shl32x4" : (V128, V128) -> V128;
    Shl64x2 = "Shl64x2" : (V128, V128) -> V128;
    Shr8x16 = "Shr8x16" : (V128, V128) -> V128;
    Shr16x8 = "Shr16x8" : (V128, V128) -> V128;
    Shr32x4 = "Shr32x4" : (V128, V128) -> V128;
    Shr64x2 = "Shr64x2" : (V128, V128) -> V128;
    Sar8x16 = "Sar8x16" : (V128, V128) -> V128;
    Sar16x8 = "Sar16x8" : (V128, V128) -> V128;
    Sar32x4 = "Sar32x4" : (V128, V128) -> V128;
    Sar64x2 = "Sar64x2" : (V128, V128) -> V128;

    // 128-bit vector data steering
    Perm8x16 = "Perm8x16" : (V128, V128) -> V128;
    Perm32x4 = "Perm32x4" : (V128, V128) -> V128;
    InterleaveHI8x16 = "InterleaveHI8x16" : (V128, V128) -> V128;
    InterleaveLO8x16 = "InterleaveLO8x16" : (V128, V128) -> V128;
    InterleaveHI16x8 = "InterleaveHI16x8" : (V128, V128) -> V128;
    InterleaveLO16x8 = "InterleaveLO16x8" : (V128, V128) -> V128;
    InterleaveHI32x4 = "InterleaveHI32x4" : (V128, V128) -> V128;
    InterleaveLO32x4 = "InterleaveLO32x4" : (V128, V128) -> V128;
    InterleaveHI64x2 = "InterleaveHI64x2" : (V128, V128) -> V128;
    InterleaveLO64x2 = "InterleaveLO64x2" : (V128, V128) -> V128;
    CatEvenLanes16x8 = "CatEvenLanes16x8" : (V128, V128) -> V128;
    CatOddLanes16x8 = "CatOddLanes16x8" : (V128, V128) -> V128;
    CatEvenLanes32x4 = "CatEvenLanes32x4" : (V128, V128) -> V128;
    CatOddLanes32x4 = "CatOddLanes32x4" : (V128, V128) -> V128;
    GetElem8x16 = "GetElem8x16" : (V128, I8) -> I8;
    GetElem16x8 = "GetElem16x8" : (V128, I8) -> I16;
    GetElem32x4 = "GetElem32x4" : (V128, I8) -> I32;
    GetElem64x2 = "GetElem64x2" : (V128, I8) -> I64;
    SetV128lo32 = "SetV128lo32" : (V128, I32) -> V128;
    SetV128lo64 = "SetV128lo64" : (V128, I64) -> V128;
    Hl64toV128 = "64HLtoV128" : (I64, I64) -> V128;
    V128to64 = "V128to64" : (V128) -> I64;
    V128HIto64 = "V128HIto64" : (V128) -> I64;
    V128to32 = "V128to32" : (V128) -> I32;
    U32toV128 = "32UtoV128" : (I32) -> V128;
    U64toV128 = "64UtoV128" : (I64) -> V128;
    Dup8x16 = "Dup8x16" : (I8) -> V128;
    Dup16x8 = "Dup16x8" : (I16) -> V128;
    Dup32x4 = "Dup32x4" : (I32) -> V128;
    Reverse8sIn32_x4 = "Reverse8sIn32_x4" : (V128) -> V128;
    Reverse8sIn64_x2 = "Reverse8sIn64_x2" : (V128) -> V128;
    Reverse16sIn32_x4 = "Reverse16sIn32_x4" : (V128) -> V128;
    SliceV128 = "SliceV128" : (V128, V128, I8) -> V128;

    // 128-bit vector narrowing and widening
    NarrowBin16to8x16 = "NarrowBin16to8x16" : (V128, V128) -> V128;
    NarrowBin32to16x8 = "NarrowBin32to16x8" : (V128, V128) -> V128;
    QNarrowBin16Sto8Ux16 = "QNarrowBin16Sto8Ux16" : (V128, V128) -> V128;
    QNarrowBin16Sto8Sx16 = "QNarrowBin16Sto8Sx16" : (V128, V128) -> V128;
    QNarrowBin32Sto16Sx8 = "QNarrowBin32Sto16Sx8" : (V128, V128) -> V128;
    QNarrowBin32Sto16Ux8 = "QNarrowBin32Sto16Ux8" : (V128, V128) -> V128;
    NarrowUn16to8x8 = "NarrowUn16to8x8" : (V128) -> I64;
    NarrowUn32to16x4 = "NarrowUn32to16x4" : (V128) -> I64;
    NarrowUn64to32x2 = "NarrowUn64to32x2" : (V128) -> I64;
    QNarrowUn16Sto8Sx8 = "QNarrowUn16Sto8Sx8" : (V128) -> I64;
    QNarrowUn16Sto8Ux8 = "QNarrowUn16Sto8Ux8" : (V128) -> I64;
    QNarrowUn32Sto16Sx4 = "QNarrowUn32Sto16Sx4" : (V128) -> I64;
    QNarrowUn64Sto32Sx2 = "QNarrowUn64Sto32Sx2" : (V128) -> I64;
    Widen8Uto16x8 = "Widen8Uto16x8" : (I64) -> V128;
    Widen8Sto16x8 = "Widen8Sto16x8" : (I64) -> V128;
    Widen16Uto32x4 = "Widen16Uto32x4" : (I64) -> V128;
    Widen16Sto32x4 = "Widen16Sto32x4" : (I64) -> V128;
    Widen32Uto64x2 = "Widen32Uto64x2" : (I64) -> V128;
    Widen32Sto64x2 = "Widen32Sto64x2" : (I64) -> V128;

    // 128-bit vector floating point
    Add32Fx4 = "Add32Fx4" : (V128, V128) -> V128;
    Sub32Fx4 = "Sub32Fx4" : (V128, V128) -> V128;
    Mul32Fx4 = "Mul32Fx4" : (V128, V128) -> V128;
    Div32Fx4 = "Div32Fx4" : (V128, V128) -> V128;
    Max32Fx4 = "Max32Fx4" : (V128, V128) -> V128;
    Min32Fx4 = "Min32Fx4" : (V128, V128) -> V128;
    CmpEQ32Fx4 = "CmpEQ32Fx4" : (V128, V128) -> V128;
    CmpLT32Fx4 = "CmpLT32Fx4" : (V128, V128) -> V128;
    CmpLE32Fx4 = "CmpLE32Fx4" : (V128, V128) -> V128;
    CmpUN32Fx4 = "CmpUN32Fx4" : (V128, V128) -> V128;
    Add64Fx2 = "Add64Fx2" : (V128, V128) -> V128;
    Sub64Fx2 = "Sub64Fx2" : (V128, V128) -> V128;
    Mul64Fx2 = "Mul64Fx2" : (V128, V128) -> V128;
    Div64Fx2 = "Div64Fx2" : (V128, V128) -> V128;
    Max64Fx2 = "Max64Fx2" : (V128, V128) -> V128;
    Min64Fx2 = "Min64Fx2" : (V128, V128) -> V128;
    CmpEQ64Fx2 = "CmpEQ64Fx2" : (V128, V128) -> V128;
    CmpLT64Fx2 = "CmpLT64Fx2" : (V128, V128) -> V128;
    Sqrt32Fx4 = "Sqrt32Fx4" : (V128) -> V128;
    RSqrtEst32Fx4 = "RSqrtEst32Fx4" : (V128) -> V128;
    RecipEst32Fx4 = "RecipEst32Fx4" : (V128) -> V128;
    Sqrt64Fx2 = "Sqrt64Fx2" : (V128) -> V128;

    // 128-bit vector floating point, lowest lane only
    Add32F0x4 = "Add32F0x4" : (V128, V128) -> V128;
    Sub32F0x4 = "Sub32F0x4" : (V128, V128) -> V128;
    Mul32F0x4 = "Mul32F0x4" : (V128, V128) -> V128;
    Div32F0x4 = "Div32F0x4" : (V128, V128) -> V128;
    Max32F0x4 = "Max32F0x4" : (V128, V128) -> V128;
    Min32F0x4 = "Min32F0x4" : (V128, V128) -> V128;
    CmpEQ32F0x4 = "CmpEQ32F0x4" : (V128, V128) -> V128;
    CmpLT32F0x4 = "CmpLT32F0x4" : (V128, V128) -> V128;
    Add64F0x2 = "Add64F0x2" : (V128, V128) -> V128;
    Sub64F0x2 = "Sub64F0x2" : (V128, V128) -> V128;
    Mul64F0x2 = "Mul64F0x2" : (V128, V128) -> V128;
    Div64F0x2 = "Div64F0x2" : (V128, V128) -> V128;
    Max64F0x2 = "Max64F0x2" : (V128, V128) -> V128;
    Min64F0x2 = "Min64F0x2" : (V128, V128) -> V128;
    CmpEQ64F0x2 = "CmpEQ64F0x2" : (V128, V128) -> V128;
    CmpLT64F0x2 = "CmpLT64F0x2" : (V128, V128) -> V128;
    Sqrt32F0x4 = "Sqrt32F0x4" : (V128) -> V128;
    RSqrtEst32F0x4 = "RSqrtEst32F0x4" : (V128) -> V128;
    RecipEst32F0x4 = "RecipEst32F0x4" : (V128) -> V128;
    Sqrt64F0x2 = "Sqrt64F0x2" : (V128) -> V128;

    // 64-bit SIMD
    Add8x8 = "Add8x8" : (I64, I64) -> I64;
    Add16x4 = "Add16x4" : (I64, I64) -> I64;
    Add32x2 = "Add32x2" : (I64, I64) -> I64;
    Sub8x8 = "Sub8x8" : (I64, I64) -> I64;
    Sub16x4 = "Sub16x4" : (I64, I64) -> I64;
    Sub32x2 = "Sub32x2" : (I64, I64) -> I64;
    QAdd8Ux8 = "QAdd8Ux8" : (I64, I64) -> I64;
    Mul16x4 = "Mul16x4" : (I64, I64) -> I64;
    MulHi16Sx4 = "MulHi16Sx4" : (I64, I64) -> I64;
    Avg8Ux8 = "Avg8Ux8" : (I64, I64) -> I64;
    Max8Ux8 = "Max8Ux8" : (I64, I64) -> I64;
    Min8Ux8 = "Min8Ux8" : (I64, I64) -> I64;
    CmpEQ8x8 = "CmpEQ8x8" : (I64, I64) -> I64;
    CmpEQ16x4 = "CmpEQ16x4" : (I64, I64) -> I64;
    CmpEQ32x2 = "CmpEQ32x2" : (I64, I64) -> I64;
    CmpGT8Sx8 = "CmpGT8Sx8" : (I64, I64) -> I64;
    CmpNEZ8x8 = "CmpNEZ8x8" : (I64) -> I64;
    CmpNEZ16x4 = "CmpNEZ16x4" : (I64) -> I64;
    CmpNEZ32x2 = "CmpNEZ32x2" : (I64) -> I64;
    ShlN16x4 = "ShlN16x4" : (I64, I8) -> I64;
    ShrN16x4 = "ShrN16x4" : (I64, I8) -> I64;
    SarN16x4 = "SarN16x4" : (I64, I8) -> I64;
    ShlN32x2 = "ShlN32x2" : (I64, I8) -> I64;
    InterleaveHI8x8 = "InterleaveHI8x8" : (I64, I64) -> I64;
    InterleaveLO8x8 = "InterleaveLO8x8" : (I64, I64) -> I64;
    CatOddLanes16x4 = "CatOddLanes16x4" : (I64, I64) -> I64;
    Perm8x8 = "Perm8x8" : (I64, I64) -> I64;
    GetElem8x8 = "GetElem8x8" : (I64, I8) -> I8;
    NarrowBin16to8x8 = "NarrowBin16to8x8" : (I64, I64) -> I64;
    NarrowBin32to16x4 = "NarrowBin32to16x4" : (I64, I64) -> I64;
    QNarrowBin16Sto8Ux8 = "QNarrowBin16Sto8Ux8" : (I64, I64) -> I64;
    QNarrowBin32Sto16Sx4 = "QNarrowBin32Sto16Sx4" : (I64, I64) -> I64;
    Slice64 = "Slice64" : (I64, I64, I8) -> I64;
    SetElem8x8 = "SetElem8x8" : (I64, I8, I8) -> I64;
    SetElem32x2 = "SetElem32x2" : (I64, I8, I32) -> I64;

    // 256-bit vectors
    AndV256 = "AndV256" : (V256, V256) -> V256;
    OrV256 = "OrV256" : (V256, V256) -> V256;
    XorV256 = "XorV256" : (V256, V256) -> V256;
    NotV256 = "NotV256" : (V256) -> V256;
    Add8x32 = "Add8x32" : (V256, V256) -> V256;
    Add16x16 = "Add16x16" : (V256, V256) -> V256;
    Add32x8 = "Add32x8" : (V256, V256) -> V256;
    Add64x4 = "Add64x4" : (V256, V256) -> V256;
    Sub8x32 = "Sub8x32" : (V256, V256) -> V256;
    Sub16x16 = "Sub16x16" : (V256, V256) -> V256;
    Sub32x8 = "Sub32x8" : (V256, V256) -> V256;
    Sub64x4 = "Sub64x4" : (V256, V256) -> V256;
    CmpEQ8x32 = "CmpEQ8x32" : (V256, V256) -> V256;
    CmpEQ32x8 = "CmpEQ32x8" : (V256, V256) -> V256;
    CmpGT32Sx8 = "CmpGT32Sx8" : (V256, V256) -> V256;
    Max8Ux32 = "Max8Ux32" : (V256, V256) -> V256;
    Min8Ux32 = "Min8Ux32" : (V256, V256) -> V256;
    Add32Fx8 = "Add32Fx8" : (V256, V256) -> V256;
    Sub32Fx8 = "Sub32Fx8" : (V256, V256) -> V256;
    Mul32Fx8 = "Mul32Fx8" : (V256, V256) -> V256;
    Div32Fx8 = "Div32Fx8" : (V256, V256) -> V256;
    Add64Fx4 = "Add64Fx4" : (V256, V256) -> V256;
    Sub64Fx4 = "Sub64Fx4" : (V256, V256) -> V256;
    Mul64Fx4 = "Mul64Fx4" : (V256, V256) -> V256;
    Div64Fx4 = "Div64Fx4" : (V256, V256) -> V256;
    Sqrt32Fx8 = "Sqrt32Fx8" : (V256) -> V256;
    Sqrt64Fx4 = "Sqrt64Fx4" : (V256) -> V256;
    CmpNEZ32x8 = "CmpNEZ32x8" : (V256) -> V256;
    CmpNEZ64x4 = "CmpNEZ64x4" : (V256) -> V256;
    ShlN16x16 = "ShlN16x16" : (V256, I8) -> V256;
    ShrN32x8 = "ShrN32x8" : (V256, I8) -> V256;
    SarN16x16 = "SarN16x16" : (V256, I8) -> V256;
    Perm32x8 = "Perm32x8" : (V256, V256) -> V256;
    V256toV128_0 = "V256toV128_0" : (V256) -> V128;
    V256toV128_1 = "V256toV128_1" : (V256) -> V128;
    V256to64_0 = "V256to64_0" : (V256) -> I64;
    V256to64_1 = "V256to64_1" : (V256) -> I64;
    V256to64_2 = "V256to64_2" : (V256) -> I64;
    V256to64_3 = "V256to64_3" : (V256) -> I64;
    V128HLtoV256 = "V128HLtoV256" : (V128, V128) -> V256;
    I64x4toV256 = "64x4toV256" : (I64, I64, I64, I64) -> V256;
}

impl Op {
    pub fn from_name(name: &str) -> Option<Op> {
        Op::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Bitwise OR at an integer or vector width
    pub fn or_for(ty: Type) -> Op {
        match ty {
            Type::I1 => Op::Or1,
            Type::I8 => Op::Or8,
            Type::I16 => Op::Or16,
            Type::I32 => Op::Or32,
            Type::I64 => Op::Or64,
            Type::V128 => Op::OrV128,
            Type::V256 => Op::OrV256,
            _ => panic!("No OR operator at type {}", ty),
        }
    }

    pub fn xor_for(ty: Type) -> Op {
        match ty {
            Type::I8 => Op::Xor8,
            Type::I16 => Op::Xor16,
            Type::I32 => Op::Xor32,
            Type::I64 => Op::Xor64,
            Type::V128 => Op::XorV128,
            Type::V256 => Op::XorV256,
            _ => panic!("No XOR operator at type {}", ty),
        }
    }

    pub fn add_for(ty: Type) -> Op {
        match ty {
            Type::I8 => Op::Add8,
            Type::I16 => Op::Add16,
            Type::I32 => Op::Add32,
            Type::I64 => Op::Add64,
            _ => panic!("No ADD operator at type {}", ty),
        }
    }

    pub fn cas_cmp_eq_for(ty: Type) -> Op {
        match ty {
            Type::I8 => Op::CasCmpEQ8,
            Type::I16 => Op::CasCmpEQ16,
            Type::I32 => Op::CasCmpEQ32,
            Type::I64 => Op::CasCmpEQ64,
            _ => panic!("No CAS comparison at type {}", ty),
        }
    }

    pub fn cmp_nez_for(ty: Type) -> Op {
        match ty {
            Type::I8 => Op::CmpNEZ8,
            Type::I16 => Op::CmpNEZ16,
            Type::I32 => Op::CmpNEZ32,
            Type::I64 => Op::CmpNEZ64,
            _ => panic!("No CmpNEZ operator at type {}", ty),
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Iop_{}", self.name())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_parse_back() {
        let mut seen = HashSet::new();
        for op in Op::ALL {
            assert!(seen.insert(op.name()), "duplicate operator name {}", op.name());
            assert_eq!(Op::from_name(op.name()), Some(*op));
        }
        assert_eq!(Op::from_name("NotAnOperator"), None);
    }

    #[test]
    fn all_is_in_discriminant_order() {
        for (i, op) in Op::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }

    #[test]
    fn signatures_have_supported_arity() {
        for op in Op::ALL {
            let a = op.signature().arity();
            assert!((1..=4).contains(&a), "{:?} has arity {}", op, a);
        }
    }
}
