//! Per-operator taint propagation rules.
//!
//! Every operator is assigned to exactly one rule by [`classify`], an exhaustive match, so adding
//! an operator without deciding how it propagates taint does not compile. The rules are looked up
//! through a dense table indexed by operator discriminant.

use crate::ir::{Atom, Expr, Type};
use crate::ops::Op;
use crate::shadow_env::ShadowEnv;
use crate::shadow_ops::{coerce, lazy2, lazy3, lazy4, left, pcast_lanes, pcast_to, uifu};
use crate::shadow_temps::{OrigAtom, ShadowAtom};
use crate::shadow_types::shadow_type;

/// How a unary operator propagates taint
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryRule {
    /// Convert the argument's label to the result's shadow type
    Coerce,
    /// Apply the operator itself to the label
    Structural,
    /// Apply a different operator of matching shadow types to the label
    Substitute(Op),
    /// Pessimise lanes with the given `CmpNEZ` operator
    PCastLanes(Op),
    /// Narrow lanes with `vanilla`, first pessimising with `pcast` if the operator saturates
    NarrowUn { pcast: Option<Op>, vanilla: Op },
    /// Widen lanes with the operator, then pessimise at the widened lane size
    WidenLanes { pcast: Op },
    /// Lowest 32-bit lane of a vector operation
    LowLane32,
    /// Lowest 64-bit lane of a vector operation
    LowLane64,
}

/// How a binary operator propagates taint
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryRule {
    /// OR of the two labels
    Uifu,
    /// OR, then smear leftwards (carries propagate upwards)
    LeftUifu,
    /// OR at operand width, then convert to the result. Uses whole-value pessimisation instead
    /// if `bogus_sensitive` and the block contains suspicious literals.
    Compare { bogus_sensitive: bool },
    /// Result is always untainted
    Defined,
    /// OR of the value label with the shift amount's label
    Shift,
    /// OR, then widen to the double-width result
    Mull,
    /// Lazy merge to the result
    Lazy,
    Structural,
    Substitute(Op),
    /// Apply the operator to the first label and the real second operand
    ShadowWithRealSecond,
    /// As [`Self::ShadowWithRealSecond`], additionally ORing in the pessimised second label
    ShiftByVector { pcast: Op },
    Perm { pcast: Op },
    /// Narrow both operands' labels with `vanilla`, first pessimising with `pcast` if the operator
    /// saturates
    NarrowBin { pcast: Option<Op>, vanilla: Op },
    LowLane32,
    LowLane64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TernaryRule {
    Lazy,
    /// Apply the operator to the first two labels and the real third operand
    RealThird,
    /// Apply the operator to the first and third labels and the real second operand
    RealSecond,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuaternaryRule {
    Lazy,
    Structural,
}

/// The taint propagation class of an operator
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpCategory {
    Unary(UnaryRule),
    Binary(BinaryRule),
    Ternary(TernaryRule),
    Quaternary(QuaternaryRule),
}

impl OpCategory {
    pub fn arity(&self) -> usize {
        match self {
            OpCategory::Unary(_) => 1,
            OpCategory::Binary(_) => 2,
            OpCategory::Ternary(_) => 3,
            OpCategory::Quaternary(_) => 4,
        }
    }
}

/// The propagation class of `op`.
pub fn classify(op: Op) -> OpCategory {
    use BinaryRule as B;
    use Op::*;
    use OpCategory::*;
    use QuaternaryRule as Q;
    use TernaryRule as T;
    use UnaryRule as U;
    match op {
        Or1 | And1 | Or8 | Or16 | Or32 | Or64 | And8 | And16 | And32 | And64 | Xor8 | Xor16
        | Xor32 | Xor64 | Add32 | Add64 | Sub32 | Sub64 | Mul32 | Max32U => Binary(B::Uifu),
        Add8 | Add16 | Sub8 | Sub16 | Mul8 | Mul16 | Mul64 => Binary(B::LeftUifu),
        Shl8 | Shl16 | Shl32 | Shl64 | Shr8 | Shr16 | Shr32 | Shr64 | Sar8 | Sar16 | Sar32
        | Sar64 => Binary(B::Shift),
        Not1 | Not8 | Not16 | Not32 | Not64 => Unary(U::Coerce),
        QAdd32S | Sad8Ux4 => Binary(B::Lazy),

        CmpEQ32 | CmpEQ64 | CmpNE32 | CmpNE64 => Binary(B::Compare {
            bogus_sensitive: true,
        }),
        ExpCmpNE8 | ExpCmpNE16 | ExpCmpNE32 | ExpCmpNE64 => Binary(B::Compare {
            bogus_sensitive: true,
        }),
        CmpEQ8 | CmpEQ16 | CmpNE8 | CmpNE16 | CmpLT32S | CmpLT32U | CmpLE32S | CmpLE32U
        | CmpLT64S | CmpLT64U | CmpLE64S | CmpLE64U | CmpORD32S | CmpORD32U | CmpORD64S
        | CmpORD64U => Binary(B::Compare {
            bogus_sensitive: false,
        }),
        CasCmpEQ8 | CasCmpEQ16 | CasCmpEQ32 | CasCmpEQ64 | CasCmpNE8 | CasCmpNE16
        | CasCmpNE32 | CasCmpNE64 => Binary(B::Defined),
        CmpNEZ8 | CmpNEZ16 | CmpNEZ32 | CmpNEZ64 | CmpwNEZ32 | CmpwNEZ64 | Left8 | Left16
        | Left32 | Left64 | Clz32 | Clz64 | Ctz32 | Ctz64 => Unary(U::Coerce),

        MullS8 | MullU8 | MullS16 | MullU16 | MullS32 | MullU32 | MullS64 | MullU64 => {
            Binary(B::Mull)
        }
        DivU32 | DivS32 | DivU64 | DivS64 | DivModU64to32 | DivModS64to32 | DivModU128to64
        | DivModS128to64 | DivModS64to64 => Binary(B::Lazy),

        U1to8 | U1to32 | U1to64 | S1to8 | S1to16 | S1to32 | S1to64 | U8to16 | U8to32 | U8to64
        | S8to16 | S8to32 | S8to64 | U16to32 | U16to64 | S16to32 | S16to64 | U32to64
        | S32to64 => Unary(U::Coerce),
        Trunc64to1 | Trunc32to1 => Unary(U::Coerce),
        Trunc64to8 | Trunc32to8 | Trunc64to16 | Trunc32to16 | Trunc16to8 | Hi16to8
        | Trunc64to32 | Hi64to32 | Hi32to16 | Trunc128to64 | Hi128to64 => Unary(U::Structural),
        Hl8to16 | Hl16to32 | Hl32to64 | Hl64to128 => Binary(B::Structural),

        AddF64 | SubF64 | MulF64 | DivF64 | AddF32 | SubF32 | MulF32 | DivF32 | AtanF64
        | AddF128 | MulF128 | AddD64 | SubD64 | MulD64 | DivD64 | AddD128 | SubD128 => {
            Ternary(T::Lazy)
        }
        MAddF64 | MSubF64 | MAddF32 | MSubF32 => Quaternary(Q::Lazy),
        SqrtF64 | SqrtF32 | RoundF64toInt | F64toF32 | F64toI32S | F64toI32U | F64toI64S
        | F32toI32S | I64StoF64 | I64UtoF64 | I32StoF32 | F128toF64 | D64toI64S | I64StoD64
        | D128toD64 | CmpF64 | CmpF32 | CmpD64 | MinNumF64 | MaxNumF64 => Binary(B::Lazy),
        F64HLtoF128 | D64HLtoD128 => Binary(B::Substitute(Hl64to128)),
        NegF64 | AbsF64 | NegF32 | AbsF32 | NegF128 | F32toF64 | F64toF128 | I32StoF64
        | I32UtoF64 | ReinterpF64asI64 | ReinterpI64asF64 | ReinterpF32asI32
        | ReinterpI32asF32 | ReinterpD64asI64 | ReinterpI64asD64 | D32toD64 | D64toD128 => {
            Unary(U::Coerce)
        }
        F128HItoF64 | D128HItoD64 => Unary(U::Substitute(Hi128to64)),
        F128LOtoF64 | D128LOtoD64 => Unary(U::Substitute(Trunc128to64)),

        AndV128 | OrV128 | XorV128 => Binary(B::Uifu),
        NotV128 => Unary(U::Coerce),
        Add8x16 | Add16x8 | Add32x4 | Add64x2 | Sub8x16 | Sub16x8 | Sub32x4 | Sub64x2
        | Mul8x16 | Mul16x8 | Mul32x4 | MulHi16Ux8 | MulHi16Sx8 | QAdd8Ux16 | QAdd8Sx16
        | QAdd16Ux8 | QAdd16Sx8 | QSub8Ux16 | QSub16Sx8 | Avg8Ux16 | Max8Ux16 | Min8Ux16
        | Max16Sx8 | Min16Sx8 | Max32Sx4 | Min32Sx4 => Binary(B::Uifu),
        CmpEQ8x16 | CmpEQ16x8 | CmpEQ32x4 | CmpEQ64x2 | CmpGT8Sx16 | CmpGT16Sx8 | CmpGT32Sx4
        | CmpGT64Sx2 => Binary(B::Uifu),
        Abs8x16 => Unary(U::PCastLanes(CmpNEZ8x16)),
        Abs16x8 => Unary(U::PCastLanes(CmpNEZ16x8)),
        Abs32x4 => Unary(U::PCastLanes(CmpNEZ32x4)),
        CmpNEZ8x16 => Unary(U::PCastLanes(CmpNEZ8x16)),
        CmpNEZ16x8 => Unary(U::PCastLanes(CmpNEZ16x8)),
        CmpNEZ32x4 => Unary(U::PCastLanes(CmpNEZ32x4)),
        CmpNEZ64x2 => Unary(U::PCastLanes(CmpNEZ64x2)),

        ShlN8x16 | ShlN16x8 | ShlN32x4 | ShlN64x2 | ShrN8x16 | ShrN16x8 | ShrN32x4 | ShrN64x2
        | SarN8x16 | SarN16x8 | SarN32x4 | ShlV128 | ShrV128 => Binary(B::ShadowWithRealSecond),
        Shl8x16 | Shr8x16 | Sar8x16 => Binary(B::ShiftByVector { pcast: CmpNEZ8x16 }),
        Shl16x8 | Shr16x8 | Sar16x8 => Binary(B::ShiftByVector { pcast: CmpNEZ16x8 }),
        Shl32x4 | Shr32x4 | Sar32x4 => Binary(B::ShiftByVector { pcast: CmpNEZ32x4 }),
        Shl64x2 | Shr64x2 | Sar64x2 => Binary(B::ShiftByVector { pcast: CmpNEZ64x2 }),

        Perm8x16 => Binary(B::Perm { pcast: CmpNEZ8x16 }),
        Perm32x4 => Binary(B::Perm { pcast: CmpNEZ32x4 }),
        InterleaveHI8x16 | InterleaveLO8x16 | InterleaveHI16x8 | InterleaveLO16x8
        | InterleaveHI32x4 | InterleaveLO32x4 | InterleaveHI64x2 | InterleaveLO64x2
        | CatEvenLanes16x8 | CatOddLanes16x8 | CatEvenLanes32x4 | CatOddLanes32x4 => {
            Binary(B::Structural)
        }
        GetElem8x16 | GetElem16x8 | GetElem32x4 | GetElem64x2 => {
            Binary(B::ShadowWithRealSecond)
        }
        SetV128lo32 | SetV128lo64 | Hl64toV128 => Binary(B::Structural),
        V128to64 | V128HIto64 | V128to32 | U32toV128 | U64toV128 | Dup8x16 | Dup16x8
        | Dup32x4 | Reverse8sIn32_x4 | Reverse8sIn64_x2 | Reverse16sIn32_x4 => {
            Unary(U::Structural)
        }
        SliceV128 => Ternary(T::RealThird),

        NarrowBin16to8x16 | NarrowBin32to16x8 => Binary(B::Structural),
        QNarrowBin16Sto8Ux16 | QNarrowBin16Sto8Sx16 => Binary(B::NarrowBin {
            pcast: Some(CmpNEZ16x8),
            vanilla: NarrowBin16to8x16,
        }),
        QNarrowBin32Sto16Sx8 | QNarrowBin32Sto16Ux8 => Binary(B::NarrowBin {
            pcast: Some(CmpNEZ32x4),
            vanilla: NarrowBin32to16x8,
        }),
        NarrowUn16to8x8 | NarrowUn32to16x4 | NarrowUn64to32x2 => Unary(U::NarrowUn {
            pcast: None,
            vanilla: op,
        }),
        QNarrowUn16Sto8Sx8 | QNarrowUn16Sto8Ux8 => Unary(U::NarrowUn {
            pcast: Some(CmpNEZ16x8),
            vanilla: NarrowUn16to8x8,
        }),
        QNarrowUn32Sto16Sx4 => Unary(U::NarrowUn {
            pcast: Some(CmpNEZ32x4),
            vanilla: NarrowUn32to16x4,
        }),
        QNarrowUn64Sto32Sx2 => Unary(U::NarrowUn {
            pcast: Some(CmpNEZ64x2),
            vanilla: NarrowUn64to32x2,
        }),
        Widen8Uto16x8 | Widen8Sto16x8 => Unary(U::WidenLanes { pcast: CmpNEZ16x8 }),
        Widen16Uto32x4 | Widen16Sto32x4 => Unary(U::WidenLanes { pcast: CmpNEZ32x4 }),
        Widen32Uto64x2 | Widen32Sto64x2 => Unary(U::WidenLanes { pcast: CmpNEZ64x2 }),

        Add32Fx4 | Sub32Fx4 | Mul32Fx4 | Div32Fx4 | Max32Fx4 | Min32Fx4 | CmpEQ32Fx4
        | CmpLT32Fx4 | CmpLE32Fx4 | CmpUN32Fx4 | Add64Fx2 | Sub64Fx2 | Mul64Fx2 | Div64Fx2
        | Max64Fx2 | Min64Fx2 | CmpEQ64Fx2 | CmpLT64Fx2 => Binary(B::Uifu),
        Sqrt32Fx4 | RSqrtEst32Fx4 | RecipEst32Fx4 | Sqrt64Fx2 => Unary(U::Coerce),
        Add32F0x4 | Sub32F0x4 | Mul32F0x4 | Div32F0x4 | Max32F0x4 | Min32F0x4 | CmpEQ32F0x4
        | CmpLT32F0x4 => Binary(B::LowLane32),
        Add64F0x2 | Sub64F0x2 | Mul64F0x2 | Div64F0x2 | Max64F0x2 | Min64F0x2 | CmpEQ64F0x2
        | CmpLT64F0x2 => Binary(B::LowLane64),
        Sqrt32F0x4 | RSqrtEst32F0x4 | RecipEst32F0x4 => Unary(U::LowLane32),
        Sqrt64F0x2 => Unary(U::LowLane64),

        Add8x8 | Add16x4 | Add32x2 | Sub8x8 | Sub16x4 | Sub32x2 | QAdd8Ux8 | Mul16x4
        | MulHi16Sx4 | Avg8Ux8 | Max8Ux8 | Min8Ux8 | CmpEQ8x8 | CmpEQ16x4 | CmpEQ32x2
        | CmpGT8Sx8 => Binary(B::Uifu),
        CmpNEZ8x8 => Unary(U::PCastLanes(CmpNEZ8x8)),
        CmpNEZ16x4 => Unary(U::PCastLanes(CmpNEZ16x4)),
        CmpNEZ32x2 => Unary(U::PCastLanes(CmpNEZ32x2)),
        ShlN16x4 | ShrN16x4 | SarN16x4 | ShlN32x2 | GetElem8x8 => {
            Binary(B::ShadowWithRealSecond)
        }
        InterleaveHI8x8 | InterleaveLO8x8 | CatOddLanes16x4 => Binary(B::Structural),
        Perm8x8 => Binary(B::Perm { pcast: CmpNEZ8x8 }),
        NarrowBin16to8x8 | NarrowBin32to16x4 => Binary(B::Structural),
        QNarrowBin16Sto8Ux8 => Binary(B::NarrowBin {
            pcast: Some(CmpNEZ16x4),
            vanilla: NarrowBin16to8x8,
        }),
        QNarrowBin32Sto16Sx4 => Binary(B::NarrowBin {
            pcast: Some(CmpNEZ32x2),
            vanilla: NarrowBin32to16x4,
        }),
        Slice64 => Ternary(T::RealThird),
        SetElem8x8 | SetElem32x2 => Ternary(T::RealSecond),

        AndV256 | OrV256 | XorV256 | Add8x32 | Add16x16 | Add32x8 | Add64x4 | Sub8x32
        | Sub16x16 | Sub32x8 | Sub64x4 | CmpEQ8x32 | CmpEQ32x8 | CmpGT32Sx8 | Max8Ux32
        | Min8Ux32 | Add32Fx8 | Sub32Fx8 | Mul32Fx8 | Div32Fx8 | Add64Fx4 | Sub64Fx4
        | Mul64Fx4 | Div64Fx4 => Binary(B::Uifu),
        NotV256 | Sqrt32Fx8 | Sqrt64Fx4 => Unary(U::Coerce),
        CmpNEZ32x8 => Unary(U::PCastLanes(CmpNEZ32x8)),
        CmpNEZ64x4 => Unary(U::PCastLanes(CmpNEZ64x4)),
        ShlN16x16 | ShrN32x8 | SarN16x16 => Binary(B::ShadowWithRealSecond),
        Perm32x8 => Binary(B::Perm { pcast: CmpNEZ32x8 }),
        V256toV128_0 | V256toV128_1 | V256to64_0 | V256to64_1 | V256to64_2 | V256to64_3 => {
            Unary(U::Structural)
        }
        V128HLtoV256 => Binary(B::Structural),
        I64x4toV256 => Quaternary(Q::Structural),
    }
}

lazy_static::lazy_static! {
    /// Propagation class of every operator, indexed by discriminant
    static ref CATEGORY_TABLE: Vec<OpCategory> = Op::ALL.iter().map(|op| classify(*op)).collect();
}

/// The propagation class of `op`, from the dense table.
pub fn op_category(op: Op) -> OpCategory {
    CATEGORY_TABLE[op as usize]
}

fn wrong_arity(op: Op, used: usize) -> ! {
    panic!(
        "Operator {} used with {} operands, but is {:?}",
        op.name(),
        used,
        op_category(op)
    )
}

fn result_shadow_type(op: Op) -> Type {
    shadow_type(op.signature().result)
}

/// Label of `op(a)`.
pub fn shadow_unop(env: &mut ShadowEnv, op: Op, a: OrigAtom) -> ShadowAtom {
    let rule = match op_category(op) {
        OpCategory::Unary(r) => r,
        _ => wrong_arity(op, 1),
    };
    let res_ty = result_shadow_type(op);
    let va = env.shadow_of(a);
    let un = |env: &mut ShadowEnv, ty: Type, op: Op, x: ShadowAtom| {
        env.assign_new(ty, Expr::Unop(op, x.atom()))
    };
    match rule {
        UnaryRule::Coerce => coerce(env, va, res_ty),
        UnaryRule::Structural => un(env, res_ty, op, va),
        UnaryRule::Substitute(op2) => un(env, res_ty, op2, va),
        UnaryRule::PCastLanes(lane_op) => pcast_lanes(env, res_ty, lane_op, va),
        UnaryRule::NarrowUn { pcast, vanilla } => {
            let src = match pcast {
                Some(p) => pcast_lanes(env, Type::V128, p, va),
                None => va,
            };
            un(env, res_ty, vanilla, src)
        }
        UnaryRule::WidenLanes { pcast } => {
            let w = un(env, res_ty, op, va);
            pcast_lanes(env, res_ty, pcast, w)
        }
        UnaryRule::LowLane32 => {
            let lo = un(env, Type::I32, Op::V128to32, va);
            env.assign_new(Type::V128, Expr::Binop(Op::SetV128lo32, va.atom(), lo.atom()))
        }
        UnaryRule::LowLane64 => {
            let lo = un(env, Type::I64, Op::V128to64, va);
            env.assign_new(Type::V128, Expr::Binop(Op::SetV128lo64, va.atom(), lo.atom()))
        }
    }
}

/// Label of `op(a1, a2)`.
pub fn shadow_binop(env: &mut ShadowEnv, op: Op, a1: OrigAtom, a2: OrigAtom) -> ShadowAtom {
    let rule = match op_category(op) {
        OpCategory::Binary(r) => r,
        _ => wrong_arity(op, 2),
    };
    let res_ty = result_shadow_type(op);
    let v1 = env.shadow_of(a1);
    let v2 = env.shadow_of(a2);
    let bin = |env: &mut ShadowEnv, ty: Type, op: Op, x: Atom, y: Atom| {
        env.assign_new(ty, Expr::Binop(op, x, y))
    };
    match rule {
        BinaryRule::Uifu => uifu(env, v1, v2),
        BinaryRule::LeftUifu => {
            let u = uifu(env, v1, v2);
            left(env, u)
        }
        BinaryRule::Compare { bogus_sensitive } => {
            let u = uifu(env, v1, v2);
            if bogus_sensitive && env.bogus_literals {
                pcast_to(env, res_ty, u)
            } else {
                coerce(env, u, res_ty)
            }
        }
        BinaryRule::Defined => ShadowAtom::defined(res_ty),
        BinaryRule::Shift => {
            let ty = env.type_of_shadow(&v1);
            let amount = coerce(env, v2, ty);
            uifu(env, v1, amount)
        }
        BinaryRule::Mull => {
            let u = uifu(env, v1, v2);
            let widen = match res_ty {
                Type::I16 => Op::S8to16,
                Type::I32 => Op::S16to32,
                Type::I64 => Op::S32to64,
                Type::I128 => {
                    let l = left(env, u);
                    return bin(env, Type::I128, Op::Hl64to128, l.atom(), l.atom());
                }
                _ => panic!("Unexpected multiply-long result {}", res_ty),
            };
            env.assign_new(res_ty, Expr::Unop(widen, u.atom()))
        }
        BinaryRule::Lazy => lazy2(env, res_ty, v1, v2),
        BinaryRule::Structural => bin(env, res_ty, op, v1.atom(), v2.atom()),
        BinaryRule::Substitute(op2) => bin(env, res_ty, op2, v1.atom(), v2.atom()),
        BinaryRule::ShadowWithRealSecond => bin(env, res_ty, op, v1.atom(), a2.atom()),
        BinaryRule::ShiftByVector { pcast } | BinaryRule::Perm { pcast } => {
            let moved = bin(env, res_ty, op, v1.atom(), a2.atom());
            let p = pcast_lanes(env, res_ty, pcast, v2);
            uifu(env, moved, p)
        }
        BinaryRule::NarrowBin { pcast, vanilla } => match pcast {
            Some(p) => {
                let ty = env.type_of_shadow(&v1);
                let p1 = pcast_lanes(env, ty, p, v1);
                let p2 = pcast_lanes(env, ty, p, v2);
                bin(env, res_ty, vanilla, p1.atom(), p2.atom())
            }
            None => bin(env, res_ty, vanilla, v1.atom(), v2.atom()),
        },
        BinaryRule::LowLane32 => {
            let u = uifu(env, v1, v2);
            let lo = env.assign_new(Type::I32, Expr::Unop(Op::V128to32, u.atom()));
            bin(env, Type::V128, Op::SetV128lo32, v1.atom(), lo.atom())
        }
        BinaryRule::LowLane64 => {
            let u = uifu(env, v1, v2);
            let lo = env.assign_new(Type::I64, Expr::Unop(Op::V128to64, u.atom()));
            bin(env, Type::V128, Op::SetV128lo64, v1.atom(), lo.atom())
        }
    }
}

/// Label of `op(a1, a2, a3)`.
pub fn shadow_triop(
    env: &mut ShadowEnv,
    op: Op,
    a1: OrigAtom,
    a2: OrigAtom,
    a3: OrigAtom,
) -> ShadowAtom {
    let rule = match op_category(op) {
        OpCategory::Ternary(r) => r,
        _ => wrong_arity(op, 3),
    };
    let res_ty = result_shadow_type(op);
    match rule {
        TernaryRule::Lazy => {
            let v1 = env.shadow_of(a1);
            let v2 = env.shadow_of(a2);
            let v3 = env.shadow_of(a3);
            lazy3(env, res_ty, v1, v2, v3)
        }
        TernaryRule::RealThird => {
            let v1 = env.shadow_of(a1);
            let v2 = env.shadow_of(a2);
            env.assign_new(res_ty, Expr::Triop(op, v1.atom(), v2.atom(), a3.atom()))
        }
        TernaryRule::RealSecond => {
            let v1 = env.shadow_of(a1);
            let v3 = env.shadow_of(a3);
            env.assign_new(res_ty, Expr::Triop(op, v1.atom(), a2.atom(), v3.atom()))
        }
    }
}

/// Label of `op(a1, a2, a3, a4)`.
pub fn shadow_qop(
    env: &mut ShadowEnv,
    op: Op,
    a1: OrigAtom,
    a2: OrigAtom,
    a3: OrigAtom,
    a4: OrigAtom,
) -> ShadowAtom {
    let rule = match op_category(op) {
        OpCategory::Quaternary(r) => r,
        _ => wrong_arity(op, 4),
    };
    let res_ty = result_shadow_type(op);
    let v1 = env.shadow_of(a1);
    let v2 = env.shadow_of(a2);
    let v3 = env.shadow_of(a3);
    let v4 = env.shadow_of(a4);
    match rule {
        QuaternaryRule::Lazy => lazy4(env, res_ty, v1, v2, v3, v4),
        QuaternaryRule::Structural => env.assign_new(
            res_ty,
            Expr::Qop(op, v1.atom(), v2.atom(), v3.atom(), v4.atom()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_match_signatures() {
        for op in Op::ALL {
            assert_eq!(
                op_category(*op).arity(),
                op.signature().arity(),
                "{:?} is classified as {:?}",
                op,
                op_category(*op)
            );
        }
    }

    #[test]
    fn vector_abs_pessimises_each_lane() {
        for (op, lanes) in [
            (Op::Abs8x16, Op::CmpNEZ8x16),
            (Op::Abs16x8, Op::CmpNEZ16x8),
            (Op::Abs32x4, Op::CmpNEZ32x4),
        ] {
            assert_eq!(
                op_category(op),
                OpCategory::Unary(UnaryRule::PCastLanes(lanes))
            );
        }
    }

    #[test]
    fn table_agrees_with_classification() {
        for op in Op::ALL {
            assert_eq!(op_category(*op), classify(*op));
        }
    }

    #[test]
    fn substitutes_and_pcasts_fit_shadow_types() {
        for op in Op::ALL.iter().copied() {
            let sig = op.signature();
            let shadow_args: Vec<Type> = sig.args.iter().map(|t| shadow_type(*t)).collect();
            match op_category(op) {
                OpCategory::Unary(UnaryRule::Substitute(s))
                | OpCategory::Binary(BinaryRule::Substitute(s)) => {
                    assert_eq!(s.signature().args, &shadow_args[..], "{:?}", op);
                    assert_eq!(s.signature().result, shadow_type(sig.result), "{:?}", op);
                }
                OpCategory::Unary(UnaryRule::Structural)
                | OpCategory::Binary(BinaryRule::Structural) => {
                    assert_eq!(sig.args, &shadow_args[..], "{:?}", op);
                    assert_eq!(sig.result, shadow_type(sig.result), "{:?}", op);
                }
                OpCategory::Unary(UnaryRule::PCastLanes(p))
                | OpCategory::Unary(UnaryRule::WidenLanes { pcast: p })
                | OpCategory::Binary(BinaryRule::ShiftByVector { pcast: p })
                | OpCategory::Binary(BinaryRule::Perm { pcast: p }) => {
                    let res = shadow_type(sig.result);
                    assert_eq!(p.signature().args, &[res], "{:?}", op);
                    assert_eq!(p.signature().result, res, "{:?}", op);
                }
                _ => {}
            }
        }
    }
}
