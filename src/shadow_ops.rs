//! Primitive shadow computations: merges, casts and width conversions of taint labels.
//!
//! All functions emit flat shadow statements into the environment and return the resulting
//! label atom. Narrowing conversions fold the discarded bits into the kept ones with OR, so a
//! label never loses a set bit on the way down.

use crate::ir::{Expr, Type};
use crate::ops::Op;
use crate::shadow_env::ShadowEnv;
use crate::shadow_temps::{OrigAtom, ShadowAtom};

fn unop(env: &mut ShadowEnv, ty: Type, op: Op, a: ShadowAtom) -> ShadowAtom {
    env.assign_new(ty, Expr::Unop(op, a.atom()))
}

fn binop(env: &mut ShadowEnv, ty: Type, op: Op, a: ShadowAtom, b: ShadowAtom) -> ShadowAtom {
    env.assign_new(ty, Expr::Binop(op, a.atom(), b.atom()))
}

/// Pessimistic merge: the bitwise OR of two labels of the same type.
pub fn uifu(env: &mut ShadowEnv, a: ShadowAtom, b: ShadowAtom) -> ShadowAtom {
    let ty = env.type_of_shadow(&a);
    let tyb = env.type_of_shadow(&b);
    assert_eq!(ty, tyb, "Merging labels of types {} and {}", ty, tyb);
    match ty {
        Type::I128 => {
            let ahi = unop(env, Type::I64, Op::Hi128to64, a);
            let alo = unop(env, Type::I64, Op::Trunc128to64, a);
            let bhi = unop(env, Type::I64, Op::Hi128to64, b);
            let blo = unop(env, Type::I64, Op::Trunc128to64, b);
            let hi = binop(env, Type::I64, Op::Or64, ahi, bhi);
            let lo = binop(env, Type::I64, Op::Or64, alo, blo);
            binop(env, Type::I128, Op::Hl64to128, hi, lo)
        }
        _ => binop(env, ty, Op::or_for(ty), a, b),
    }
}

/// Smear a label leftwards: every bit at or above the lowest set bit becomes set.
pub fn left(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    let ty = env.type_of_shadow(&a);
    let op = match ty {
        Type::I8 => Op::Left8,
        Type::I16 => Op::Left16,
        Type::I32 => Op::Left32,
        Type::I64 => Op::Left64,
        _ => panic!("No Left operator at type {}", ty),
    };
    unop(env, ty, op, a)
}

/// Per-lane pessimisation: every lane with any bit set becomes all-ones.
pub fn pcast_lanes(env: &mut ShadowEnv, ty: Type, lane_op: Op, a: ShadowAtom) -> ShadowAtom {
    unop(env, ty, lane_op, a)
}

/// Whole-value pessimisation: all-ones of type `ty` if any bit of `a` is set, else zero.
pub fn pcast_to(env: &mut ShadowEnv, ty: Type, a: ShadowAtom) -> ShadowAtom {
    let src_ty = env.type_of_shadow(&a);
    let a = match src_ty {
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => a,
        _ => convert_to_64(env, a),
    };
    let src_ty = env.type_of_shadow(&a);
    let any = env.assign_new(Type::I1, Expr::Unop(Op::cmp_nez_for(src_ty), a.atom()));
    match ty {
        Type::I8 => unop(env, ty, Op::S1to8, any),
        Type::I16 => unop(env, ty, Op::S1to16, any),
        Type::I32 => unop(env, ty, Op::S1to32, any),
        Type::I64 => unop(env, ty, Op::S1to64, any),
        _ => {
            let w = unop(env, Type::I64, Op::S1to64, any);
            coerce(env, w, ty)
        }
    }
}

/// Zero-extend a label of at most 64 bits to 64 bits.
pub fn widen_to_64(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    match env.type_of_shadow(&a) {
        Type::I8 => unop(env, Type::I64, Op::U8to64, a),
        Type::I16 => unop(env, Type::I64, Op::U16to64, a),
        Type::I32 => unop(env, Type::I64, Op::U32to64, a),
        Type::I64 => a,
        ty => panic!("Cannot widen label of type {} to 64 bits", ty),
    }
}

/// Widen a label of at most 64 bits to 128 bits, replicating it into both halves.
pub fn widen_to_128(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    let w = widen_to_64(env, a);
    binop(env, Type::I128, Op::Hl64to128, w, w)
}

/// Fold a label of at least 64 bits down to 64 bits.
pub fn convert_to_64(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    match env.type_of_shadow(&a) {
        Type::I64 => a,
        Type::I128 => {
            let hi = unop(env, Type::I64, Op::Hi128to64, a);
            let lo = unop(env, Type::I64, Op::Trunc128to64, a);
            binop(env, Type::I64, Op::Or64, hi, lo)
        }
        Type::V128 => {
            let hi = unop(env, Type::I64, Op::V128HIto64, a);
            let lo = unop(env, Type::I64, Op::V128to64, a);
            binop(env, Type::I64, Op::Or64, hi, lo)
        }
        Type::V256 => {
            let v = convert_to_v128(env, a);
            convert_to_64(env, v)
        }
        Type::I8 | Type::I16 | Type::I32 => widen_to_64(env, a),
        ty => panic!("Cannot convert label of type {} to 64 bits", ty),
    }
}

/// Convert any label to 32 bits, zero-extending narrower ones and folding wider ones.
pub fn convert_to_32(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    match env.type_of_shadow(&a) {
        Type::I8 => unop(env, Type::I32, Op::U8to32, a),
        Type::I16 => unop(env, Type::I32, Op::U16to32, a),
        Type::I32 => a,
        Type::I64 => {
            let hi = unop(env, Type::I32, Op::Hi64to32, a);
            let lo = unop(env, Type::I32, Op::Trunc64to32, a);
            binop(env, Type::I32, Op::Or32, hi, lo)
        }
        Type::I128 | Type::V128 | Type::V256 => {
            let w = convert_to_64(env, a);
            convert_to_32(env, w)
        }
        ty => panic!("Cannot convert label of type {} to 32 bits", ty),
    }
}

fn convert_to_v128(env: &mut ShadowEnv, a: ShadowAtom) -> ShadowAtom {
    match env.type_of_shadow(&a) {
        Type::V128 => a,
        Type::V256 => {
            let hi = unop(env, Type::V128, Op::V256toV128_1, a);
            let lo = unop(env, Type::V128, Op::V256toV128_0, a);
            binop(env, Type::V128, Op::OrV128, hi, lo)
        }
        Type::I128 => {
            let hi = unop(env, Type::I64, Op::Hi128to64, a);
            let lo = unop(env, Type::I64, Op::Trunc128to64, a);
            binop(env, Type::V128, Op::Hl64toV128, hi, lo)
        }
        _ => {
            let w = widen_to_64(env, a);
            binop(env, Type::V128, Op::Hl64toV128, w, w)
        }
    }
}

/// Convert a label to shadow type `ty`.
pub fn coerce(env: &mut ShadowEnv, a: ShadowAtom, ty: Type) -> ShadowAtom {
    let from = env.type_of_shadow(&a);
    if from == ty {
        return a;
    }
    match ty {
        Type::I8 => {
            let h = coerce(env, a, Type::I16);
            let hi = unop(env, Type::I8, Op::Hi16to8, h);
            let lo = unop(env, Type::I8, Op::Trunc16to8, h);
            binop(env, Type::I8, Op::Or8, hi, lo)
        }
        Type::I16 => match from {
            Type::I8 => unop(env, Type::I16, Op::U8to16, a),
            _ => {
                let w = convert_to_32(env, a);
                let hi = unop(env, Type::I16, Op::Hi32to16, w);
                let lo = unop(env, Type::I16, Op::Trunc32to16, w);
                binop(env, Type::I16, Op::Or16, hi, lo)
            }
        },
        Type::I32 => convert_to_32(env, a),
        Type::I64 => convert_to_64(env, a),
        Type::I128 => match from {
            Type::V128 | Type::V256 => {
                let v = convert_to_v128(env, a);
                let hi = unop(env, Type::I64, Op::V128HIto64, v);
                let lo = unop(env, Type::I64, Op::V128to64, v);
                binop(env, Type::I128, Op::Hl64to128, hi, lo)
            }
            _ => widen_to_128(env, a),
        },
        Type::V128 => convert_to_v128(env, a),
        Type::V256 => {
            let v = convert_to_v128(env, a);
            binop(env, Type::V256, Op::V128HLtoV256, v, v)
        }
        _ => panic!("Cannot coerce label of type {} to {}", from, ty),
    }
}

/// Lazy merge of labels of possibly differing widths into a label of shadow type `final_ty`. The
/// merge runs at 64 bits if `final_ty` or every operand is 64 bits wide, else at 32 bits.
pub fn lazy(env: &mut ShadowEnv, final_ty: Type, args: &[ShadowAtom]) -> ShadowAtom {
    assert!(!args.is_empty(), "Lazy merge of no labels");
    let all_64 = args.iter().all(|a| env.type_of_shadow(a) == Type::I64);
    let merge_ty = if final_ty == Type::I64 || all_64 {
        Type::I64
    } else {
        Type::I32
    };
    let mut acc = coerce(env, args[0], merge_ty);
    for a in &args[1..] {
        let here = coerce(env, *a, merge_ty);
        acc = uifu(env, acc, here);
    }
    coerce(env, acc, final_ty)
}

pub fn lazy2(env: &mut ShadowEnv, final_ty: Type, a1: ShadowAtom, a2: ShadowAtom) -> ShadowAtom {
    lazy(env, final_ty, &[a1, a2])
}

pub fn lazy3(
    env: &mut ShadowEnv,
    final_ty: Type,
    a1: ShadowAtom,
    a2: ShadowAtom,
    a3: ShadowAtom,
) -> ShadowAtom {
    lazy(env, final_ty, &[a1, a2, a3])
}

pub fn lazy4(
    env: &mut ShadowEnv,
    final_ty: Type,
    a1: ShadowAtom,
    a2: ShadowAtom,
    a3: ShadowAtom,
    a4: ShadowAtom,
) -> ShadowAtom {
    lazy(env, final_ty, &[a1, a2, a3, a4])
}

/// Lazy merge over the arguments of a helper call. Bit `i` of `mcx_mask` excludes argument `i`.
/// The merge runs at 64 bits only if every included argument is an `I64`.
pub fn lazy_n(
    env: &mut ShadowEnv,
    final_ty: Type,
    args: &[OrigAtom],
    mcx_mask: u32,
) -> ShadowAtom {
    let included: Vec<OrigAtom> = args
        .iter()
        .enumerate()
        .filter(|(i, _)| !excluded_by_mask(mcx_mask, *i))
        .map(|(_, a)| *a)
        .collect();
    let all_64 = !included.is_empty()
        && included.iter().all(|a| env.type_of_orig(a) == Type::I64);
    let merge_ty = if all_64 { Type::I64 } else { Type::I32 };
    let mut acc = ShadowAtom::defined(merge_ty);
    for a in included {
        let v = env.shadow_of(a);
        let here = coerce(env, v, merge_ty);
        acc = uifu(env, acc, here);
    }
    coerce(env, acc, final_ty)
}

/// Whether bit `i` of a helper's exclusion mask is set.
pub fn excluded_by_mask(mcx_mask: u32, i: usize) -> bool {
    i < 32 && mcx_mask & (1 << i) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentConfig;
    use crate::ir::{Atom, Block, Const, GuestLayout, JumpKind, Stmt};

    fn layout() -> GuestLayout {
        GuestLayout {
            total_size: 256,
            offset_sp: 48,
            sizeof_sp: 8,
            offset_ip: 184,
            sizeof_ip: 8,
            always_defined: vec![],
        }
    }

    fn with_env<R>(f: impl FnOnce(&mut ShadowEnv) -> R) -> R {
        let block = Block::new(Atom::u64(0x1000), JumpKind::Boring, 184);
        let layout = layout();
        let config = InstrumentConfig::default();
        let mut env = ShadowEnv::new(&block, &layout, Type::I64, &config);
        let r = f(&mut env);
        env.out().try_confirm_valid().unwrap();
        r
    }

    #[test]
    fn uifu_is_typed_at_operand_width() {
        for ty in [
            Type::I8,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::I128,
            Type::V128,
            Type::V256,
        ] {
            with_env(|env| {
                let a = ShadowAtom::defined(ty);
                let r = uifu(env, a, a);
                assert_eq!(env.type_of_shadow(&r), ty);
            });
        }
    }

    #[test]
    fn coerce_reaches_every_shadow_type() {
        let tys = [
            Type::I8,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::I128,
            Type::V128,
            Type::V256,
        ];
        for from in tys {
            for to in tys {
                with_env(|env| {
                    let r = coerce(env, ShadowAtom::label(Const::zero_of(from)), to);
                    assert_eq!(env.type_of_shadow(&r), to, "{} -> {}", from, to);
                });
            }
        }
    }

    #[test]
    fn lazy_merge_width() {
        with_env(|env| {
            let n = env.out().stmts.len();
            lazy2(
                env,
                Type::I64,
                ShadowAtom::defined(Type::I64),
                ShadowAtom::defined(Type::I64),
            );
            // A single OR at 64 bits, nothing else
            assert_eq!(env.out().stmts.len(), n + 1);
        });
        with_env(|env| {
            let r = lazy2(
                env,
                Type::I32,
                ShadowAtom::defined(Type::I32),
                ShadowAtom::defined(Type::I64),
            );
            assert_eq!(env.type_of_shadow(&r), Type::I32);
        });
    }

    #[test]
    fn masked_arguments_are_skipped() {
        assert!(excluded_by_mask(0b10, 1));
        assert!(!excluded_by_mask(0b10, 0));
        assert!(!excluded_by_mask(u32::MAX, 40));
        with_env(|env| {
            let before = env.out().stmts.len();
            let r = lazy_n(
                env,
                Type::I32,
                &[OrigAtom::new(Atom::u32(1)), OrigAtom::new(Atom::u32(2))],
                0b11,
            );
            assert_eq!(env.out().stmts.len(), before);
            assert_eq!(r, ShadowAtom::defined(Type::I32));
        });
    }

    fn binops_emitted(env: &ShadowEnv) -> Vec<Op> {
        env.out()
            .stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::WrTmp {
                    data: Expr::Binop(op, ..),
                    ..
                } => Some(*op),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn helper_merge_width_follows_real_argument_types() {
        // F64 labels are 64 bits wide, but only I64 arguments merge at 64 bits.
        with_env(|env| {
            let f = OrigAtom::new(Atom::Const(Const::F64(0)));
            lazy_n(env, Type::I64, &[f, f], 0);
            let ops = binops_emitted(env);
            assert!(ops.contains(&Op::Or32), "{:?}", ops);
            assert!(!ops.contains(&Op::Or64), "{:?}", ops);
        });
        with_env(|env| {
            let i = OrigAtom::new(Atom::u64(0));
            lazy_n(env, Type::I64, &[i, i], 0);
            let ops = binops_emitted(env);
            assert!(ops.contains(&Op::Or64), "{:?}", ops);
            assert!(!ops.contains(&Op::Or32), "{:?}", ops);
        });
    }
}
