//! Shadowing of memory accesses.
//!
//! Labels of memory live in shadow memory, outside the guest's view, and are accessed only
//! through helper calls: a load's label comes from a `LOADV*` helper and a store's label goes to a
//! `STOREV*` helper. This is the only path by which taint moves between memory and temporaries.

use crate::ir::{Atom, Callee, Const, Dirty, DirtyArg, Endness, Expr, Stmt, Type};
use crate::ops::Op;
use crate::shadow_env::ShadowEnv;
use crate::shadow_temps::{OrigAtom, ShadowAtom};
use crate::shadow_types::shadow_type;
use std::fmt;

/// A shadow memory helper.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HelperKind {
    /// Read the label of `size` bytes at an address
    Load { size: u32, end: Endness },
    /// Write the label of `size` bytes at an address
    Store { size: u32, end: Endness },
}

impl HelperKind {
    /// The load helper for a value of type `ty`.
    pub fn load(end: Endness, ty: Type) -> Self {
        let size = ty.size_bytes();
        assert!(
            matches!(size, 1 | 2 | 4 | 8 | 16 | 32),
            "No shadow load helper for type {}",
            ty
        );
        HelperKind::Load {
            size,
            end: if size == 1 { Endness::Little } else { end },
        }
    }

    /// The store helper for `size` bytes. Wider stores are split by the caller.
    pub fn store(end: Endness, size: u32) -> Self {
        assert!(
            matches!(size, 1 | 2 | 4 | 8),
            "No shadow store helper for {} bytes",
            size
        );
        HelperKind::Store {
            size,
            end: if size == 1 { Endness::Little } else { end },
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            HelperKind::Load { size, .. } | HelperKind::Store { size, .. } => *size,
        }
    }

    pub fn end(&self) -> Endness {
        match self {
            HelperKind::Load { end, .. } | HelperKind::Store { end, .. } => *end,
        }
    }

    pub fn name(&self) -> String {
        let (prefix, size, end) = match self {
            HelperKind::Load { size, end } => ("LOADV", size, end),
            HelperKind::Store { size, end } => ("STOREV", size, end),
        };
        if *size == 1 {
            format!("{}8", prefix)
        } else {
            format!("{}{}{}", prefix, size * 8, end)
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let (is_load, rest) = if let Some(r) = name.strip_prefix("LOADV") {
            (true, r)
        } else if let Some(r) = name.strip_prefix("STOREV") {
            (false, r)
        } else {
            return None;
        };
        let (bits, end) = if rest == "8" {
            ("8", Endness::Little)
        } else if let Some(b) = rest.strip_suffix("le") {
            (b, Endness::Little)
        } else if let Some(b) = rest.strip_suffix("be") {
            (b, Endness::Big)
        } else {
            return None;
        };
        let size = bits.parse::<u32>().ok()? / 8;
        let valid = if is_load {
            matches!(size, 1 | 2 | 4 | 8 | 16 | 32)
        } else {
            matches!(size, 1 | 2 | 4 | 8)
        };
        if !valid || (size == 1) != (rest == "8") {
            return None;
        }
        Some(if is_load {
            HelperKind::Load { size, end }
        } else {
            HelperKind::Store { size, end }
        })
    }

    pub fn callee(&self) -> Callee {
        Callee {
            name: self.name(),
            regparms: if matches!(self, HelperKind::Load { .. }) {
                1
            } else {
                2
            },
            mcx_mask: 0,
        }
    }
}

impl fmt::Display for HelperKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn guard_atom(guard: Option<OrigAtom>) -> Atom {
    guard.map(|g| g.atom()).unwrap_or(Atom::u1(true))
}

/// The effective address `addr + bias`, as a real host-word value.
fn effective_address(env: &mut ShadowEnv, addr: OrigAtom, bias: u64) -> OrigAtom {
    let host = env.host_word;
    let ty = env.type_of_orig(&addr);
    assert_eq!(
        ty, host,
        "Memory address of type {} on a {} host",
        ty, host
    );
    if bias == 0 {
        return addr;
    }
    let c = match host {
        Type::I32 => Const::U32(bias as u32),
        Type::I64 => Const::U64(bias),
        _ => panic!("Unsupported host word type {}", host),
    };
    env.assign_new_orig(host, Expr::Binop(Op::add_for(host), addr.atom(), c.into()))
}

/// Label of a load of type `ty` from `addr + bias`, read from shadow memory. With a guard, the
/// helper is only called when the guard holds.
pub fn shadow_load(
    env: &mut ShadowEnv,
    end: Endness,
    ty: Type,
    addr: OrigAtom,
    bias: u64,
    guard: Option<OrigAtom>,
) -> ShadowAtom {
    let sty = shadow_type(ty);
    let ea = effective_address(env, addr, bias);
    let helper = HelperKind::load(end, ty);
    let mut args = vec![];
    if matches!(sty, Type::V128 | Type::V256 | Type::I128) {
        args.push(DirtyArg::VecRet);
    }
    args.push(DirtyArg::Atom(ea.atom()));
    let dst = env.new_shadow_temp(sty);
    let mut d = Dirty::new(helper.callee(), args);
    d.guard = guard_atom(guard);
    d.tmp = Some(dst);
    env.emit_shadow(Stmt::Dirty(d));
    ShadowAtom::from_shadow_temp(dst)
}

fn store_helper_call(
    env: &mut ShadowEnv,
    end: Endness,
    size: u32,
    addr: OrigAtom,
    data: ShadowAtom,
    guard: Option<OrigAtom>,
) {
    let helper = HelperKind::store(end, size);
    let mut d = Dirty::with_atoms(helper.callee(), [addr.atom(), data.atom()]);
    d.guard = guard_atom(guard);
    env.emit_shadow(Stmt::Dirty(d));
}

/// Write label `vdata` to shadow memory at `addr + bias`. Labels wider than 64 bits are written as
/// 64-bit pieces, laid out according to `end`.
pub fn shadow_store(
    env: &mut ShadowEnv,
    end: Endness,
    addr: OrigAtom,
    bias: u64,
    vdata: ShadowAtom,
    guard: Option<OrigAtom>,
) {
    let ty = env.type_of_shadow(&vdata);
    let pieces: Vec<Op> = match ty {
        Type::V256 => vec![Op::V256to64_0, Op::V256to64_1, Op::V256to64_2, Op::V256to64_3],
        Type::V128 => vec![Op::V128to64, Op::V128HIto64],
        Type::I128 => vec![Op::Trunc128to64, Op::Hi128to64],
        _ => vec![],
    };
    if pieces.is_empty() {
        let ea = effective_address(env, addr, bias);
        let data = widen_to_host_word(env, vdata);
        store_helper_call(env, end, ty.size_bytes(), ea, data, guard);
        return;
    }
    let n = pieces.len() as u64;
    for (i, op) in pieces.into_iter().enumerate() {
        let i = i as u64;
        let offset = match end {
            Endness::Little => 8 * i,
            Endness::Big => 8 * (n - 1 - i),
        };
        let piece = env.assign_new(Type::I64, Expr::Unop(op, vdata.atom()));
        let ea = effective_address(env, addr, bias + offset);
        store_helper_call(env, end, 8, ea, piece, guard);
    }
}

/// Zero-widen a label narrower than the host word to the host word.
fn widen_to_host_word(env: &mut ShadowEnv, v: ShadowAtom) -> ShadowAtom {
    let ty = env.type_of_shadow(&v);
    let op = match (ty, env.host_word) {
        (Type::I8, Type::I32) => Op::U8to32,
        (Type::I16, Type::I32) => Op::U16to32,
        (Type::I8, Type::I64) => Op::U8to64,
        (Type::I16, Type::I64) => Op::U16to64,
        (Type::I32, Type::I64) => Op::U32to64,
        _ => return v,
    };
    let host = env.host_word;
    env.assign_new(host, Expr::Unop(op, v.atom()))
}

/// Label of a guarded load: the loaded label widened by `cvt`, or `valt` when the guard is false.
/// The guard selects by its real value; its own label does not flow into the result.
#[allow(clippy::too_many_arguments)]
pub fn shadow_load_guarded(
    env: &mut ShadowEnv,
    end: Endness,
    ty: Type,
    addr: OrigAtom,
    bias: u64,
    guard: OrigAtom,
    cvt: Option<Op>,
    valt: ShadowAtom,
) -> ShadowAtom {
    let loaded = shadow_load(env, end, ty, addr, bias, Some(guard));
    let widened = match cvt {
        None => loaded,
        Some(op) => {
            let rty = shadow_type(op.signature().result);
            env.assign_new(rty, Expr::Unop(op, loaded.atom()))
        }
    };
    let rty = env.type_of_shadow(&widened);
    let alt_ty = env.type_of_shadow(&valt);
    assert_eq!(
        rty, alt_ty,
        "Guarded load of {} with alternative of type {}",
        rty, alt_ty
    );
    env.assign_new(
        rty,
        Expr::Ite {
            cond: guard.atom(),
            iftrue: widened.atom(),
            iffalse: valt.atom(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_names() {
        assert_eq!(HelperKind::load(Endness::Little, Type::I32).name(), "LOADV32le");
        assert_eq!(HelperKind::load(Endness::Big, Type::V256).name(), "LOADV256be");
        assert_eq!(HelperKind::load(Endness::Big, Type::I8).name(), "LOADV8");
        assert_eq!(HelperKind::store(Endness::Big, 2).name(), "STOREV16be");
        assert_eq!(HelperKind::store(Endness::Little, 1).name(), "STOREV8");
        assert_eq!(HelperKind::load(Endness::Little, Type::F64).size(), 8);
    }

    #[test]
    fn helper_names_parse_back() {
        for end in [Endness::Little, Endness::Big] {
            for ty in [Type::I8, Type::I16, Type::I32, Type::I64, Type::V128, Type::V256] {
                let h = HelperKind::load(end, ty);
                assert_eq!(HelperKind::from_name(&h.name()), Some(h));
            }
            for size in [1, 2, 4, 8] {
                let h = HelperKind::store(end, size);
                assert_eq!(HelperKind::from_name(&h.name()), Some(h));
            }
        }
        assert_eq!(HelperKind::from_name("STOREV128le"), None);
        assert_eq!(HelperKind::from_name("LOADV8le"), None);
        assert_eq!(HelperKind::from_name("helperc_1_tainted_enc64"), None);
    }

    #[test]
    #[should_panic(expected = "No shadow store helper")]
    fn no_wide_store_helper() {
        HelperKind::store(Endness::Little, 16);
    }
}
