//! Taint propagation through opaque helper calls.
//!
//! A dirty call is a black box with declared side effects, so its taint is handled by collapsing
//! every input label into one 32-bit accumulator and broadcasting that accumulator to every
//! output.

use crate::guest_state::{is_always_defined, shadow_put};
use crate::ir::{Atom, Const, Dirty, DirtyArg, Endness, Expr, GuestEffect, Stmt, Type};
use crate::log::*;
use crate::memory::{shadow_load, shadow_store};
use crate::shadow_env::ShadowEnv;
use crate::shadow_ops::{coerce, excluded_by_mask, uifu};
use crate::shadow_temps::{OrigAtom, ShadowAtom};
use crate::shadow_types::shadow_type;

/// Split `[offset, offset+size)` into chunks of at most 8 bytes, each a power of two in size.
pub fn guest_chunks(offset: u32, size: u32) -> Vec<(u32, u32)> {
    let mut r = vec![];
    let (mut off, mut left) = (offset, size);
    while left > 0 {
        let n = [8, 4, 2, 1]
            .into_iter()
            .find(|n| *n <= left)
            .unwrap_or(1);
        r.push((off, n));
        off += n;
        left -= n;
    }
    r
}

/// Split a memory range of `size` bytes into 4-byte pieces, then at most one 2-byte piece, then
/// at most one 1-byte piece, as `(offset, type)`.
pub fn memory_pieces(size: u32) -> Vec<(u32, Type)> {
    let mut r = vec![];
    let mut off = 0;
    while size - off >= 4 {
        r.push((off, Type::I32));
        off += 4;
    }
    if size - off >= 2 {
        r.push((off, Type::I16));
        off += 2;
    }
    if size - off >= 1 {
        r.push((off, Type::I8));
    }
    r
}

fn guard_of(d: &Dirty) -> Option<OrigAtom> {
    match d.guard {
        Atom::Const(Const::U1(true)) => None,
        g => Some(OrigAtom::new(g)),
    }
}

fn guest_segments(effects: &[GuestEffect], reads: bool) -> Vec<(u32, u32)> {
    effects
        .iter()
        .filter(|e| if reads { e.fx.reads() } else { e.fx.writes() })
        .flat_map(|e| e.segments().collect::<Vec<_>>())
        .flat_map(|(off, size)| guest_chunks(off, size))
        .collect()
}

/// Merge every label the call reads into an `I32` accumulator.
fn fan_in(env: &mut ShadowEnv, d: &Dirty) -> ShadowAtom {
    let guard = guard_of(d);
    let mut curr = ShadowAtom::defined(Type::I32);

    for (i, arg) in d.args.iter().enumerate() {
        if let DirtyArg::Atom(a) = arg {
            if excluded_by_mask(d.callee.mcx_mask, i) {
                continue;
            }
            let v = env.shadow_of(OrigAtom::new(*a));
            let here = coerce(env, v, Type::I32);
            curr = uifu(env, curr, here);
        }
    }

    for (off, n) in guest_segments(&d.effects.guest, true) {
        if is_always_defined(env.layout, off, n) {
            trace!("Skipping always-defined guest read"; "offset" => off, "size" => n);
            continue;
        }
        let ty = Type::integer_of_size(n);
        let src = env.assign_new(
            ty,
            Expr::Get {
                offset: off + env.layout.total_size,
                ty,
            },
        );
        let cond = match guard {
            None => src,
            Some(g) => env.assign_new(
                ty,
                Expr::Ite {
                    cond: g.atom(),
                    iftrue: src.atom(),
                    iffalse: ShadowAtom::defined(ty).atom(),
                },
            ),
        };
        let here = coerce(env, cond, Type::I32);
        curr = uifu(env, curr, here);
    }

    if let Some(m) = &d.effects.mem {
        if m.fx.reads() {
            let addr = OrigAtom::new(m.addr);
            for (off, ty) in memory_pieces(m.size) {
                let v = shadow_load(env, Endness::Little, ty, addr, off as u64, guard);
                let here = coerce(env, v, Type::I32);
                curr = uifu(env, curr, here);
            }
        }
    }

    curr
}

/// Broadcast the accumulated label to every output of the call.
fn fan_out(env: &mut ShadowEnv, d: &Dirty, curr: ShadowAtom) {
    let guard = guard_of(d);

    if let Some(t) = d.tmp {
        let sty = shadow_type(env.out().tyenv.type_of(t));
        let v = coerce(env, curr, sty);
        env.bind_shadow(t, v);
    }

    for (off, n) in guest_segments(&d.effects.guest, false) {
        if is_always_defined(env.layout, off, n) {
            continue;
        }
        let v = coerce(env, curr, Type::integer_of_size(n));
        shadow_put(env, off, v, guard);
    }

    if let Some(m) = &d.effects.mem {
        if m.fx.writes() {
            let addr = OrigAtom::new(m.addr);
            for (off, ty) in memory_pieces(m.size) {
                let v = coerce(env, curr, ty);
                shadow_store(env, Endness::Little, addr, off as u64, v, guard);
            }
        }
    }
}

/// Instrument a dirty call: the call itself, then its shadow.
pub fn shadow_dirty(env: &mut ShadowEnv, d: &Dirty) {
    env.emit_orig(Stmt::Dirty(d.clone()));
    let curr = fan_in(env, d);
    fan_out(env, d, curr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_chunks_are_powers_of_two() {
        assert_eq!(guest_chunks(16, 8), vec![(16, 8)]);
        assert_eq!(guest_chunks(16, 16), vec![(16, 8), (24, 8)]);
        assert_eq!(guest_chunks(0, 7), vec![(0, 4), (4, 2), (6, 1)]);
        assert_eq!(guest_chunks(0, 12), vec![(0, 8), (8, 4)]);
        assert!(guest_chunks(0, 0).is_empty());
    }

    #[test]
    fn memory_pieces_descend() {
        assert_eq!(
            memory_pieces(11),
            vec![
                (0, Type::I32),
                (4, Type::I32),
                (8, Type::I16),
                (10, Type::I8)
            ]
        );
        assert_eq!(memory_pieces(4), vec![(0, Type::I32)]);
        assert_eq!(memory_pieces(1), vec![(0, Type::I8)]);
    }
}
