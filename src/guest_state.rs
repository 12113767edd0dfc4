//! Shadowing of the guest register file.
//!
//! The shadow of the register at offset `o` lives at offset `o + layout.total_size`, in a shadow
//! register file of the same shape laid out directly after the real one.

use crate::ir::{Expr, GuestLayout, RegArray, Stmt, Type};
use crate::shadow_env::ShadowEnv;
use crate::shadow_temps::{OrigAtom, ShadowAtom};
use crate::shadow_types::shadow_type;

/// The shadow counterpart of a register array.
pub fn shadow_descr(layout: &GuestLayout, descr: &RegArray) -> RegArray {
    RegArray {
        base: descr.base + layout.total_size,
        elem_ty: shadow_type(descr.elem_ty),
        n_elems: descr.n_elems,
    }
}

/// Label of the register of type `ty` at `offset`.
pub fn shadow_get(env: &mut ShadowEnv, offset: u32, ty: Type) -> ShadowAtom {
    let sty = shadow_type(ty);
    let offset = offset + env.layout.total_size;
    env.assign_new(sty, Expr::Get { offset, ty: sty })
}

/// Write label `v` to the shadow of the register at `offset`. With a guard, the previous label is
/// kept when the guard is false.
pub fn shadow_put(env: &mut ShadowEnv, offset: u32, v: ShadowAtom, guard: Option<OrigAtom>) {
    let shadow_offset = offset + env.layout.total_size;
    let data = match guard {
        None => v,
        Some(g) => {
            let ty = env.type_of_shadow(&v);
            let old = env.assign_new(
                ty,
                Expr::Get {
                    offset: shadow_offset,
                    ty,
                },
            );
            env.assign_new(
                ty,
                Expr::Ite {
                    cond: g.atom(),
                    iftrue: v.atom(),
                    iffalse: old.atom(),
                },
            )
        }
    };
    env.emit_shadow(Stmt::Put {
        offset: shadow_offset,
        data: data.atom(),
    });
}

/// Label of an indexed register read.
pub fn shadow_geti(env: &mut ShadowEnv, descr: &RegArray, ix: OrigAtom, bias: i32) -> ShadowAtom {
    let sdescr = shadow_descr(env.layout, descr);
    env.assign_new(
        sdescr.elem_ty,
        Expr::GetI {
            descr: sdescr,
            ix: ix.atom(),
            bias,
        },
    )
}

/// Write label `v` to the shadow of an indexed register write. The index is the real one.
pub fn shadow_puti(env: &mut ShadowEnv, descr: &RegArray, ix: OrigAtom, bias: i32, v: ShadowAtom) {
    let sdescr = shadow_descr(env.layout, descr);
    let got = env.type_of_shadow(&v);
    assert_eq!(
        got, sdescr.elem_ty,
        "Indexed shadow write of type {} into array of {}",
        got, sdescr.elem_ty
    );
    env.emit_shadow(Stmt::PutI {
        descr: sdescr,
        ix: ix.atom(),
        bias,
        data: v.atom(),
    });
}

/// Whether `[offset, offset+size)` lies entirely within a range the host declares as never
/// carrying taint. Partially overlapping such a range is fatal.
pub fn is_always_defined(layout: &GuestLayout, offset: u32, size: u32) -> bool {
    let (lo, hi) = (offset, offset + size);
    for &(o, s) in &layout.always_defined {
        let (rlo, rhi) = (o, o + s);
        if rlo <= lo && hi <= rhi {
            return true;
        }
        if lo < rhi && rlo < hi {
            panic!(
                "Guest state access [{}, {}) partially overlaps always-defined range [{}, {})",
                lo, hi, rlo, rhi
            );
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> GuestLayout {
        GuestLayout {
            total_size: 1024,
            offset_sp: 48,
            sizeof_sp: 8,
            offset_ip: 184,
            sizeof_ip: 8,
            always_defined: vec![(184, 8), (200, 16)],
        }
    }

    #[test]
    fn contained_ranges_are_always_defined() {
        let l = layout();
        assert!(is_always_defined(&l, 184, 8));
        assert!(is_always_defined(&l, 204, 4));
        assert!(!is_always_defined(&l, 16, 8));
        assert!(!is_always_defined(&l, 192, 8));
    }

    #[test]
    #[should_panic(expected = "partially overlaps")]
    fn partial_overlap_is_fatal() {
        is_always_defined(&layout(), 180, 8);
    }

    #[test]
    fn shadow_arrays_are_rebased() {
        let d = RegArray {
            base: 96,
            elem_ty: Type::F64,
            n_elems: 8,
        };
        assert_eq!(
            shadow_descr(&layout(), &d),
            RegArray {
                base: 1120,
                elem_ty: Type::I64,
                n_elems: 8
            }
        );
    }
}
