//! Taint propagation for atomic and guarded memory statements.
//!
//! A compare-and-swap is instrumented in seven steps:
//!
//! 1. compute the label(s) of the new value(s);
//! 2. compute the label(s) of the expected value(s);
//! 3. load the label(s) of the old value(s) from shadow memory and
//! 4. bind them to the old-value temporaries;
//! 5. perform the real compare-and-swap;
//! 6. compare the expected and old *real* values;
//! 7. store the new label(s), guarded by that comparison.
//!
//! Step 6 compares values, not labels: two equal labels say nothing about whether the swap
//! happened.

use crate::ir::{Atom, Cas, Const, Endness, Expr, LoadG, Stmt, StoreG, Temp, Type};
use crate::memory::{shadow_load, shadow_load_guarded, shadow_store};
use crate::ops::Op;
use crate::shadow_env::ShadowEnv;
use crate::shadow_temps::{OrigAtom, ShadowAtom};

pub fn shadow_cas(env: &mut ShadowEnv, cas: &Cas) {
    if cas.is_double() {
        shadow_cas_double(env, cas)
    } else {
        shadow_cas_single(env, cas)
    }
}

pub fn shadow_cas_single(env: &mut ShadowEnv, cas: &Cas) {
    let elem_ty = env.out().tyenv.type_of(cas.old_lo);
    let addr = OrigAtom::new(cas.addr);

    let vdata_lo = env.shadow_of(OrigAtom::new(cas.data_lo));
    env.shadow_of(OrigAtom::new(cas.expd_lo));

    let vold_lo = shadow_load(env, cas.end, elem_ty, addr, 0, None);
    env.bind_shadow(cas.old_lo, vold_lo);

    env.emit_orig(Stmt::Cas(cas.clone()));

    let expd_eq_old = env.assign_new_orig(
        Type::I1,
        Expr::Binop(
            Op::cas_cmp_eq_for(elem_ty),
            cas.expd_lo,
            Atom::Tmp(cas.old_lo),
        ),
    );

    shadow_store(env, cas.end, addr, 0, vdata_lo, Some(expd_eq_old));
}

pub fn shadow_cas_double(env: &mut ShadowEnv, cas: &Cas) {
    let (old_hi, expd_hi, data_hi) = match (cas.old_hi, cas.expd_hi, cas.data_hi) {
        (Some(o), Some(e), Some(d)) => (o, e, d),
        _ => panic!("Partially double-width CAS {}", Stmt::Cas(cas.clone())),
    };
    let elem_ty = env.out().tyenv.type_of(cas.old_lo);
    let elem_size = elem_ty.size_bytes() as u64;
    let addr = OrigAtom::new(cas.addr);

    let vdata_hi = env.shadow_of(OrigAtom::new(data_hi));
    let vdata_lo = env.shadow_of(OrigAtom::new(cas.data_lo));
    env.shadow_of(OrigAtom::new(expd_hi));
    env.shadow_of(OrigAtom::new(cas.expd_lo));

    let (hi_off, lo_off) = match cas.end {
        Endness::Little => (elem_size, 0),
        Endness::Big => (0, elem_size),
    };
    let vold_hi = shadow_load(env, cas.end, elem_ty, addr, hi_off, None);
    env.bind_shadow(old_hi, vold_hi);
    let vold_lo = shadow_load(env, cas.end, elem_ty, addr, lo_off, None);
    env.bind_shadow(cas.old_lo, vold_lo);

    env.emit_orig(Stmt::Cas(cas.clone()));

    let xor = Op::xor_for(elem_ty);
    let x_hi = env.assign_new_orig(elem_ty, Expr::Binop(xor, expd_hi, Atom::Tmp(old_hi)));
    let x_lo = env.assign_new_orig(elem_ty, Expr::Binop(xor, cas.expd_lo, Atom::Tmp(cas.old_lo)));
    let x_hl = env.assign_new_orig(
        elem_ty,
        Expr::Binop(Op::or_for(elem_ty), x_hi.atom(), x_lo.atom()),
    );
    let expd_eq_old = env.assign_new_orig(
        Type::I1,
        Expr::Binop(
            Op::cas_cmp_eq_for(elem_ty),
            x_hl.atom(),
            Const::zero_of(elem_ty).into(),
        ),
    );

    shadow_store(env, cas.end, addr, hi_off, vdata_hi, Some(expd_eq_old));
    shadow_store(env, cas.end, addr, lo_off, vdata_lo, Some(expd_eq_old));
}

/// Load-linked takes the label of the loaded location. Store-conditional stores the data's label
/// unconditionally, and its success flag is always untainted.
pub fn shadow_llsc(
    env: &mut ShadowEnv,
    end: Endness,
    result: Temp,
    addr: Atom,
    storedata: Option<Atom>,
) {
    let addr = OrigAtom::new(addr);
    match storedata {
        None => {
            let ty = env.out().tyenv.type_of(result);
            let v = shadow_load(env, end, ty, addr, 0, None);
            env.bind_shadow(result, v);
        }
        Some(data) => {
            let vdata = env.shadow_of(OrigAtom::new(data));
            shadow_store(env, end, addr, 0, vdata, None);
            env.bind_shadow(result, ShadowAtom::defined(Type::I32));
        }
    }
}

pub fn shadow_load_g(env: &mut ShadowEnv, lg: &LoadG) {
    let valt = env.shadow_of(OrigAtom::new(lg.alt));
    let v = shadow_load_guarded(
        env,
        lg.end,
        lg.cvt.loaded_type(),
        OrigAtom::new(lg.addr),
        0,
        OrigAtom::new(lg.guard),
        lg.cvt.widening_op(),
        valt,
    );
    env.bind_shadow(lg.dst, v);
}

pub fn shadow_store_g(env: &mut ShadowEnv, sg: &StoreG) {
    let vdata = env.shadow_of(OrigAtom::new(sg.data));
    shadow_store(
        env,
        sg.end,
        OrigAtom::new(sg.addr),
        0,
        vdata,
        Some(OrigAtom::new(sg.guard)),
    );
}
