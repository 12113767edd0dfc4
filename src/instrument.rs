//! The block rewriter: pairs every statement of a block with the computation of its labels.

use crate::atomics::{shadow_cas, shadow_llsc, shadow_load_g, shadow_store_g};
use crate::config::{InstrumentConfig, CONFIG};
use crate::diagnostics::{self, describe_cas, describe_dirty, describe_exit, describe_llsc};
use crate::diagnostics::{describe_load_g, describe_next, describe_put, describe_puti};
use crate::diagnostics::{describe_store, describe_store_g, describe_wrtmp};
use crate::dirty::shadow_dirty;
use crate::guest_state::{shadow_get, shadow_geti, shadow_put, shadow_puti};
use crate::ir::{Atom, Block, Const, Expr, GuestLayout, Stmt, Type};
use crate::log::*;
use crate::memory::{shadow_load, shadow_store};
use crate::op_rules::{shadow_binop, shadow_qop, shadow_triop, shadow_unop};
use crate::shadow_env::{Provenance, ShadowEnv};
use crate::shadow_ops::{coerce, lazy_n, uifu};
use crate::shadow_temps::{OrigAtom, ShadowAtom};
use crate::shadow_types::shadow_type;

/// Literals that typically come from code working on several bytes at once (`strlen` and friends
/// testing for a zero byte), for which comparisons get precise treatment.
const BOGUS_LITERALS: [u64; 8] = [
    0xFEFEFEFF,
    0x80808080,
    0x7F7F7F7F,
    0xFFFFFFFFFEFEFEFF,
    0xFEFEFEFEFEFEFEFF,
    0x0000000000008080,
    0x8080808080808080,
    0x0101010101010101,
];

/// State carried across calls to [`instrument`]: the number of blocks seen so far, and the
/// configuration in force.
#[derive(Clone, Debug)]
pub struct InstrumentContext {
    n_bbs: u64,
    n_kbbs: u64,
    config: InstrumentConfig,
}

impl InstrumentContext {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            n_bbs: 0,
            n_kbbs: 0,
            config,
        }
    }

    /// A context reading the process-wide configuration.
    pub fn from_global() -> Self {
        Self::new(CONFIG.clone())
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Thousands of blocks seen so far.
    pub fn kilo_blocks(&self) -> u64 {
        self.n_kbbs
    }

    /// Count one more block, returning whether it falls inside the instrumentation window.
    fn tick(&mut self) -> bool {
        self.n_bbs += 1;
        let transition = self.n_bbs % 1000 == 0;
        if transition {
            self.n_bbs = 0;
            self.n_kbbs += 1;
            info!("Kilo-blocks seen"; "kbbs" => self.n_kbbs);
        }
        let after = self.config.after_kbb != 0 && self.n_kbbs < self.config.after_kbb;
        let before = matches!(self.config.before_kbb, Some(b) if self.n_kbbs > b);
        let on = !(after || before);
        if transition {
            info!("Instrumentation";
                  "on" => on,
                  "after_kbb" => self.config.after_kbb,
                  OptionalKV("before_kbb", self.config.before_kbb),
            );
        }
        on
    }
}

/// Whether `a` is a literal from [`BOGUS_LITERALS`].
pub fn is_bogus_atom(a: &Atom) -> bool {
    let n = match a {
        Atom::Tmp(_) => return false,
        Atom::Const(c) => match *c {
            Const::U8(v) => v as u64,
            Const::U16(v) => v as u64,
            Const::U32(v) => v as u64,
            Const::U64(v) => v,
            _ => return false,
        },
    };
    BOGUS_LITERALS.contains(&n)
}

/// Whether any operand of `st` is a bogus literal.
pub fn has_bogus_literals(st: &Stmt) -> bool {
    match st {
        Stmt::Exit { guard, .. } => is_bogus_atom(guard),
        _ => st.atoms().iter().any(is_bogus_atom),
    }
}

/// Label of the value of `e`.
pub fn shadow_expr(env: &mut ShadowEnv, e: &Expr) -> ShadowAtom {
    match e {
        Expr::Get { offset, ty } => shadow_get(env, *offset, *ty),
        Expr::GetI { descr, ix, bias } => shadow_geti(env, descr, OrigAtom::new(*ix), *bias),
        Expr::RdTmp(t) => env.shadow_of(OrigAtom::temp(*t)),
        Expr::Const(c) => ShadowAtom::defined(shadow_type(c.ty())),
        Expr::Unop(op, a) => shadow_unop(env, *op, OrigAtom::new(*a)),
        Expr::Binop(op, a1, a2) => shadow_binop(env, *op, OrigAtom::new(*a1), OrigAtom::new(*a2)),
        Expr::Triop(op, a1, a2, a3) => shadow_triop(
            env,
            *op,
            OrigAtom::new(*a1),
            OrigAtom::new(*a2),
            OrigAtom::new(*a3),
        ),
        Expr::Qop(op, a1, a2, a3, a4) => shadow_qop(
            env,
            *op,
            OrigAtom::new(*a1),
            OrigAtom::new(*a2),
            OrigAtom::new(*a3),
            OrigAtom::new(*a4),
        ),
        Expr::Load { end, ty, addr } => shadow_load(env, *end, *ty, OrigAtom::new(*addr), 0, None),
        Expr::Ite {
            cond,
            iftrue,
            iffalse,
        } => shadow_ite(env, OrigAtom::new(*cond), OrigAtom::new(*iftrue), OrigAtom::new(*iffalse)),
        Expr::CCall {
            callee,
            retty,
            args,
        } => {
            let args: Vec<OrigAtom> = args.iter().copied().map(OrigAtom::new).collect();
            lazy_n(env, shadow_type(*retty), &args, callee.mcx_mask)
        }
    }
}

/// `ITE(cond, iftrue#, iffalse#) | cond#`: a tainted condition taints the result whichever branch
/// is taken.
fn shadow_ite(
    env: &mut ShadowEnv,
    cond: OrigAtom,
    iftrue: OrigAtom,
    iffalse: OrigAtom,
) -> ShadowAtom {
    let vcond = env.shadow_of(cond);
    let vtrue = env.shadow_of(iftrue);
    let vfalse = env.shadow_of(iffalse);
    let ty = env.type_of_shadow(&vtrue);
    let vcond = coerce(env, vcond, ty);
    let steered = env.assign_new(
        ty,
        Expr::Ite {
            cond: cond.atom(),
            iftrue: vtrue.atom(),
            iffalse: vfalse.atom(),
        },
    );
    uifu(env, steered, vcond)
}

fn instrument_stmt(env: &mut ShadowEnv, st: &Stmt) {
    let config = env.config;
    match st {
        Stmt::WrTmp { tmp, data } => {
            env.emit_orig(st.clone());
            let v = shadow_expr(env, data);
            env.bind_shadow(*tmp, v);
            if !matches!(data, Expr::Const(_)) {
                diagnostics::emit(env, describe_wrtmp(config, *tmp, data));
            }
        }
        Stmt::Dirty(d) => {
            shadow_dirty(env, d);
            diagnostics::emit(env, describe_dirty(config, d));
        }
        Stmt::Cas(cas) => {
            shadow_cas(env, cas);
            diagnostics::emit(env, describe_cas(config, cas));
        }
        Stmt::Exit { guard, dst, .. } => {
            diagnostics::emit(env, describe_exit(config, guard, dst.as_u64()));
            env.emit_orig(st.clone());
        }
        Stmt::Put { offset, data } => {
            let v = env.shadow_of(OrigAtom::new(*data));
            shadow_put(env, *offset, v, None);
            diagnostics::emit(env, describe_put(config, *offset, data));
            env.emit_orig(st.clone());
        }
        Stmt::PutI {
            descr,
            ix,
            bias,
            data,
        } => {
            let v = env.shadow_of(OrigAtom::new(*data));
            shadow_puti(env, descr, OrigAtom::new(*ix), *bias, v);
            diagnostics::emit(env, describe_puti(config, descr, ix, data));
            env.emit_orig(st.clone());
        }
        Stmt::Store { end, addr, data } => {
            let ty = env.type_of(data);
            let v = env.shadow_of(OrigAtom::new(*data));
            diagnostics::emit(env, describe_store(config, ty, addr, data));
            shadow_store(env, *end, OrigAtom::new(*addr), 0, v, None);
            env.emit_orig(st.clone());
        }
        Stmt::StoreG(sg) => {
            let ty = env.type_of(&sg.data);
            diagnostics::emit(env, describe_store_g(config, ty, sg));
            shadow_store_g(env, sg);
            env.emit_orig(st.clone());
        }
        Stmt::LoadG(lg) => {
            shadow_load_g(env, lg);
            env.emit_orig(st.clone());
            diagnostics::emit(env, describe_load_g(config, lg));
        }
        Stmt::LLSC {
            end,
            result,
            addr,
            storedata,
        } => {
            shadow_llsc(env, *end, *result, *addr, *storedata);
            env.emit_orig(st.clone());
            diagnostics::emit(env, describe_llsc(config, *result, addr, storedata.as_ref()));
        }
        Stmt::IMark { .. } | Stmt::NoOp | Stmt::MBE(_) | Stmt::AbiHint { .. } => {
            env.emit_orig(st.clone());
        }
    }
}

/// Instrument `block`, returning the instrumented block and the provenance of each of its
/// statements. Blocks outside the configured window are returned unchanged.
pub fn instrument_annotated(
    ctx: &mut InstrumentContext,
    block: &Block,
    layout: &GuestLayout,
    guest_word: Type,
    host_word: Type,
) -> (Block, Vec<Provenance>) {
    assert_eq!(
        guest_word, host_word,
        "Host/guest word size mismatch: guest {}, host {}",
        guest_word, host_word
    );
    assert!(
        matches!(host_word, Type::I32 | Type::I64),
        "Unsupported host word type {}",
        host_word
    );

    if !ctx.tick() {
        return (block.clone(), vec![Provenance::Original; block.stmts.len()]);
    }

    if let Err(e) = block.try_confirm_valid() {
        panic!("Malformed input block: {}\n{}", e, block);
    }

    let config = ctx.config.clone();
    let mut env = ShadowEnv::new(block, layout, host_word, &config);

    // Scan everything, even past the first match, so that every statement is examined.
    let bogus = block
        .stmts
        .iter()
        .fold(false, |acc, st| has_bogus_literals(st) || acc);
    env.bogus_literals = bogus;
    debug!("Instrumenting block"; "stmts" => block.stmts.len(), "bogus_literals" => bogus);

    let first_imark = block
        .stmts
        .iter()
        .position(|st| matches!(st, Stmt::IMark { .. }));
    let first_imark = match first_imark {
        Some(i) => i,
        None => panic!("Block has no instruction marker\n{}", block),
    };

    let (preamble, body) = block.stmts.split_at(first_imark);
    for st in preamble {
        env.emit_orig(st.clone());
    }
    for st in preamble {
        if let Stmt::WrTmp { tmp, .. } = st {
            let ty = shadow_type(block.tyenv.type_of(*tmp));
            env.bind_shadow(*tmp, ShadowAtom::defined(ty));
        }
    }

    for st in body {
        trace!("Instrumenting statement"; "stmt" => %st);
        instrument_stmt(&mut env, st);
    }

    let next = block.next;
    let _ = env.shadow_of(OrigAtom::new(next));
    diagnostics::emit(&mut env, describe_next(&config, &next));

    env.finish()
}

/// Instrument `block` for a guest whose word type is `guest_word`, running on a host whose word
/// type is `host_word`. The two must agree.
pub fn instrument(
    ctx: &mut InstrumentContext,
    block: &Block,
    layout: &GuestLayout,
    guest_word: Type,
    host_word: Type,
) -> Block {
    instrument_annotated(ctx, block, layout, guest_word, host_word).0
}

/// Statements of `block` tagged `Shadow`, for printing only the instrumentation.
pub fn shadow_only(block: &Block, provenance: &[Provenance]) -> Vec<Stmt> {
    block
        .stmts
        .iter()
        .zip(provenance)
        .filter(|(_, p)| **p != Provenance::Original)
        .map(|(s, _)| s.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bogus_literals_are_recognized() {
        assert!(is_bogus_atom(&Atom::u32(0x80808080)));
        assert!(is_bogus_atom(&Atom::u64(0x0101010101010101)));
        assert!(is_bogus_atom(&Atom::Const(Const::U16(0x8080))));
        assert!(!is_bogus_atom(&Atom::u32(0x80808081)));
        assert!(!is_bogus_atom(&Atom::Const(Const::F64(0xFEFEFEFEFEFEFEFF))));
        assert!(!is_bogus_atom(&Atom::u1(true)));
    }

    #[test]
    fn exit_targets_are_not_scanned() {
        let st = Stmt::Exit {
            guard: Atom::u1(true),
            jk: crate::ir::JumpKind::Boring,
            dst: Const::U64(0x80808080),
            offs_ip: 184,
        };
        assert!(!has_bogus_literals(&st));
        let st = Stmt::Put {
            offset: 16,
            data: Atom::u32(0xFEFEFEFF),
        };
        assert!(has_bogus_literals(&st));
    }

    #[test]
    fn window_counts_kilo_blocks() {
        let mut ctx = InstrumentContext::new(InstrumentConfig {
            after_kbb: 1,
            before_kbb: Some(1),
            ..InstrumentConfig::default()
        });
        for _ in 0..999 {
            assert!(!ctx.tick());
        }
        assert!(ctx.tick());
        assert_eq!(ctx.kilo_blocks(), 1);
        for _ in 0..999 {
            assert!(ctx.tick());
        }
        assert!(!ctx.tick());
        assert_eq!(ctx.kilo_blocks(), 2);
    }
}
