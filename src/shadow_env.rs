//! The per-block instrumentation environment.

use crate::config::InstrumentConfig;
use crate::ir::{Atom, Block, Expr, GuestLayout, Stmt, Temp, Type};
use crate::log::*;
use crate::shadow_temps::{OrigAtom, ShadowAtom, TempKind, TempMap};
use crate::shadow_types::shadow_type;

/// Where an emitted statement came from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Provenance {
    /// A statement of the input block, or one computing real values on its behalf
    Original,
    /// A shadow computation
    Shadow,
    /// A diagnostic helper call
    Diagnostic,
}

impl Provenance {
    pub fn tag(self) -> char {
        match self {
            Provenance::Original => 'C',
            Provenance::Shadow => 'V',
            Provenance::Diagnostic => 'D',
        }
    }
}

/// State for instrumenting one block: the block under construction and its temporary map. Owned
/// exclusively by a single call to [`crate::instrument::instrument`].
pub struct ShadowEnv<'a> {
    out: Block,
    provenance: Vec<Provenance>,
    tmp_map: TempMap,
    pub(crate) layout: &'a GuestLayout,
    pub(crate) host_word: Type,
    /// Whether the input block contains suspicious literals; selects the expensive strategy for
    /// some comparisons.
    pub(crate) bogus_literals: bool,
    pub(crate) config: &'a InstrumentConfig,
}

impl<'a> ShadowEnv<'a> {
    /// An environment whose output starts as `input` without statements.
    pub fn new(
        input: &Block,
        layout: &'a GuestLayout,
        host_word: Type,
        config: &'a InstrumentConfig,
    ) -> Self {
        Self {
            out: input.copy_except_stmts(),
            provenance: vec![],
            tmp_map: TempMap::with_originals(input.tyenv.len()),
            layout,
            host_word,
            bogus_literals: false,
            config,
        }
    }

    pub fn out(&self) -> &Block {
        &self.out
    }

    pub fn tmp_map(&self) -> &TempMap {
        &self.tmp_map
    }

    pub fn type_of(&self, a: &Atom) -> Type {
        self.out.type_of_atom(a)
    }

    pub fn type_of_shadow(&self, a: &ShadowAtom) -> Type {
        self.out.type_of_atom(&a.atom())
    }

    pub fn type_of_orig(&self, a: &OrigAtom) -> Type {
        self.out.type_of_atom(&a.atom())
    }

    /// Allocate a temporary of type `ty` and kind `kind`, in lockstep in the type environment and
    /// the temporary map.
    pub fn new_temp(&mut self, ty: Type, kind: TempKind) -> Temp {
        let t = self.out.tyenv.new_temp(ty);
        let idx = self.tmp_map.push(kind);
        assert_eq!(
            t.0, idx,
            "Temporary allocation diverged from temporary map"
        );
        t
    }

    /// The shadow of original temporary `orig`, allocating it if none exists yet.
    pub fn find_or_create_shadow(&mut self, orig: Temp) -> Temp {
        if let Some(s) = self.tmp_map.orig_entry(orig).shadow {
            return s;
        }
        let ty = shadow_type(self.out.tyenv.type_of(orig));
        let s = self.new_temp(ty, TempKind::Shadow);
        self.tmp_map.bind(orig, s);
        s
    }

    /// A fresh shadow temporary for `orig`, replacing any previous binding.
    pub fn new_shadow(&mut self, orig: Temp) -> Temp {
        self.tmp_map.orig_entry(orig);
        let ty = shadow_type(self.out.tyenv.type_of(orig));
        let s = self.new_temp(ty, TempKind::Shadow);
        self.tmp_map.bind(orig, s);
        s
    }

    /// The shadow of an original atom. Constants are always untainted.
    pub fn shadow_of(&mut self, a: OrigAtom) -> ShadowAtom {
        match a.atom() {
            Atom::Const(c) => ShadowAtom::defined(shadow_type(c.ty())),
            Atom::Tmp(t) => ShadowAtom::from_shadow_temp(self.find_or_create_shadow(t)),
        }
    }

    fn emit(&mut self, stmt: Stmt, provenance: Provenance) {
        if self.config.trace_instrumentation {
            trace!("Emitting"; "stmt" => %stmt, "kind" => %provenance.tag());
        }
        self.out.stmts.push(stmt);
        self.provenance.push(provenance);
    }

    pub fn emit_orig(&mut self, stmt: Stmt) {
        self.emit(stmt, Provenance::Original)
    }

    pub fn emit_shadow(&mut self, stmt: Stmt) {
        self.emit(stmt, Provenance::Shadow)
    }

    pub fn emit_diagnostic(&mut self, stmt: Stmt) {
        self.emit(stmt, Provenance::Diagnostic)
    }

    /// Compute `e` (of shadow type `ty`) into a new shadow temporary.
    pub fn assign_new(&mut self, ty: Type, e: Expr) -> ShadowAtom {
        let ety = self.out.type_of_expr(&e);
        assert_eq!(ety, ty, "Shadow expression {} has type {}, expected {}", e, ety, ty);
        let t = self.new_temp(ty, TempKind::Shadow);
        self.emit_shadow(Stmt::WrTmp { tmp: t, data: e });
        ShadowAtom::from_shadow_temp(t)
    }

    /// Compute a real value `e` (of type `ty`) into a new original temporary.
    pub fn assign_new_orig(&mut self, ty: Type, e: Expr) -> OrigAtom {
        let ety = self.out.type_of_expr(&e);
        assert_eq!(ety, ty, "Expression {} has type {}, expected {}", e, ety, ty);
        let t = self.new_temp(ty, TempKind::Orig);
        self.emit_orig(Stmt::WrTmp { tmp: t, data: e });
        OrigAtom::temp(t)
    }

    /// A new shadow temporary for a dirty call result, without emitting a definition.
    pub fn new_shadow_temp(&mut self, ty: Type) -> Temp {
        self.new_temp(ty, TempKind::Shadow)
    }

    /// Set the label of original temporary `orig` to `v`. A temporary that already has a shadow
    /// gets a fresh one so that no shadow temporary is written twice.
    pub fn bind_shadow(&mut self, orig: Temp, v: ShadowAtom) {
        let expected = shadow_type(self.out.tyenv.type_of(orig));
        let got = self.type_of_shadow(&v);
        assert_eq!(
            got, expected,
            "Shadow of {} has type {}, expected {}",
            orig, got, expected
        );
        let s = if self.tmp_map.orig_entry(orig).shadow.is_some() {
            self.new_shadow(orig)
        } else {
            self.find_or_create_shadow(orig)
        };
        self.emit_shadow(Stmt::WrTmp {
            tmp: s,
            data: v.atom().into(),
        });
    }

    /// Finish instrumentation, returning the output block and the provenance of each statement.
    pub fn finish(self) -> (Block, Vec<Provenance>) {
        assert_eq!(
            self.tmp_map.len(),
            self.out.tyenv.len(),
            "Temporary map and type environment sizes diverged"
        );
        let (orig, shadow) = self.tmp_map.counts();
        debug!("Finished block"; "orig_temps" => orig, "shadow_temps" => shadow, "stmts" => self.out.stmts.len());
        (self.out, self.provenance)
    }
}
