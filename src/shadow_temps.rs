//! Bookkeeping for shadow temporaries.
//!
//! Every temporary in a block under construction has an entry in a [`TempMap`], recording
//! whether it is an original temporary (one computing a real value) or a shadow temporary (one
//! computing a taint label), and for originals, which shadow temporary currently holds its label.
//! Temporaries are plain indices into the block's type environment, so the map never hands out
//! references that could be invalidated as the block grows.
//!
//! At the type level, atoms in the two spaces are kept apart by [`OrigAtom`] and [`ShadowAtom`]:
//! shadow computations take and return `ShadowAtom`s, and only the environment can produce one.

use crate::ir::{Atom, Const, Temp, Type};
use crate::shadow_types::defined_value;
use std::fmt;
use std::marker::PhantomData;

/// Which space a temporary lives in
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TempKind {
    Orig,
    Shadow,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TempMapEntry {
    pub kind: TempKind,
    /// The current shadow of an original temporary; always `None` for shadow temporaries
    pub shadow: Option<Temp>,
}

/// Per-block table from temporary to its kind and current shadow. Indexed in lockstep with the
/// block's type environment.
#[derive(Clone, Debug, Default)]
pub struct TempMap {
    entries: Vec<TempMapEntry>,
}

impl TempMap {
    /// A map with original entries for the first `n` temporaries.
    pub fn with_originals(n: usize) -> Self {
        Self {
            entries: vec![
                TempMapEntry {
                    kind: TempKind::Orig,
                    shadow: None,
                };
                n
            ],
        }
    }

    /// Add an entry for a freshly allocated temporary, returning its index.
    pub fn push(&mut self, kind: TempKind) -> usize {
        self.entries.push(TempMapEntry { kind, shadow: None });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry of `t`. Fatal if `t` is out of range.
    pub fn entry(&self, t: Temp) -> TempMapEntry {
        assert!(
            t.0 < self.entries.len(),
            "Temporary {} out of range of temporary map (size {})",
            t,
            self.entries.len()
        );
        self.entries[t.0]
    }

    pub fn kind(&self, t: Temp) -> TempKind {
        self.entry(t).kind
    }

    /// The entry of `orig`, which must be an original temporary.
    pub fn orig_entry(&self, orig: Temp) -> TempMapEntry {
        let e = self.entry(orig);
        assert!(
            e.kind == TempKind::Orig,
            "Asked for the shadow of shadow temporary {}",
            orig
        );
        e
    }

    /// Rebind the shadow of `orig` to `shadow`.
    pub fn bind(&mut self, orig: Temp, shadow: Temp) {
        self.orig_entry(orig);
        assert_eq!(
            self.kind(shadow),
            TempKind::Shadow,
            "Binding {} to non-shadow temporary {}",
            orig,
            shadow
        );
        self.entries[orig.0].shadow = Some(shadow);
    }

    /// Number of original and shadow temporaries
    pub fn counts(&self) -> (usize, usize) {
        let orig = self
            .entries
            .iter()
            .filter(|e| e.kind == TempKind::Orig)
            .count();
        (orig, self.entries.len() - orig)
    }
}

/// Marker for original-space atoms
#[derive(Clone, Copy, Debug)]
pub enum Orig {}
/// Marker for shadow-space atoms
#[derive(Clone, Copy, Debug)]
pub enum Shadow {}

/// An atom tagged with the space it belongs to.
pub struct KindedAtom<K> {
    atom: Atom,
    _kind: PhantomData<fn() -> K>,
}

/// An atom computing a real value
pub type OrigAtom = KindedAtom<Orig>;
/// An atom computing a taint label
pub type ShadowAtom = KindedAtom<Shadow>;

impl<K> KindedAtom<K> {
    fn wrap(atom: Atom) -> Self {
        Self {
            atom,
            _kind: PhantomData,
        }
    }

    pub fn atom(&self) -> Atom {
        self.atom
    }

    pub fn is_const(&self) -> bool {
        self.atom.is_const()
    }
}

impl OrigAtom {
    /// An atom of the block being instrumented, or one computing a real value on its behalf.
    pub fn new(atom: Atom) -> Self {
        Self::wrap(atom)
    }

    pub fn temp(t: Temp) -> Self {
        Self::wrap(Atom::Tmp(t))
    }
}

impl ShadowAtom {
    /// The fully-untainted label of shadow type `ty`.
    pub fn defined(ty: Type) -> Self {
        Self::wrap(Atom::Const(defined_value(ty)))
    }

    /// A shadow temporary. Only the environment, which tracks kinds, may create these.
    pub(crate) fn from_shadow_temp(t: Temp) -> Self {
        Self::wrap(Atom::Tmp(t))
    }

    /// A literal label, for tests that need a specific tainted constant.
    #[cfg(test)]
    pub(crate) fn label(c: Const) -> Self {
        Self::wrap(Atom::Const(c))
    }
}

impl<K> Clone for KindedAtom<K> {
    fn clone(&self) -> Self {
        Self::wrap(self.atom)
    }
}

impl<K> Copy for KindedAtom<K> {}

impl<K> PartialEq for KindedAtom<K> {
    fn eq(&self, other: &Self) -> bool {
        self.atom == other.atom
    }
}

impl<K> Eq for KindedAtom<K> {}

impl fmt::Debug for OrigAtom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.atom)
    }
}

impl fmt::Debug for ShadowAtom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "V:{}", self.atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_tracks_kinds() {
        let mut m = TempMap::with_originals(2);
        assert_eq!(m.push(TempKind::Shadow), 2);
        assert_eq!(m.kind(Temp(1)), TempKind::Orig);
        assert_eq!(m.kind(Temp(2)), TempKind::Shadow);
        m.bind(Temp(0), Temp(2));
        assert_eq!(m.entry(Temp(0)).shadow, Some(Temp(2)));
        assert_eq!(m.counts(), (2, 1));
    }

    #[test]
    #[should_panic(expected = "shadow of shadow")]
    fn no_shadow_of_shadow() {
        let mut m = TempMap::with_originals(1);
        m.push(TempKind::Shadow);
        m.orig_entry(Temp(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range() {
        TempMap::with_originals(1).entry(Temp(5));
    }

    #[test]
    fn defined_shadow_atoms() {
        assert_eq!(
            ShadowAtom::defined(Type::I64).atom(),
            Atom::Const(Const::U64(0))
        );
    }
}
