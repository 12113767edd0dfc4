//! Instruction-level taint reports.
//!
//! For selected statements the instrumenter emits an extra helper call that receives a compact
//! description of the statement together with the real value and label of the operands of
//! interest. At run time the helper reports the statement if any of those labels is nonzero.
//!
//! Descriptions are packed five bits per character, most significant bits first, behind a five-bit
//! statement tag. Only the characters of [`CHARSET`] survive the packing; anything else decodes as
//! the terminator `!`, which is why operators are described by their index in hex rather than by
//! name.

use crate::config::InstrumentConfig;
use crate::ir::{Atom, Cas, Dirty, DirtyArg, Expr, LoadG, RegArray, StoreG, Temp, Type};
use itertools::Itertools;

/// Packed characters, indexed by their 5-bit code.
pub const CHARSET: &[u8; 32] = b"0123456789abcdefgijlmnopstux= _!";

/// Terminator of every description, and the stand-in for characters outside [`CHARSET`].
pub const TERMINATOR: char = '!';

/// The kind of statement a description is for, identified by a 5-bit tag in the top bits of the
/// first encoded word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DiagnosticKind {
    Get,
    GetI,
    RdTmp,
    Put,
    Triop,
    PutI,
    Qop,
    CCall,
    Binop,
    Store,
    Unop,
    Dirty,
    Load,
    Cas,
    LLSC,
    LoadG,
    Ite,
    StoreG,
    Exit,
    Next,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 20] = [
        DiagnosticKind::Get,
        DiagnosticKind::GetI,
        DiagnosticKind::RdTmp,
        DiagnosticKind::Put,
        DiagnosticKind::Triop,
        DiagnosticKind::PutI,
        DiagnosticKind::Qop,
        DiagnosticKind::CCall,
        DiagnosticKind::Binop,
        DiagnosticKind::Store,
        DiagnosticKind::Unop,
        DiagnosticKind::Dirty,
        DiagnosticKind::Load,
        DiagnosticKind::Cas,
        DiagnosticKind::LLSC,
        DiagnosticKind::LoadG,
        DiagnosticKind::Ite,
        DiagnosticKind::StoreG,
        DiagnosticKind::Exit,
        DiagnosticKind::Next,
    ];

    pub fn tag(self) -> u32 {
        match self {
            DiagnosticKind::Get => 0x10000000,
            DiagnosticKind::GetI => 0x20000000,
            DiagnosticKind::RdTmp => 0x30000000,
            DiagnosticKind::Put => 0x38000000,
            DiagnosticKind::Triop => 0x40000000,
            DiagnosticKind::PutI => 0x48000000,
            DiagnosticKind::Qop => 0x50000000,
            DiagnosticKind::CCall => 0x58000000,
            DiagnosticKind::Binop => 0x60000000,
            DiagnosticKind::Store => 0x68000000,
            DiagnosticKind::Unop => 0x70000000,
            DiagnosticKind::Dirty => 0x78000000,
            DiagnosticKind::Load => 0x80000000,
            DiagnosticKind::Cas => 0x88000000,
            DiagnosticKind::LLSC => 0x90000000,
            DiagnosticKind::LoadG => 0x98000000,
            DiagnosticKind::Ite => 0xa0000000,
            DiagnosticKind::StoreG => 0xa8000000,
            DiagnosticKind::Exit => 0xb8000000,
            DiagnosticKind::Next => 0xc0000000,
        }
    }

    /// The kind whose tag occupies the top five bits of `word`.
    pub fn from_tag(word: u32) -> Option<Self> {
        let tag = word & 0xf8000000;
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Number of 32-bit words the description is packed into.
    pub fn words(self) -> usize {
        match self {
            DiagnosticKind::Store | DiagnosticKind::Load => 3,
            _ => 4,
        }
    }
}

/// The 5-bit code of `c`. Letters are case-insensitive.
pub fn encode_char(c: char) -> u32 {
    let c = c.to_ascii_lowercase();
    CHARSET
        .iter()
        .position(|&b| b as char == c)
        .map(|p| p as u32)
        .unwrap_or(0x1f)
}

/// Maximum number of characters that fit in `words` words behind the tag.
pub fn capacity(words: usize) -> usize {
    (32 * words - 5) / 5
}

/// Pack `s` behind `tag` into `words` (3 or 4) words. A description longer than the capacity is
/// cut short and ends with [`TERMINATOR`].
pub fn encode_string(s: &str, tag: u32, words: usize) -> Vec<u32> {
    assert!(
        words == 3 || words == 4,
        "Descriptions are packed into 3 or 4 words, not {}",
        words
    );
    let cap = capacity(words);
    let chars: Vec<char> = if s.chars().count() > cap {
        s.chars()
            .take(cap - 1)
            .chain(std::iter::once(TERMINATOR))
            .collect()
    } else {
        s.chars().collect()
    };

    let total = 32 * words as u32;
    let mut acc: u128 = ((tag >> 27) as u128) << (total - 5);
    for (i, c) in chars.into_iter().enumerate() {
        let shift = total - 5 - 5 * (i as u32 + 1);
        acc |= (encode_char(c) as u128) << shift;
    }
    (0..words as u32)
        .map(|k| (acc >> (total - 32 * (k + 1))) as u32)
        .collect()
}

/// Unpack a description, returning its tag and its text up to and including the terminator.
/// Letters come back in lowercase.
pub fn decode_string(words: &[u32]) -> (u32, String) {
    let total = 32 * words.len() as u32;
    let acc = words
        .iter()
        .fold(0u128, |acc, w| (acc << 32) | *w as u128);
    let tag = words.first().map(|w| w & 0xf8000000).unwrap_or(0);
    let mut s = String::new();
    if total < 10 {
        return (tag, s);
    }
    let mut shift = total - 10;
    loop {
        let c = CHARSET[((acc >> shift) & 0x1f) as usize] as char;
        s.push(c);
        if c == TERMINATOR || shift < 5 {
            break;
        }
        shift -= 5;
    }
    (tag, s)
}

/// Pair up 32-bit words into 64-bit words, most significant first, zero-padding an odd tail.
pub fn enc64(words: &[u32]) -> Vec<u64> {
    words
        .chunks(2)
        .map(|pair| {
            let hi = pair[0] as u64;
            let lo = pair.get(1).copied().unwrap_or(0) as u64;
            (hi << 32) | lo
        })
        .collect()
}

/// A report to attach to one statement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub text: String,
    /// Original atoms whose value and label are passed to the reporting helper
    pub operands: Vec<Atom>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, text: String, operands: Vec<Atom>) -> Self {
        debug_assert!(matches!(operands.len(), 1 | 2));
        Self {
            kind,
            text,
            operands,
        }
    }

    pub fn encoded(&self) -> Vec<u32> {
        encode_string(&self.text, self.kind.tag(), self.kind.words())
    }

    /// Name of the reporting helper for a host with word type `host_word`.
    pub fn helper_name(&self, host_word: Type) -> String {
        let width = match host_word {
            Type::I32 => 32,
            Type::I64 => 64,
            _ => panic!("Unsupported host word type {}", host_word),
        };
        format!("helperc_{}_tainted_enc{}", self.operands.len(), width)
    }
}

fn atom_text(a: &Atom) -> String {
    match a {
        Atom::Tmp(t) => format!("{}", t),
        Atom::Const(c) => format!("0x{:x}", c.as_u64()),
    }
}

/// Type names within [`CHARSET`]. Vectors have no encodable letter of their own, so `V128` is
/// written `x128`.
fn type_text(ty: Type) -> String {
    match ty {
        Type::V128 => "x128".to_string(),
        Type::V256 => "x256".to_string(),
        _ => format!("{}", ty),
    }
}

fn atoms_text<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> String {
    atoms.into_iter().map(atom_text).join(" ")
}

fn all_const<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> bool {
    atoms.into_iter().all(|a| a.is_const())
}

/// Whether a statement reading only `atoms` goes unreported because none of them can be tainted.
fn constant_only(config: &InstrumentConfig, atoms: &[Atom]) -> bool {
    config.tainted_ins_only && all_const(atoms)
}

/// Describe `tmp = e`.
pub fn describe_wrtmp(config: &InstrumentConfig, tmp: Temp, e: &Expr) -> Option<Diagnostic> {
    if config.critical_ins_only && !matches!(e, Expr::Load { .. }) {
        return None;
    }
    let dst = Atom::Tmp(tmp);
    let d = match e {
        Expr::Const(_) => return None,
        Expr::Get { offset, ty } => Diagnostic::new(
            DiagnosticKind::Get,
            format!("{}=GET {} {}!", tmp, offset, type_text(*ty)),
            vec![dst],
        ),
        Expr::GetI { descr, ix, .. } => Diagnostic::new(
            DiagnosticKind::GetI,
            format!("{}=GETI {} {}!", tmp, atom_text(ix), type_text(descr.elem_ty)),
            vec![dst],
        ),
        Expr::RdTmp(src) => Diagnostic::new(
            DiagnosticKind::RdTmp,
            format!("{}={}!", tmp, src),
            vec![dst],
        ),
        Expr::Unop(op, a) => {
            if constant_only(config, &[*a]) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::Unop,
                format!("{}={:x} {}!", tmp, *op as u32, atom_text(a)),
                vec![dst],
            )
        }
        Expr::Binop(op, a1, a2) => {
            if constant_only(config, &[*a1, *a2]) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::Binop,
                format!("{}={:x} {}!", tmp, *op as u32, atoms_text([a1, a2])),
                vec![dst],
            )
        }
        Expr::Triop(op, a1, a2, a3) => {
            if constant_only(config, &[*a1, *a2, *a3]) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::Triop,
                format!("{}={:x} {}!", tmp, *op as u32, atoms_text([a1, a2, a3])),
                vec![dst],
            )
        }
        Expr::Qop(op, a1, a2, a3, a4) => {
            if constant_only(config, &[*a1, *a2, *a3, *a4]) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::Qop,
                format!("{}={:x} {}!", tmp, *op as u32, atoms_text([a1, a2, a3, a4])),
                vec![dst],
            )
        }
        Expr::Load { ty, addr, .. } => Diagnostic::new(
            DiagnosticKind::Load,
            format!("{}=LD {} {}!", tmp, type_text(*ty), atom_text(addr)),
            vec![dst, *addr],
        ),
        Expr::Ite {
            cond,
            iftrue,
            iffalse,
        } => {
            if cond.is_const() || (iftrue.is_const() && iffalse.is_const()) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::Ite,
                format!("{}={} {}!", tmp, atom_text(cond), atoms_text([iftrue, iffalse])),
                vec![dst],
            )
        }
        Expr::CCall { args, .. } => {
            if constant_only(config, args) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::CCall,
                format!("{}=CCALL {}!", tmp, atoms_text(args)),
                vec![dst],
            )
        }
    };
    Some(d)
}

pub fn describe_put(config: &InstrumentConfig, offset: u32, data: &Atom) -> Option<Diagnostic> {
    if config.critical_ins_only || data.is_const() {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::Put,
        format!("PUT {}={}!", offset, atom_text(data)),
        vec![*data],
    ))
}

pub fn describe_puti(
    config: &InstrumentConfig,
    _descr: &RegArray,
    ix: &Atom,
    data: &Atom,
) -> Option<Diagnostic> {
    if config.critical_ins_only || (config.tainted_ins_only && all_const([ix, data])) {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::PutI,
        format!("PUTI {}={}!", atom_text(ix), atom_text(data)),
        vec![*ix, *data],
    ))
}

/// Describe a store of `data` (of type `ty`) to `addr`.
pub fn describe_store(
    config: &InstrumentConfig,
    ty: Type,
    addr: &Atom,
    data: &Atom,
) -> Option<Diagnostic> {
    if config.critical_ins_only || all_const([addr, data]) {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::Store,
        format!("ST {}={} {}!", atom_text(addr), type_text(ty), atom_text(data)),
        vec![*addr, *data],
    ))
}

pub fn describe_store_g(config: &InstrumentConfig, ty: Type, sg: &StoreG) -> Option<Diagnostic> {
    if config.critical_ins_only || all_const([&sg.addr, &sg.data]) {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::StoreG,
        format!(
            "STG {} {}={} {}!",
            atom_text(&sg.guard),
            atom_text(&sg.addr),
            type_text(ty),
            atom_text(&sg.data)
        ),
        vec![sg.addr, sg.data],
    ))
}

pub fn describe_load_g(config: &InstrumentConfig, lg: &LoadG) -> Option<Diagnostic> {
    if config.tainted_ins_only && all_const([&lg.addr, &lg.alt]) {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::LoadG,
        format!(
            "{}=LDG {} {} {}!",
            lg.dst,
            atom_text(&lg.guard),
            atom_text(&lg.addr),
            atom_text(&lg.alt)
        ),
        vec![Atom::Tmp(lg.dst), lg.addr],
    ))
}

pub fn describe_exit(config: &InstrumentConfig, guard: &Atom, dst: u64) -> Option<Diagnostic> {
    if config.critical_ins_only || guard.is_const() {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::Exit,
        format!("IF {} GOTO 0x{:x}!", atom_text(guard), dst),
        vec![*guard],
    ))
}

/// Describe the jump to the block's successor.
pub fn describe_next(config: &InstrumentConfig, next: &Atom) -> Option<Diagnostic> {
    if config.critical_ins_only || next.is_const() {
        return None;
    }
    Some(Diagnostic::new(
        DiagnosticKind::Next,
        format!("JMP {}!", atom_text(next)),
        vec![*next],
    ))
}

pub fn describe_dirty(config: &InstrumentConfig, d: &Dirty) -> Option<Diagnostic> {
    if config.critical_ins_only {
        return None;
    }
    let args: Vec<Atom> = d
        .args
        .iter()
        .filter_map(|a| match a {
            DirtyArg::Atom(a) => Some(*a),
            _ => None,
        })
        .collect();
    let reported = match d.tmp {
        Some(t) => Atom::Tmp(t),
        None => *args.iter().find(|a| !a.is_const())?,
    };
    let dst = d.tmp.map(|t| format!("{}=", t)).unwrap_or_default();
    Some(Diagnostic::new(
        DiagnosticKind::Dirty,
        format!("{}DCALL {}!", dst, atoms_text(&args)),
        vec![reported],
    ))
}

pub fn describe_cas(config: &InstrumentConfig, cas: &Cas) -> Option<Diagnostic> {
    if config.critical_ins_only {
        return None;
    }
    let text = match (cas.old_hi, cas.expd_hi, cas.data_hi) {
        (Some(oh), Some(eh), Some(dh)) => format!(
            "{} {}=CAS {} {} {}!",
            oh,
            cas.old_lo,
            atom_text(&cas.addr),
            atoms_text([&eh, &cas.expd_lo]),
            atoms_text([&dh, &cas.data_lo])
        ),
        _ => format!(
            "{}=CAS {} {} {}!",
            cas.old_lo,
            atom_text(&cas.addr),
            atom_text(&cas.expd_lo),
            atom_text(&cas.data_lo)
        ),
    };
    Some(Diagnostic::new(
        DiagnosticKind::Cas,
        text,
        vec![cas.addr, cas.data_lo],
    ))
}

pub fn describe_llsc(
    config: &InstrumentConfig,
    result: Temp,
    addr: &Atom,
    storedata: Option<&Atom>,
) -> Option<Diagnostic> {
    let d = match storedata {
        None => Diagnostic::new(
            DiagnosticKind::LLSC,
            format!("{}=LL {}!", result, atom_text(addr)),
            vec![Atom::Tmp(result), *addr],
        ),
        Some(data) => {
            if config.critical_ins_only || all_const([addr, data]) {
                return None;
            }
            Diagnostic::new(
                DiagnosticKind::LLSC,
                format!("{}=SC {}={}!", result, atom_text(addr), atom_text(data)),
                vec![*addr, *data],
            )
        }
    };
    Some(d)
}

#[cfg(not(feature = "silent"))]
mod emit_impl {
    use super::*;
    use crate::ir::{Callee, Effect, GuestEffect, Stmt};
    use crate::ops::Op;
    use crate::shadow_env::ShadowEnv;
    use crate::shadow_ops::coerce;
    use crate::shadow_temps::OrigAtom;

    /// The next conversion step from a value of type `ty` towards the host word.
    fn step_towards(ty: Type, host: Type) -> Op {
        match (host, ty) {
            (Type::I64, Type::I1) => Op::U1to64,
            (Type::I64, Type::I8) => Op::U8to64,
            (Type::I64, Type::I16) => Op::U16to64,
            (Type::I64, Type::I32) => Op::U32to64,
            (Type::I64, Type::V128) => Op::V128to64,
            (Type::I64, Type::V256) => Op::V256to64_0,
            (Type::I32, Type::I1) => Op::U1to32,
            (Type::I32, Type::I8) => Op::U8to32,
            (Type::I32, Type::I16) => Op::U16to32,
            (Type::I32, Type::I64) => Op::Trunc64to32,
            (Type::I32, Type::V128) => Op::V128to32,
            (Type::I32, Type::V256) => Op::V256toV128_0,
            (_, Type::I128) => Op::Trunc128to64,
            (_, Type::F32) => Op::ReinterpF32asI32,
            (_, Type::F64) => Op::ReinterpF64asI64,
            (_, Type::D32) => Op::D32toD64,
            (_, Type::D64) => Op::ReinterpD64asI64,
            (_, Type::F128) => Op::F128LOtoF64,
            (_, Type::D128) => Op::D128LOtoD64,
            _ => panic!("Cannot report a value of type {} on a {} host", ty, host),
        }
    }

    /// The real value of `a` as a host word.
    pub fn value_to_word(env: &mut ShadowEnv, a: OrigAtom) -> OrigAtom {
        let host = env.host_word;
        let mut cur = a;
        loop {
            let ty = env.type_of_orig(&cur);
            if ty == host {
                return cur;
            }
            let op = step_towards(ty, host);
            cur = env.assign_new_orig(op.signature().result, Expr::Unop(op, cur.atom()));
        }
    }

    /// Emit the reporting helper call for `diag`, if any.
    pub fn emit(env: &mut ShadowEnv, diag: Option<Diagnostic>) {
        let diag = match diag {
            Some(d) => d,
            None => return,
        };
        let host = env.host_word;
        let enc = diag.encoded();
        let mut args: Vec<Atom> = match host {
            Type::I64 => enc64(&enc).into_iter().map(Atom::u64).collect(),
            _ => enc.into_iter().map(Atom::u32).collect(),
        };
        let mut shadows = vec![];
        for a in &diag.operands {
            let a = OrigAtom::new(*a);
            args.push(value_to_word(env, a).atom());
            let v = env.shadow_of(a);
            shadows.push(coerce(env, v, host).atom());
        }
        args.extend(shadows);

        let mut d = Dirty::with_atoms(Callee::new(diag.helper_name(host)), args);
        d.effects.guest = vec![
            GuestEffect::new(Effect::Read, env.layout.offset_sp, env.layout.sizeof_sp),
            GuestEffect::new(Effect::Read, env.layout.offset_ip, env.layout.sizeof_ip),
        ];
        env.emit_diagnostic(Stmt::Dirty(d));
    }
}

#[cfg(not(feature = "silent"))]
pub use emit_impl::{emit, value_to_word};

/// Diagnostics are compiled out: nothing is emitted.
#[cfg(feature = "silent")]
pub fn emit(_env: &mut crate::shadow_env::ShadowEnv, _diag: Option<Diagnostic>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Const, Endness};
    use crate::ops::Op;

    fn config() -> InstrumentConfig {
        InstrumentConfig::default()
    }

    #[test]
    fn charset_codes() {
        assert_eq!(encode_char('0'), 0);
        assert_eq!(encode_char('9'), 9);
        assert_eq!(encode_char('a'), 0xa);
        assert_eq!(encode_char('G'), 0x10);
        assert_eq!(encode_char('i'), 0x11);
        assert_eq!(encode_char('x'), 0x1b);
        assert_eq!(encode_char('='), 0x1c);
        assert_eq!(encode_char(' '), 0x1d);
        assert_eq!(encode_char('_'), 0x1e);
        assert_eq!(encode_char('r'), 0x1f);
        assert_eq!(encode_char('!'), 0x1f);
    }

    #[test]
    fn description_unpacks_in_lowercase() {
        let enc = encode_string("t12=GET 16 I32!", DiagnosticKind::Get.tag(), 4);
        assert_eq!(enc.len(), 4);
        assert_eq!(enc[0] & 0xf8000000, 0x10000000);
        let (tag, text) = decode_string(&enc);
        assert_eq!(tag, 0x10000000);
        assert_eq!(text, "t12=get 16 i32!");
        assert_eq!(DiagnosticKind::from_tag(enc[0]), Some(DiagnosticKind::Get));
    }

    #[test]
    fn overlong_descriptions_are_cut_with_terminator() {
        let long = "t1=1f t2 t3 0x123456789abcdef!";
        assert!(long.len() > capacity(4));
        let (_, text) = decode_string(&encode_string(long, DiagnosticKind::Binop.tag(), 4));
        assert_eq!(text.len(), capacity(4));
        assert_eq!(&text[..23], &long[..23]);
        assert!(text.ends_with(TERMINATOR));

        let (_, text) = decode_string(&encode_string(long, DiagnosticKind::Store.tag(), 3));
        assert_eq!(text.len(), 18);
        assert!(text.ends_with(TERMINATOR));
    }

    #[test]
    fn description_stops_at_unencodable_character() {
        let (_, text) = decode_string(&encode_string("t1=r2!", DiagnosticKind::RdTmp.tag(), 4));
        assert_eq!(text, "t1=!");
    }

    #[test]
    fn vector_loads_describe_their_type() {
        let e = Expr::Load {
            end: Endness::Little,
            ty: Type::V128,
            addr: Atom::Tmp(Temp(1)),
        };
        let d = describe_wrtmp(&config(), Temp(2), &e).unwrap();
        let (_, text) = decode_string(&encode_string(&d.text, d.kind.tag(), 3));
        assert_eq!(text, "t2=ld x128 t1!");
    }

    #[test]
    fn words_pair_into_64_bit_arguments() {
        assert_eq!(
            enc64(&[0x1, 0x2, 0x3, 0x4]),
            vec![0x0000_0001_0000_0002, 0x0000_0003_0000_0004]
        );
        assert_eq!(enc64(&[0xa, 0xb, 0xc]), vec![0xa_0000_000b, 0xc_0000_0000]);
    }

    #[test]
    fn tags_are_distinct_and_fit_five_bits() {
        for (a, b) in DiagnosticKind::ALL.iter().tuple_combinations() {
            assert_ne!(a.tag(), b.tag());
        }
        for k in DiagnosticKind::ALL {
            assert_eq!(k.tag() & 0x07ffffff, 0);
            assert_eq!(DiagnosticKind::from_tag(k.tag() | 0x1234), Some(k));
        }
    }

    #[test]
    fn constant_operands_are_not_reported() {
        let c = config();
        let e = Expr::Binop(Op::Add32, Atom::u32(1), Atom::u32(2));
        assert_eq!(describe_wrtmp(&c, Temp(3), &e), None);
        let e = Expr::Binop(Op::Add32, Atom::Tmp(Temp(1)), Atom::u32(2));
        let d = describe_wrtmp(&c, Temp(3), &e).unwrap();
        assert_eq!(d.kind, DiagnosticKind::Binop);
        assert_eq!(d.text, format!("t3={:x} t1 0x2!", Op::Add32 as u32));
        assert_eq!(d.operands, vec![Atom::Tmp(Temp(3))]);

        let all = InstrumentConfig {
            tainted_ins_only: false,
            ..config()
        };
        let e = Expr::Binop(Op::Add32, Atom::u32(1), Atom::u32(2));
        assert!(describe_wrtmp(&all, Temp(3), &e).is_some());

        assert_eq!(describe_put(&c, 16, &Atom::u32(7)), None);
        assert_eq!(describe_exit(&c, &Atom::u1(true), 0x1000), None);
        assert_eq!(describe_next(&c, &Atom::u64(0x1000)), None);
    }

    #[test]
    fn critical_only_reports_loads() {
        let c = InstrumentConfig {
            critical_ins_only: true,
            ..config()
        };
        let get = Expr::Get {
            offset: 16,
            ty: Type::I32,
        };
        assert_eq!(describe_wrtmp(&c, Temp(2), &get), None);
        assert_eq!(describe_put(&c, 16, &Atom::Tmp(Temp(1))), None);
        let load = Expr::Load {
            end: Endness::Little,
            ty: Type::I32,
            addr: Atom::Tmp(Temp(1)),
        };
        let d = describe_wrtmp(&c, Temp(2), &load).unwrap();
        assert_eq!(d.text, "t2=LD I32 t1!");
        assert_eq!(d.operands, vec![Atom::Tmp(Temp(2)), Atom::Tmp(Temp(1))]);
        assert_eq!(d.helper_name(Type::I64), "helperc_2_tainted_enc64");
    }

    #[test]
    fn exit_description() {
        let d = describe_exit(&config(), &Atom::Tmp(Temp(9)), 0x4005d0).unwrap();
        assert_eq!(d.text, "IF t9 GOTO 0x4005d0!");
        assert_eq!(d.helper_name(Type::I32), "helperc_1_tainted_enc32");
        let (tag, text) = decode_string(&d.encoded());
        assert_eq!(tag, DiagnosticKind::Exit.tag());
        assert_eq!(text, "if t9 goto 0x4005d0!");
    }

    #[test]
    fn ite_with_constant_condition_is_not_reported() {
        let e = Expr::Ite {
            cond: Atom::Const(Const::U1(true)),
            iftrue: Atom::Tmp(Temp(1)),
            iffalse: Atom::Tmp(Temp(2)),
        };
        assert_eq!(describe_wrtmp(&config(), Temp(4), &e), None);
    }
}
