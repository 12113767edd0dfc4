//! Block-level intermediate representation consumed and produced by the instrumenter.
//!
//! The IR is a VEX-style superblock language: a block is a sequence of statements over an
//! unbounded set of single-assignment temporaries, the guest register file and memory, followed by
//! a terminating control transfer. Every operand of an [`Expr`] is an [`Atom`] (a temporary or a
//! constant), so blocks are always in flat form.

use crate::ops::Op;
use std::fmt;

/// The type of a value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Type {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    /// Half-precision float. Carried through the IR, but has no shadow representation.
    F16,
    F32,
    F64,
    F128,
    /// Decimal floats
    D32,
    D64,
    D128,
    /// 128-bit SIMD vector
    V128,
    /// 256-bit SIMD vector
    V256,
}

impl Type {
    pub const ALL: &'static [Type] = &[
        Type::I1,
        Type::I8,
        Type::I16,
        Type::I32,
        Type::I64,
        Type::I128,
        Type::F16,
        Type::F32,
        Type::F64,
        Type::F128,
        Type::D32,
        Type::D64,
        Type::D128,
        Type::V128,
        Type::V256,
    ];

    /// Width of the type in bits
    pub fn bits(self) -> u32 {
        match self {
            Type::I1 => 1,
            Type::I8 => 8,
            Type::I16 | Type::F16 => 16,
            Type::I32 | Type::F32 | Type::D32 => 32,
            Type::I64 | Type::F64 | Type::D64 => 64,
            Type::I128 | Type::F128 | Type::D128 | Type::V128 => 128,
            Type::V256 => 256,
        }
    }

    /// Size of a value of this type in memory. `I1` has no memory representation.
    pub fn size_bytes(self) -> u32 {
        assert!(self != Type::I1, "I1 has no size in bytes");
        self.bits() / 8
    }

    /// The integer type of exactly `n` bytes.
    pub fn integer_of_size(n: u32) -> Type {
        match n {
            1 => Type::I8,
            2 => Type::I16,
            4 => Type::I32,
            8 => Type::I64,
            16 => Type::I128,
            _ => panic!("No integer type of size {}", n),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::I128
        )
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Type::V128 | Type::V256)
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::I1 => "I1",
            Type::I8 => "I8",
            Type::I16 => "I16",
            Type::I32 => "I32",
            Type::I64 => "I64",
            Type::I128 => "I128",
            Type::F16 => "F16",
            Type::F32 => "F32",
            Type::F64 => "F64",
            Type::F128 => "F128",
            Type::D32 => "D32",
            Type::D64 => "D64",
            Type::D128 => "D128",
            Type::V128 => "V128",
            Type::V256 => "V256",
        }
    }

    pub fn from_name(name: &str) -> Option<Type> {
        Type::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A literal value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Const {
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    /// An `F32`, given by its IEEE-754 bit pattern
    F32(u32),
    /// An `F32` immediate as encoded in the instruction stream
    F32i(u32),
    F64(u64),
    F64i(u64),
    /// A vector given as a byte mask: bit `i` set means byte `i` is `0xFF`, otherwise `0x00`.
    V128(u16),
    V256(u32),
}

impl Const {
    pub fn ty(&self) -> Type {
        match self {
            Const::U1(_) => Type::I1,
            Const::U8(_) => Type::I8,
            Const::U16(_) => Type::I16,
            Const::U32(_) => Type::I32,
            Const::U64(_) => Type::I64,
            Const::U128(_) => Type::I128,
            Const::F32(_) | Const::F32i(_) => Type::F32,
            Const::F64(_) | Const::F64i(_) => Type::F64,
            Const::V128(_) => Type::V128,
            Const::V256(_) => Type::V256,
        }
    }

    /// The raw bit pattern as a (low, high) pair of 128-bit halves. Only `V256` uses the high
    /// half. Vector byte masks are expanded.
    pub fn raw_bits(&self) -> (u128, u128) {
        fn expand(mask: u32, nbytes: u32) -> u128 {
            (0..nbytes)
                .filter(|i| mask & (1 << i) != 0)
                .fold(0u128, |acc, i| acc | (0xffu128 << (8 * i)))
        }
        match *self {
            Const::U1(b) => (b as u128, 0),
            Const::U8(v) => (v as u128, 0),
            Const::U16(v) => (v as u128, 0),
            Const::U32(v) | Const::F32(v) | Const::F32i(v) => (v as u128, 0),
            Const::U64(v) | Const::F64(v) | Const::F64i(v) => (v as u128, 0),
            Const::U128(v) => (v, 0),
            Const::V128(m) => (expand(m as u32, 16), 0),
            Const::V256(m) => (expand(m & 0xffff, 16), expand(m >> 16, 16)),
        }
    }

    /// The value truncated to 64 bits, as reported in diagnostics.
    pub fn as_u64(&self) -> u64 {
        match *self {
            Const::V128(m) => m as u64,
            Const::V256(m) => m as u64,
            _ => self.raw_bits().0 as u64,
        }
    }

    /// The all-zero constant of an integer or vector type.
    pub fn zero_of(ty: Type) -> Const {
        match ty {
            Type::I1 => Const::U1(false),
            Type::I8 => Const::U8(0),
            Type::I16 => Const::U16(0),
            Type::I32 => Const::U32(0),
            Type::I64 => Const::U64(0),
            Type::I128 => Const::U128(0),
            Type::V128 => Const::V128(0),
            Type::V256 => Const::V256(0),
            _ => panic!("No zero constant for type {}", ty),
        }
    }

    /// An integer constant of type `ty` holding the low bits of `v`.
    pub fn int_of(ty: Type, v: u128) -> Const {
        match ty {
            Type::I1 => Const::U1(v & 1 != 0),
            Type::I8 => Const::U8(v as u8),
            Type::I16 => Const::U16(v as u16),
            Type::I32 => Const::U32(v as u32),
            Type::I64 => Const::U64(v as u64),
            Type::I128 => Const::U128(v),
            _ => panic!("No integer constant for type {}", ty),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Const::U1(b) => write!(f, "{}:I1", b as u8),
            Const::U8(v) => write!(f, "{:#x}:I8", v),
            Const::U16(v) => write!(f, "{:#x}:I16", v),
            Const::U32(v) => write!(f, "{:#x}:I32", v),
            Const::U64(v) => write!(f, "{:#x}:I64", v),
            Const::U128(v) => write!(f, "{:#x}:I128", v),
            Const::F32(v) => write!(f, "{:#x}:F32", v),
            Const::F32i(v) => write!(f, "{:#x}:F32i", v),
            Const::F64(v) => write!(f, "{:#x}:F64", v),
            Const::F64i(v) => write!(f, "{:#x}:F64i", v),
            Const::V128(v) => write!(f, "{:#x}:V128", v),
            Const::V256(v) => write!(f, "{:#x}:V256", v),
        }
    }
}

/// A block-local temporary, identified by its index into the block's [`TypeEnv`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(pub usize);

impl fmt::Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A flat operand: either a temporary or a literal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Atom {
    Tmp(Temp),
    Const(Const),
}

impl Atom {
    pub fn as_temp(&self) -> Option<Temp> {
        match self {
            Atom::Tmp(t) => Some(*t),
            Atom::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<Const> {
        match self {
            Atom::Tmp(_) => None,
            Atom::Const(c) => Some(*c),
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Atom::Const(_))
    }

    pub fn u1(b: bool) -> Atom {
        Atom::Const(Const::U1(b))
    }

    pub fn u8(v: u8) -> Atom {
        Atom::Const(Const::U8(v))
    }

    pub fn u32(v: u32) -> Atom {
        Atom::Const(Const::U32(v))
    }

    pub fn u64(v: u64) -> Atom {
        Atom::Const(Const::U64(v))
    }
}

impl From<Temp> for Atom {
    fn from(t: Temp) -> Self {
        Atom::Tmp(t)
    }
}

impl From<Const> for Atom {
    fn from(c: Const) -> Self {
        Atom::Const(c)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Atom::Tmp(t) => write!(f, "{}", t),
            Atom::Const(c) => write!(f, "{}", c),
        }
    }
}

/// Endianness
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Endness {
    Little,
    Big,
}

impl fmt::Display for Endness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Endness::Little => write!(f, "le"),
            Endness::Big => write!(f, "be"),
        }
    }
}

/// A guest register array, for indexed register access.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegArray {
    /// Guest state offset of the first element
    pub base: u32,
    pub elem_ty: Type,
    pub n_elems: u32,
}

impl fmt::Display for RegArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}:{}x{})", self.base, self.n_elems, self.elem_ty)
    }
}

/// A called helper function.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Callee {
    pub name: String,
    pub regparms: u32,
    /// Bit `i` set means argument `i` does not contribute taint to the result.
    pub mcx_mask: u32,
}

impl Callee {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regparms: 0,
            mcx_mask: 0,
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{{rp={},mcx={:#x}}}",
            self.name, self.regparms, self.mcx_mask
        )
    }
}

/// A side-effect-free expression.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Expr {
    /// Read a guest register at a fixed offset
    Get { offset: u32, ty: Type },
    /// Read a guest register at a non-fixed offset within an array
    GetI {
        descr: RegArray,
        ix: Atom,
        bias: i32,
    },
    RdTmp(Temp),
    Const(Const),
    Unop(Op, Atom),
    Binop(Op, Atom, Atom),
    Triop(Op, Atom, Atom, Atom),
    Qop(Op, Atom, Atom, Atom, Atom),
    Load { end: Endness, ty: Type, addr: Atom },
    /// `if cond then iftrue else iffalse`
    Ite {
        cond: Atom,
        iftrue: Atom,
        iffalse: Atom,
    },
    /// Call to a pure helper function
    CCall {
        callee: Callee,
        retty: Type,
        args: Vec<Atom>,
    },
}

impl Expr {
    /// All atoms read by this expression, in operand order.
    pub fn atoms(&self) -> Vec<Atom> {
        match self {
            Expr::Get { .. } => vec![],
            Expr::GetI { ix, .. } => vec![*ix],
            Expr::RdTmp(t) => vec![Atom::Tmp(*t)],
            Expr::Const(c) => vec![Atom::Const(*c)],
            Expr::Unop(_, a) => vec![*a],
            Expr::Binop(_, a, b) => vec![*a, *b],
            Expr::Triop(_, a, b, c) => vec![*a, *b, *c],
            Expr::Qop(_, a, b, c, d) => vec![*a, *b, *c, *d],
            Expr::Load { addr, .. } => vec![*addr],
            Expr::Ite {
                cond,
                iftrue,
                iffalse,
            } => vec![*cond, *iftrue, *iffalse],
            Expr::CCall { args, .. } => args.clone(),
        }
    }
}

impl From<Atom> for Expr {
    fn from(a: Atom) -> Self {
        match a {
            Atom::Tmp(t) => Expr::RdTmp(t),
            Atom::Const(c) => Expr::Const(c),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Get { offset, ty } => write!(f, "GET:{}({})", ty, offset),
            Expr::GetI { descr, ix, bias } => write!(f, "GETI{}[{},{}]", descr, ix, bias),
            Expr::RdTmp(t) => write!(f, "{}", t),
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Unop(op, a) => write!(f, "{}({})", op.name(), a),
            Expr::Binop(op, a, b) => write!(f, "{}({},{})", op.name(), a, b),
            Expr::Triop(op, a, b, c) => write!(f, "{}({},{},{})", op.name(), a, b, c),
            Expr::Qop(op, a, b, c, d) => write!(f, "{}({},{},{},{})", op.name(), a, b, c, d),
            Expr::Load { end, ty, addr } => write!(f, "LD{}:{}({})", end, ty, addr),
            Expr::Ite {
                cond,
                iftrue,
                iffalse,
            } => write!(f, "ITE({},{},{})", cond, iftrue, iffalse),
            Expr::CCall {
                callee,
                retty,
                args,
            } => {
                write!(f, "CCALL:{} {}(", retty, callee)?;
                write_comma_separated(f, args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_comma_separated<T: fmt::Display>(f: &mut fmt::Formatter, xs: &[T]) -> fmt::Result {
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", x)?;
    }
    Ok(())
}

/// The conversion applied to the result of a guarded load.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LoadGOp {
    IdentV128,
    Ident64,
    Ident32,
    U16to32,
    S16to32,
    U8to32,
    S8to32,
}

impl LoadGOp {
    pub const ALL: &'static [LoadGOp] = &[
        LoadGOp::IdentV128,
        LoadGOp::Ident64,
        LoadGOp::Ident32,
        LoadGOp::U16to32,
        LoadGOp::S16to32,
        LoadGOp::U8to32,
        LoadGOp::S8to32,
    ];

    /// Type of the value read from memory
    pub fn loaded_type(self) -> Type {
        match self {
            LoadGOp::IdentV128 => Type::V128,
            LoadGOp::Ident64 => Type::I64,
            LoadGOp::Ident32 => Type::I32,
            LoadGOp::U16to32 | LoadGOp::S16to32 => Type::I16,
            LoadGOp::U8to32 | LoadGOp::S8to32 => Type::I8,
        }
    }

    /// Type of the value after conversion (and of the alternative value)
    pub fn result_type(self) -> Type {
        match self {
            LoadGOp::IdentV128 => Type::V128,
            LoadGOp::Ident64 => Type::I64,
            _ => Type::I32,
        }
    }

    /// The operator performing the widening, if any
    pub fn widening_op(self) -> Option<Op> {
        match self {
            LoadGOp::IdentV128 | LoadGOp::Ident64 | LoadGOp::Ident32 => None,
            LoadGOp::U16to32 => Some(Op::U16to32),
            LoadGOp::S16to32 => Some(Op::S16to32),
            LoadGOp::U8to32 => Some(Op::U8to32),
            LoadGOp::S8to32 => Some(Op::S8to32),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LoadGOp::IdentV128 => "IdentV128",
            LoadGOp::Ident64 => "Ident64",
            LoadGOp::Ident32 => "Ident32",
            LoadGOp::U16to32 => "16Uto32",
            LoadGOp::S16to32 => "16Sto32",
            LoadGOp::U8to32 => "8Uto32",
            LoadGOp::S8to32 => "8Sto32",
        }
    }

    pub fn from_name(name: &str) -> Option<LoadGOp> {
        LoadGOp::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// A store performed only when `guard` holds.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StoreG {
    pub end: Endness,
    pub addr: Atom,
    pub data: Atom,
    pub guard: Atom,
}

/// `dst = if guard then cvt(LD(addr)) else alt`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct LoadG {
    pub end: Endness,
    pub cvt: LoadGOp,
    pub dst: Temp,
    pub addr: Atom,
    pub alt: Atom,
    pub guard: Atom,
}

/// An atomic compare-and-swap. Single-width if all the `_hi` fields are `None`, double-width if
/// all are `Some`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Cas {
    pub old_hi: Option<Temp>,
    pub old_lo: Temp,
    pub end: Endness,
    pub addr: Atom,
    pub expd_hi: Option<Atom>,
    pub expd_lo: Atom,
    pub data_hi: Option<Atom>,
    pub data_lo: Atom,
}

impl Cas {
    pub fn is_double(&self) -> bool {
        self.old_hi.is_some()
    }
}

/// How a dirty call interacts with some piece of state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Effect {
    Read,
    Write,
    Modify,
}

impl Effect {
    pub fn reads(self) -> bool {
        matches!(self, Effect::Read | Effect::Modify)
    }

    pub fn writes(self) -> bool {
        matches!(self, Effect::Write | Effect::Modify)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Effect::Read => "Rd",
            Effect::Write => "Wr",
            Effect::Modify => "Mo",
        }
    }
}

/// A memory region touched by a dirty call.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MemEffect {
    pub fx: Effect,
    pub addr: Atom,
    pub size: u32,
}

/// A guest-state region touched by a dirty call. The described region is `size` bytes at
/// `offset`, repeated `repeats` more times at a stride of `repeat_len`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GuestEffect {
    pub fx: Effect,
    pub offset: u32,
    pub size: u32,
    pub repeats: u32,
    pub repeat_len: u32,
}

impl GuestEffect {
    pub fn new(fx: Effect, offset: u32, size: u32) -> Self {
        Self {
            fx,
            offset,
            size,
            repeats: 0,
            repeat_len: 0,
        }
    }

    /// The `(offset, size)` of every described segment.
    pub fn segments(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..=self.repeats).map(move |k| (self.offset + k * self.repeat_len, self.size))
    }
}

/// The declared side effects of an opaque call, beyond its arguments and result.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct SideEffects {
    pub mem: Option<MemEffect>,
    pub guest: Vec<GuestEffect>,
}

/// An argument to a dirty call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DirtyArg {
    Atom(Atom),
    /// Slot for a returned vector, passed by reference
    VecRet,
    /// Pointer to the guest state
    GuestStatePtr,
}

impl fmt::Display for DirtyArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DirtyArg::Atom(a) => write!(f, "{}", a),
            DirtyArg::VecRet => write!(f, "VECRET"),
            DirtyArg::GuestStatePtr => write!(f, "GSPTR"),
        }
    }
}

/// A call to an opaque, side-effecting helper.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Dirty {
    pub callee: Callee,
    /// The call happens only if this (`I1`) holds
    pub guard: Atom,
    pub args: Vec<DirtyArg>,
    pub tmp: Option<Temp>,
    pub effects: SideEffects,
}

impl Dirty {
    /// An unconditional call with no declared effects and no result.
    pub fn new(callee: Callee, args: Vec<DirtyArg>) -> Self {
        Self {
            callee,
            guard: Atom::u1(true),
            args,
            tmp: None,
            effects: SideEffects::default(),
        }
    }

    /// Like [`Self::new`], with all arguments being atoms.
    pub fn with_atoms(callee: Callee, args: impl IntoIterator<Item = Atom>) -> Self {
        Self::new(callee, args.into_iter().map(DirtyArg::Atom).collect())
    }
}

/// Memory bus events
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MemBusEvent {
    Fence,
    CancelReservation,
}

/// Kind of control transfer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum JumpKind {
    Boring,
    Call,
    Ret,
    ClientReq,
    Yield,
    EmWarn,
    NoDecode,
    MapFail,
    InvalICache,
    SigTRAP,
    SigSEGV,
    SysSyscall,
}

impl JumpKind {
    pub const ALL: &'static [JumpKind] = &[
        JumpKind::Boring,
        JumpKind::Call,
        JumpKind::Ret,
        JumpKind::ClientReq,
        JumpKind::Yield,
        JumpKind::EmWarn,
        JumpKind::NoDecode,
        JumpKind::MapFail,
        JumpKind::InvalICache,
        JumpKind::SigTRAP,
        JumpKind::SigSEGV,
        JumpKind::SysSyscall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            JumpKind::Boring => "Boring",
            JumpKind::Call => "Call",
            JumpKind::Ret => "Return",
            JumpKind::ClientReq => "ClientReq",
            JumpKind::Yield => "Yield",
            JumpKind::EmWarn => "EmWarn",
            JumpKind::NoDecode => "NoDecode",
            JumpKind::MapFail => "MapFail",
            JumpKind::InvalICache => "InvalICache",
            JumpKind::SigTRAP => "SigTRAP",
            JumpKind::SigSEGV => "SigSEGV",
            JumpKind::SysSyscall => "Sys_syscall",
        }
    }

    pub fn from_name(name: &str) -> Option<JumpKind> {
        JumpKind::ALL.iter().copied().find(|j| j.name() == name)
    }
}

/// A statement. Each statement writes at most one temporary, register or memory location (CAS
/// and dirty calls excepted, which are described by their fields).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Stmt {
    NoOp,
    /// Marks the start of the IR for the guest instruction at `addr`
    IMark {
        addr: u64,
        len: u32,
        delta: u8,
    },
    /// ABI hint: `[base, base+len)` has become undefined
    AbiHint {
        base: Atom,
        len: i32,
        nia: Atom,
    },
    Put {
        offset: u32,
        data: Atom,
    },
    PutI {
        descr: RegArray,
        ix: Atom,
        bias: i32,
        data: Atom,
    },
    WrTmp {
        tmp: Temp,
        data: Expr,
    },
    Store {
        end: Endness,
        addr: Atom,
        data: Atom,
    },
    StoreG(StoreG),
    LoadG(LoadG),
    Cas(Cas),
    /// Load-linked when `storedata` is `None` (`result` gets the loaded value); otherwise
    /// store-conditional (`result` is an `I1` success flag).
    LLSC {
        end: Endness,
        result: Temp,
        addr: Atom,
        storedata: Option<Atom>,
    },
    Dirty(Dirty),
    MBE(MemBusEvent),
    /// Conditional exit to `dst` (written to the guest IP at `offs_ip`) if `guard` holds
    Exit {
        guard: Atom,
        jk: JumpKind,
        dst: Const,
        offs_ip: u32,
    },
}

impl Stmt {
    /// All atoms read by the statement.
    pub fn atoms(&self) -> Vec<Atom> {
        match self {
            Stmt::NoOp | Stmt::IMark { .. } | Stmt::MBE(_) => vec![],
            Stmt::AbiHint { base, nia, .. } => vec![*base, *nia],
            Stmt::Put { data, .. } => vec![*data],
            Stmt::PutI { ix, data, .. } => vec![*ix, *data],
            Stmt::WrTmp { data, .. } => data.atoms(),
            Stmt::Store { addr, data, .. } => vec![*addr, *data],
            Stmt::StoreG(sg) => vec![sg.addr, sg.data, sg.guard],
            Stmt::LoadG(lg) => vec![lg.addr, lg.alt, lg.guard],
            Stmt::Cas(cas) => std::iter::once(cas.addr)
                .chain(cas.expd_hi)
                .chain(std::iter::once(cas.expd_lo))
                .chain(cas.data_hi)
                .chain(std::iter::once(cas.data_lo))
                .collect(),
            Stmt::LLSC {
                addr, storedata, ..
            } => std::iter::once(*addr).chain(*storedata).collect(),
            Stmt::Dirty(d) => {
                let mut r = vec![d.guard];
                r.extend(d.args.iter().filter_map(|a| match a {
                    DirtyArg::Atom(a) => Some(*a),
                    DirtyArg::VecRet | DirtyArg::GuestStatePtr => None,
                }));
                if let Some(m) = &d.effects.mem {
                    r.push(m.addr);
                }
                r
            }
            Stmt::Exit { guard, dst, .. } => vec![*guard, Atom::Const(*dst)],
        }
    }

    /// All temporaries written by the statement.
    pub fn defined_temps(&self) -> Vec<Temp> {
        match self {
            Stmt::WrTmp { tmp, .. } => vec![*tmp],
            Stmt::LoadG(lg) => vec![lg.dst],
            Stmt::Cas(cas) => cas.old_hi.into_iter().chain([cas.old_lo]).collect(),
            Stmt::LLSC { result, .. } => vec![*result],
            Stmt::Dirty(d) => d.tmp.into_iter().collect(),
            _ => vec![],
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stmt::NoOp => write!(f, "IR-NoOp"),
            Stmt::IMark { addr, len, delta } => {
                write!(f, "------ IMark({:#x}, {}, {}) ------", addr, len, delta)
            }
            Stmt::AbiHint { base, len, nia } => {
                write!(f, "====== AbiHint({}, {}, {}) ======", base, len, nia)
            }
            Stmt::Put { offset, data } => write!(f, "PUT({}) = {}", offset, data),
            Stmt::PutI {
                descr,
                ix,
                bias,
                data,
            } => write!(f, "PUTI{}[{},{}] = {}", descr, ix, bias, data),
            Stmt::WrTmp { tmp, data } => write!(f, "{} = {}", tmp, data),
            Stmt::Store { end, addr, data } => write!(f, "ST{}({}) = {}", end, addr, data),
            Stmt::StoreG(sg) => write!(
                f,
                "if ({}) ST{}({}) = {}",
                sg.guard, sg.end, sg.addr, sg.data
            ),
            Stmt::LoadG(lg) => write!(
                f,
                "{} = if ({}) LD{}:{}({}) else {}",
                lg.dst,
                lg.guard,
                lg.end,
                lg.cvt.name(),
                lg.addr,
                lg.alt
            ),
            Stmt::Cas(cas) => match (cas.old_hi, cas.expd_hi, cas.data_hi) {
                (Some(oh), Some(eh), Some(dh)) => write!(
                    f,
                    "{},{} = CAS{}({} :: ({},{})->({},{}))",
                    oh, cas.old_lo, cas.end, cas.addr, eh, cas.expd_lo, dh, cas.data_lo
                ),
                _ => write!(
                    f,
                    "{} = CAS{}({} :: {}->{})",
                    cas.old_lo, cas.end, cas.addr, cas.expd_lo, cas.data_lo
                ),
            },
            Stmt::LLSC {
                end,
                result,
                addr,
                storedata: None,
            } => write!(f, "{} = LD{}-Linked({})", result, end, addr),
            Stmt::LLSC {
                end,
                result,
                addr,
                storedata: Some(data),
            } => write!(f, "{} = ( ST{}-Cond({}) = {} )", result, end, addr, data),
            Stmt::Dirty(d) => {
                if let Some(t) = d.tmp {
                    write!(f, "{} = ", t)?;
                }
                write!(f, "DIRTY {}", d.guard)?;
                if let Some(m) = &d.effects.mem {
                    write!(f, " {}FX-mem({},{})", m.fx.tag(), m.addr, m.size)?;
                }
                for g in &d.effects.guest {
                    if g.repeats == 0 {
                        write!(f, " {}FX-gst({},{})", g.fx.tag(), g.offset, g.size)?;
                    } else {
                        write!(
                            f,
                            " {}FX-gst({},{},{},{})",
                            g.fx.tag(),
                            g.offset,
                            g.size,
                            g.repeats,
                            g.repeat_len
                        )?;
                    }
                }
                write!(f, " ::: {}(", d.callee)?;
                write_comma_separated(f, &d.args)?;
                write!(f, ")")
            }
            Stmt::MBE(MemBusEvent::Fence) => write!(f, "IR-Fence"),
            Stmt::MBE(MemBusEvent::CancelReservation) => write!(f, "IR-CancelReservation"),
            Stmt::Exit {
                guard,
                jk,
                dst,
                offs_ip,
            } => write!(
                f,
                "if ({}) {{ PUT({}) = {}; exit-{} }}",
                guard,
                offs_ip,
                dst,
                jk.name()
            ),
        }
    }
}

/// The types of a block's temporaries. Temporaries are indices into this arena.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct TypeEnv {
    types: Vec<Type>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new temporary of type `ty`
    pub fn new_temp(&mut self, ty: Type) -> Temp {
        self.types.push(ty);
        Temp(self.types.len() - 1)
    }

    pub fn type_of(&self, t: Temp) -> Type {
        match self.types.get(t.0) {
            Some(ty) => *ty,
            None => panic!("Temporary {} out of range of type environment", t),
        }
    }

    pub fn try_type_of(&self, t: Temp) -> Option<Type> {
        self.types.get(t.0).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Temp, Type)> + '_ {
        self.types.iter().enumerate().map(|(i, ty)| (Temp(i), *ty))
    }
}

/// Layout of the guest state, as needed for shadowing registers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GuestLayout {
    /// Size of the real guest state. The shadow register file starts at this offset.
    pub total_size: u32,
    pub offset_sp: u32,
    pub sizeof_sp: u32,
    pub offset_ip: u32,
    pub sizeof_ip: u32,
    /// `(offset, size)` ranges declared by the host as never carrying taint
    pub always_defined: Vec<(u32, u32)>,
}

impl fmt::Display for GuestLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "layout total={} sp={}:{} ip={}:{}",
            self.total_size, self.offset_sp, self.sizeof_sp, self.offset_ip, self.sizeof_ip
        )?;
        if !self.always_defined.is_empty() {
            write!(f, " defined=")?;
            for (i, (off, size)) in self.always_defined.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}:{}", off, size)?;
            }
        }
        Ok(())
    }
}

/// A superblock: a single-entry, multiple-exit sequence of statements.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub tyenv: TypeEnv,
    pub stmts: Vec<Stmt>,
    /// Where to go after the last statement
    pub next: Atom,
    pub jumpkind: JumpKind,
    /// Guest state offset of the instruction pointer
    pub offs_ip: u32,
}

impl Block {
    pub fn new(next: Atom, jumpkind: JumpKind, offs_ip: u32) -> Self {
        Self {
            tyenv: TypeEnv::new(),
            stmts: vec![],
            next,
            jumpkind,
            offs_ip,
        }
    }

    /// A copy of this block, except with no statements.
    pub fn copy_except_stmts(&self) -> Self {
        Self {
            tyenv: self.tyenv.clone(),
            stmts: vec![],
            next: self.next,
            jumpkind: self.jumpkind,
            offs_ip: self.offs_ip,
        }
    }

    pub fn type_of_atom(&self, a: &Atom) -> Type {
        match a {
            Atom::Tmp(t) => self.tyenv.type_of(*t),
            Atom::Const(c) => c.ty(),
        }
    }

    pub fn type_of_expr(&self, e: &Expr) -> Type {
        match e {
            Expr::Get { ty, .. } => *ty,
            Expr::GetI { descr, .. } => descr.elem_ty,
            Expr::RdTmp(t) => self.tyenv.type_of(*t),
            Expr::Const(c) => c.ty(),
            Expr::Unop(op, _)
            | Expr::Binop(op, _, _)
            | Expr::Triop(op, _, _, _)
            | Expr::Qop(op, _, _, _, _) => op.signature().result,
            Expr::Load { ty, .. } => *ty,
            Expr::Ite { iftrue, .. } => self.type_of_atom(iftrue),
            Expr::CCall { retty, .. } => *retty,
        }
    }

    /// Confirms the validity of the block: every temporary referenced exists and is assigned
    /// exactly once before use, and operand types agree with what the statement or operator
    /// expects.
    pub fn try_confirm_valid(&self) -> Result<(), String> {
        let mut defined = vec![false; self.tyenv.len()];

        for (i, stmt) in self.stmts.iter().enumerate() {
            for a in stmt.atoms() {
                if let Atom::Tmp(t) = a {
                    match defined.get(t.0) {
                        None => {
                            return Err(format!(
                                "Statement {} `{}` uses out-of-range temporary {}",
                                i, stmt, t
                            ))
                        }
                        Some(false) => {
                            return Err(format!(
                                "Statement {} `{}` uses {} before its definition",
                                i, stmt, t
                            ))
                        }
                        Some(true) => {}
                    }
                }
            }
            self.try_confirm_stmt_types(stmt)
                .map_err(|e| format!("Statement {} `{}`: {}", i, stmt, e))?;
            for t in stmt.defined_temps() {
                match defined.get_mut(t.0) {
                    None => {
                        return Err(format!(
                            "Statement {} `{}` writes out-of-range temporary {}",
                            i, stmt, t
                        ))
                    }
                    Some(d) if *d => {
                        return Err(format!(
                            "Statement {} `{}` assigns {} a second time",
                            i, stmt, t
                        ))
                    }
                    Some(d) => *d = true,
                }
            }
        }

        if let Atom::Tmp(t) = self.next {
            if !defined.get(t.0).copied().unwrap_or(false) {
                return Err(format!("Block exit uses undefined temporary {}", t));
            }
        }
        Ok(())
    }

    fn try_confirm_stmt_types(&self, stmt: &Stmt) -> Result<(), String> {
        let ty = |a: &Atom| self.type_of_atom(a);
        let expect = |what: &str, got: Type, expected: Type| {
            if got == expected {
                Ok(())
            } else {
                Err(format!("Got {} of type {}. Expected {}.", what, got, expected))
            }
        };
        let expect_word = |what: &str, got: Type| {
            if got == Type::I32 || got == Type::I64 {
                Ok(())
            } else {
                Err(format!("Got {} of type {}. Expected I32 or I64.", what, got))
            }
        };
        match stmt {
            Stmt::NoOp | Stmt::IMark { .. } | Stmt::MBE(_) => Ok(()),
            Stmt::AbiHint { base, nia, .. } => {
                expect_word("base", ty(base))?;
                expect_word("nia", ty(nia))
            }
            Stmt::Put { .. } => Ok(()),
            Stmt::PutI { descr, ix, data, .. } => {
                expect("index", ty(ix), Type::I32)?;
                expect("data", ty(data), descr.elem_ty)
            }
            Stmt::WrTmp { tmp, data } => {
                self.try_confirm_expr_types(data)?;
                expect("expression", self.type_of_expr(data), self.tyenv.type_of(*tmp))
            }
            Stmt::Store { addr, .. } => expect_word("address", ty(addr)),
            Stmt::StoreG(sg) => {
                expect_word("address", ty(&sg.addr))?;
                expect("guard", ty(&sg.guard), Type::I1)
            }
            Stmt::LoadG(lg) => {
                expect_word("address", ty(&lg.addr))?;
                expect("guard", ty(&lg.guard), Type::I1)?;
                expect("alternative", ty(&lg.alt), lg.cvt.result_type())?;
                expect("destination", self.tyenv.type_of(lg.dst), lg.cvt.result_type())
            }
            Stmt::Cas(cas) => {
                expect_word("address", ty(&cas.addr))?;
                let elem = self.tyenv.type_of(cas.old_lo);
                expect("expected value", ty(&cas.expd_lo), elem)?;
                expect("new value", ty(&cas.data_lo), elem)?;
                match (cas.old_hi, cas.expd_hi, cas.data_hi) {
                    (None, None, None) => Ok(()),
                    (Some(oh), Some(eh), Some(dh)) => {
                        expect("old high half", self.tyenv.type_of(oh), elem)?;
                        expect("expected high half", ty(&eh), elem)?;
                        expect("new high half", ty(&dh), elem)
                    }
                    _ => Err("Got a partially double-width CAS".to_string()),
                }
            }
            Stmt::LLSC {
                result,
                addr,
                storedata,
                ..
            } => {
                expect_word("address", ty(addr))?;
                if storedata.is_some() {
                    expect("success flag", self.tyenv.type_of(*result), Type::I1)
                } else {
                    Ok(())
                }
            }
            Stmt::Dirty(d) => {
                expect("guard", ty(&d.guard), Type::I1)?;
                if let Some(m) = &d.effects.mem {
                    expect_word("effect address", ty(&m.addr))?;
                }
                if d.args.contains(&DirtyArg::VecRet) {
                    match d.tmp.map(|t| self.tyenv.type_of(t)) {
                        Some(Type::V128) | Some(Type::V256) | Some(Type::I128) => {}
                        other => {
                            return Err(format!(
                                "Got VECRET argument with result type {:?}",
                                other
                            ))
                        }
                    }
                }
                Ok(())
            }
            Stmt::Exit { guard, dst, .. } => {
                expect("guard", ty(guard), Type::I1)?;
                expect_word("destination", dst.ty())
            }
        }
    }

    fn try_confirm_expr_types(&self, e: &Expr) -> Result<(), String> {
        let ty = |a: &Atom| self.type_of_atom(a);
        let check_op = |op: Op, args: &[&Atom]| {
            let sig = op.signature();
            if sig.args.len() != args.len() {
                return Err(format!(
                    "Operator {} takes {} arguments, got {}",
                    op.name(),
                    sig.args.len(),
                    args.len()
                ));
            }
            for (i, (a, expected)) in args.iter().zip(sig.args.iter()).enumerate() {
                if ty(a) != *expected {
                    return Err(format!(
                        "Operator {} argument {} has type {}. Expected {}.",
                        op.name(),
                        i,
                        ty(a),
                        expected
                    ));
                }
            }
            Ok(())
        };
        match e {
            Expr::Get { .. } | Expr::RdTmp(_) | Expr::Const(_) => Ok(()),
            Expr::GetI { ix, .. } => {
                if ty(ix) == Type::I32 {
                    Ok(())
                } else {
                    Err(format!("Indexed read with index of type {}", ty(ix)))
                }
            }
            Expr::Unop(op, a) => check_op(*op, &[a]),
            Expr::Binop(op, a, b) => check_op(*op, &[a, b]),
            Expr::Triop(op, a, b, c) => check_op(*op, &[a, b, c]),
            Expr::Qop(op, a, b, c, d) => check_op(*op, &[a, b, c, d]),
            Expr::Load { addr, .. } => match ty(addr) {
                Type::I32 | Type::I64 => Ok(()),
                t => Err(format!("Load from address of type {}", t)),
            },
            Expr::Ite {
                cond,
                iftrue,
                iffalse,
            } => {
                if ty(cond) != Type::I1 {
                    Err(format!("ITE condition of type {}", ty(cond)))
                } else if ty(iftrue) != ty(iffalse) {
                    Err(format!(
                        "ITE branches of types {} and {}",
                        ty(iftrue),
                        ty(iffalse)
                    ))
                } else {
                    Ok(())
                }
            }
            Expr::CCall { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "IRSB {{")?;
        write!(f, "   temps:")?;
        for (t, ty) in self.tyenv.iter() {
            write!(f, " {}:{}", t, ty)?;
        }
        writeln!(f)?;
        for s in &self.stmts {
            writeln!(f, "   {}", s)?;
        }
        writeln!(
            f,
            "   PUT({}) = {}; exit-{}",
            self.offs_ip,
            self.next,
            self.jumpkind.name()
        )?;
        write!(f, "}}")
    }
}
