//! A reference interpreter for blocks, original or instrumented.
//!
//! The interpreter runs one block at a time against a [`Machine`]: a flat guest state (the real
//! registers followed by their shadows), byte-addressed memory and a [`ShadowMemory`]. Calls to
//! the shadow memory helpers and the reporting helpers emitted by the instrumenter are resolved
//! internally; any other helper must be registered with [`Machine::register_helper`].
//!
//! Floating-point and decimal arithmetic is not modelled. Executing such an operator is an error
//! naming the operator.

use crate::containers::unordered::UnorderedMap;
use crate::diagnostics::{decode_string, DiagnosticKind, TERMINATOR};
use crate::ir::{
    Atom, Block, Cas, Const, Dirty, DirtyArg, Endness, Expr, GuestLayout, JumpKind, RegArray,
    Stmt, Temp, Type,
};
use crate::log::*;
use crate::memory::HelperKind;
use crate::ops::Op;
use crate::shadow_memory::{ByteShadowMemory, ShadowMemory};
use crate::shadow_types::shadow_type;
use std::fmt;

fn mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Sign-extend the low `bits` of `v`
fn sext(v: u128, bits: u32) -> i128 {
    let sh = 128 - bits;
    ((v << sh) as i128) >> sh
}

/// A run-time value. Values are kept as raw bits: `lo` holds the low 128 bits, and `hi` the upper
/// half of a `V256`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Value {
    pub ty: Type,
    pub lo: u128,
    pub hi: u128,
}

impl Value {
    /// A value of type `ty` holding the low bits of `v`.
    pub fn new(ty: Type, v: u128) -> Self {
        Self {
            ty,
            lo: v & mask(ty.bits()),
            hi: 0,
        }
    }

    pub fn wide(lo: u128, hi: u128) -> Self {
        Self {
            ty: Type::V256,
            lo,
            hi,
        }
    }

    pub fn zero(ty: Type) -> Self {
        Self { ty, lo: 0, hi: 0 }
    }

    pub fn from_const(c: &Const) -> Self {
        let (lo, hi) = c.raw_bits();
        Self { ty: c.ty(), lo, hi }
    }

    pub fn as_u64(&self) -> u64 {
        self.lo as u64
    }

    pub fn as_bool(&self) -> bool {
        self.lo & 1 != 0
    }

    pub fn is_zero(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    fn bool(b: bool) -> Self {
        Self::new(Type::I1, b as u128)
    }

    fn signed(&self) -> i128 {
        sext(self.lo, self.ty.bits().min(128))
    }

    /// Little-endian bytes of the value
    fn to_le_bytes(self) -> Vec<u8> {
        let n = self.ty.size_bytes() as usize;
        let mut bytes = self.lo.to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.hi.to_le_bytes());
        bytes.truncate(n);
        bytes
    }

    fn from_le_bytes(ty: Type, bytes: &[u8]) -> Self {
        let word = |b: &[u8]| {
            b.iter()
                .enumerate()
                .fold(0u128, |acc, (i, x)| acc | ((*x as u128) << (8 * i)))
        };
        let (lo, hi) = if bytes.len() > 16 {
            (word(&bytes[..16]), word(&bytes[16..]))
        } else {
            (word(bytes), 0)
        };
        Self { ty, lo, hi }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ty == Type::V256 {
            write!(f, "{:#x}_{:032x}:{}", self.hi, self.lo, self.ty)
        } else {
            write!(f, "{:#x}:{}", self.lo, self.ty)
        }
    }
}

/// A statement reported at run time because one of its operands was tainted.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TaintEvent {
    pub kind: DiagnosticKind,
    /// The statement description, without its terminator
    pub text: String,
    /// Real values of the reported operands, as host words
    pub values: Vec<u64>,
    /// Labels of the reported operands, as host words
    pub shadows: Vec<u64>,
}

impl fmt::Display for TaintEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} | {}", self.kind, self.text)?;
        for (v, s) in self.values.iter().zip(&self.shadows) {
            write!(f, " | {:#x} ({:#x})", v, s)?;
        }
        Ok(())
    }
}

/// How a block was left.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockExit {
    pub jumpkind: JumpKind,
    pub target: u64,
    /// Index of the side exit taken, or `None` when the block ran to its end
    pub stmt_index: Option<usize>,
}

/// The outcome of running one block.
#[derive(Clone, Debug)]
pub struct Execution {
    pub exit: BlockExit,
    /// Values of the block's temporaries. Temporaries never written are `None`.
    pub temps: Vec<Option<Value>>,
}

impl Execution {
    pub fn temp(&self, t: Temp) -> Option<Value> {
        self.temps.get(t.0).copied().flatten()
    }
}

/// A helper function callable from a block. Receives the call's atom arguments.
pub type Helper = Box<dyn FnMut(&[Value]) -> Result<Value, String>>;

/// Recognise `helperc_{n}_tainted_enc{32|64}`, returning `n`.
fn reporting_helper_operands(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("helperc_")?;
    let (n, enc) = rest.split_once("_tainted_enc")?;
    if enc != "32" && enc != "64" {
        return None;
    }
    n.parse().ok()
}

/// Guest state, memory and shadow memory.
pub struct Machine<M: ShadowMemory = ByteShadowMemory> {
    pub layout: GuestLayout,
    pub host_word: Type,
    /// Real guest state followed by the shadow register file, both `layout.total_size` bytes
    guest: Vec<u8>,
    memory: UnorderedMap<u64, u8>,
    pub shadow_memory: M,
    pub events: Vec<TaintEvent>,
    helpers: UnorderedMap<String, Helper>,
}

impl Machine<ByteShadowMemory> {
    pub fn new(layout: GuestLayout, host_word: Type) -> Self {
        Self::with_shadow_memory(layout, host_word, ByteShadowMemory::new())
    }
}

impl<M: ShadowMemory> Machine<M> {
    pub fn with_shadow_memory(layout: GuestLayout, host_word: Type, shadow_memory: M) -> Self {
        let size = 2 * layout.total_size as usize;
        Self {
            layout,
            host_word,
            guest: vec![0; size],
            memory: UnorderedMap::new(),
            shadow_memory,
            events: vec![],
            helpers: UnorderedMap::new(),
        }
    }

    pub fn register_helper(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.helpers.insert(name.into(), Box::new(f));
    }

    fn guest_range(&self, offset: u32, ty: Type) -> Result<std::ops::Range<usize>, String> {
        let start = offset as usize;
        let end = start + ty.size_bytes() as usize;
        if end > self.guest.len() {
            return Err(format!(
                "Guest state access of {} at offset {} is out of bounds",
                ty, offset
            ));
        }
        Ok(start..end)
    }

    /// Read the guest state at `offset`. Offsets past the real state address the shadow file.
    pub fn get_reg(&self, offset: u32, ty: Type) -> Result<Value, String> {
        let r = self.guest_range(offset, ty)?;
        Ok(Value::from_le_bytes(ty, &self.guest[r]))
    }

    pub fn put_reg(&mut self, offset: u32, v: Value) -> Result<(), String> {
        let r = self.guest_range(offset, v.ty)?;
        self.guest[r].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// The label of the register of type `ty` at `offset`.
    pub fn shadow_reg(&self, offset: u32, ty: Type) -> Result<Value, String> {
        self.get_reg(offset + self.layout.total_size, shadow_type(ty))
    }

    pub fn set_shadow_reg(&mut self, offset: u32, label: Value) -> Result<(), String> {
        self.put_reg(offset + self.layout.total_size, label)
    }

    pub fn load_mem(&self, end: Endness, ty: Type, addr: u64) -> Value {
        let n = ty.size_bytes() as u64;
        let mut bytes: Vec<u8> = (0..n)
            .map(|i| {
                self.memory
                    .get(&addr.wrapping_add(i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        if end == Endness::Big {
            bytes.reverse();
        }
        Value::from_le_bytes(ty, &bytes)
    }

    pub fn store_mem(&mut self, end: Endness, addr: u64, v: Value) {
        let mut bytes = v.to_le_bytes();
        if end == Endness::Big {
            bytes.reverse();
        }
        for (i, b) in bytes.into_iter().enumerate() {
            self.memory.insert(addr.wrapping_add(i as u64), b);
        }
    }

    /// Run `block` from its first statement until it exits.
    pub fn run(&mut self, block: &Block) -> Result<Execution, String> {
        let mut frame = Frame {
            block,
            temps: vec![None; block.tyenv.len()],
        };
        for (i, stmt) in block.stmts.iter().enumerate() {
            trace!("Executing"; "stmt" => %stmt);
            if let Some(exit) = self
                .exec_stmt(&mut frame, stmt)
                .map_err(|e| format!("Statement {} `{}`: {}", i, stmt, e))?
            {
                return Ok(Execution {
                    exit: BlockExit {
                        stmt_index: Some(i),
                        ..exit
                    },
                    temps: frame.temps,
                });
            }
        }
        let next = frame.atom(&block.next)?;
        self.put_reg(block.offs_ip, next)?;
        Ok(Execution {
            exit: BlockExit {
                jumpkind: block.jumpkind,
                target: next.as_u64(),
                stmt_index: None,
            },
            temps: frame.temps,
        })
    }

    fn element_offset(&self, descr: &RegArray, ix: Value, bias: i32) -> u32 {
        let n = descr.n_elems as i64;
        let i = ((ix.signed() as i64 + bias as i64) % n + n) % n;
        descr.base + i as u32 * descr.elem_ty.size_bytes()
    }

    fn exec_stmt(&mut self, fr: &mut Frame, stmt: &Stmt) -> Result<Option<BlockExit>, String> {
        match stmt {
            Stmt::NoOp | Stmt::IMark { .. } | Stmt::AbiHint { .. } | Stmt::MBE(_) => {}
            Stmt::Put { offset, data } => {
                let v = fr.atom(data)?;
                self.put_reg(*offset, v)?;
            }
            Stmt::PutI {
                descr,
                ix,
                bias,
                data,
            } => {
                let off = self.element_offset(descr, fr.atom(ix)?, *bias);
                let v = fr.atom(data)?;
                self.put_reg(off, v)?;
            }
            Stmt::WrTmp { tmp, data } => {
                let v = self.eval(fr, data)?;
                fr.set(*tmp, v);
            }
            Stmt::Store { end, addr, data } => {
                let a = fr.atom(addr)?.as_u64();
                let v = fr.atom(data)?;
                self.store_mem(*end, a, v);
            }
            Stmt::StoreG(sg) => {
                if fr.atom(&sg.guard)?.as_bool() {
                    let a = fr.atom(&sg.addr)?.as_u64();
                    let v = fr.atom(&sg.data)?;
                    self.store_mem(sg.end, a, v);
                }
            }
            Stmt::LoadG(lg) => {
                let v = if fr.atom(&lg.guard)?.as_bool() {
                    let a = fr.atom(&lg.addr)?.as_u64();
                    let loaded = self.load_mem(lg.end, lg.cvt.loaded_type(), a);
                    match lg.cvt.widening_op() {
                        Some(op) => eval_unop(op, loaded)?,
                        None => loaded,
                    }
                } else {
                    fr.atom(&lg.alt)?
                };
                fr.set(lg.dst, v);
            }
            Stmt::Cas(cas) => self.exec_cas(fr, cas)?,
            Stmt::LLSC {
                end,
                result,
                addr,
                storedata,
            } => {
                let a = fr.atom(addr)?.as_u64();
                match storedata {
                    None => {
                        let ty = fr.block.tyenv.type_of(*result);
                        let v = self.load_mem(*end, ty, a);
                        fr.set(*result, v);
                    }
                    Some(d) => {
                        let v = fr.atom(d)?;
                        self.store_mem(*end, a, v);
                        fr.set(*result, Value::bool(true));
                    }
                }
            }
            Stmt::Dirty(d) => self.exec_dirty(fr, d)?,
            Stmt::Exit {
                guard,
                jk,
                dst,
                offs_ip,
            } => {
                if fr.atom(guard)?.as_bool() {
                    let v = Value::from_const(dst);
                    self.put_reg(*offs_ip, v)?;
                    return Ok(Some(BlockExit {
                        jumpkind: *jk,
                        target: v.as_u64(),
                        stmt_index: None,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn exec_cas(&mut self, fr: &mut Frame, cas: &Cas) -> Result<(), String> {
        let elem = fr.block.tyenv.type_of(cas.old_lo);
        let addr = fr.atom(&cas.addr)?.as_u64();
        let expd_lo = fr.atom(&cas.expd_lo)?;
        let data_lo = fr.atom(&cas.data_lo)?;
        match (cas.old_hi, cas.expd_hi, cas.data_hi) {
            (None, None, None) => {
                let old = self.load_mem(cas.end, elem, addr);
                if old == expd_lo {
                    self.store_mem(cas.end, addr, data_lo);
                }
                fr.set(cas.old_lo, old);
            }
            (Some(old_hi), Some(expd_hi), Some(data_hi)) => {
                let size = elem.size_bytes() as u64;
                let (hi_addr, lo_addr) = match cas.end {
                    Endness::Little => (addr + size, addr),
                    Endness::Big => (addr, addr + size),
                };
                let oh = self.load_mem(cas.end, elem, hi_addr);
                let ol = self.load_mem(cas.end, elem, lo_addr);
                if oh == fr.atom(&expd_hi)? && ol == expd_lo {
                    let dh = fr.atom(&data_hi)?;
                    self.store_mem(cas.end, hi_addr, dh);
                    self.store_mem(cas.end, lo_addr, data_lo);
                }
                fr.set(old_hi, oh);
                fr.set(cas.old_lo, ol);
            }
            _ => return Err("Partially double-width CAS".to_string()),
        }
        Ok(())
    }

    fn exec_dirty(&mut self, fr: &mut Frame, d: &Dirty) -> Result<(), String> {
        let result_ty = d.tmp.map(|t| fr.block.tyenv.type_of(t));
        if !fr.atom(&d.guard)?.as_bool() {
            if let (Some(t), Some(ty)) = (d.tmp, result_ty) {
                fr.set(t, Value::zero(ty));
            }
            return Ok(());
        }
        let args = d
            .args
            .iter()
            .filter_map(|a| match a {
                DirtyArg::Atom(a) => Some(fr.atom(a)),
                DirtyArg::VecRet | DirtyArg::GuestStatePtr => None,
            })
            .collect::<Result<Vec<_>, _>>()?;
        let name = d.callee.name.as_str();

        let result = if let Some(helper) = HelperKind::from_name(name) {
            self.shadow_helper(helper, &args, result_ty)?
        } else if let Some(n) = reporting_helper_operands(name) {
            self.report(n, &args)?;
            None
        } else {
            Some(self.call_helper(name, &args)?)
        };

        if let Some(t) = d.tmp {
            let ty = fr.block.tyenv.type_of(t);
            let v = result.unwrap_or_else(|| Value::zero(ty));
            fr.set(t, Value { ty, ..v });
        }
        Ok(())
    }

    fn call_helper(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        match self.helpers.get_mut(&name.to_string()) {
            Some(h) => h(args),
            None => Err(format!("No helper registered for {}", name)),
        }
    }

    fn shadow_helper(
        &mut self,
        helper: HelperKind,
        args: &[Value],
        result_ty: Option<Type>,
    ) -> Result<Option<Value>, String> {
        let addr = args
            .first()
            .ok_or_else(|| format!("{} called without an address", helper))?
            .as_u64();
        let end = helper.end();
        match helper {
            HelperKind::Load { size, .. } => {
                let ty = result_ty.ok_or_else(|| format!("{} without a result", helper))?;
                let v = if size == 32 {
                    let (hi_addr, lo_addr) = match end {
                        Endness::Little => (addr + 16, addr),
                        Endness::Big => (addr, addr + 16),
                    };
                    Value::wide(
                        self.shadow_memory.load_shadow(lo_addr, 16, end),
                        self.shadow_memory.load_shadow(hi_addr, 16, end),
                    )
                } else {
                    Value::new(ty, self.shadow_memory.load_shadow(addr, size, end))
                };
                Ok(Some(v))
            }
            HelperKind::Store { size, .. } => {
                let data = args
                    .get(1)
                    .ok_or_else(|| format!("{} called without data", helper))?;
                self.shadow_memory
                    .store_shadow(addr, size, end, data.lo & mask(8 * size));
                Ok(None)
            }
        }
    }

    /// Handle a reporting helper call with `n` operands: the encoded description, then `n` values,
    /// then `n` labels.
    fn report(&mut self, n: usize, args: &[Value]) -> Result<(), String> {
        if args.len() < 2 * n + 1 {
            return Err(format!("Reporting helper with {} arguments", args.len()));
        }
        let (enc, rest) = args.split_at(args.len() - 2 * n);
        let (values, shadows) = rest.split_at(n);
        let mut words: Vec<u32> = match self.host_word {
            Type::I64 => enc
                .iter()
                .flat_map(|w| [(w.lo >> 32) as u32, w.lo as u32])
                .collect(),
            _ => enc.iter().map(|w| w.lo as u32).collect(),
        };
        let kind = words
            .first()
            .and_then(|w| DiagnosticKind::from_tag(*w))
            .ok_or_else(|| format!("Unknown description tag in {:x?}", words))?;
        words.truncate(kind.words());
        if shadows.iter().all(|s| s.is_zero()) {
            return Ok(());
        }
        let (_, text) = decode_string(&words);
        let event = TaintEvent {
            kind,
            text: text.trim_end_matches(TERMINATOR).to_string(),
            values: values.iter().map(|v| v.as_u64()).collect(),
            shadows: shadows.iter().map(|v| v.as_u64()).collect(),
        };
        info!("Tainted"; "event" => %event);
        self.events.push(event);
        Ok(())
    }

    fn eval(&mut self, fr: &Frame, e: &Expr) -> Result<Value, String> {
        Ok(match e {
            Expr::Get { offset, ty } => self.get_reg(*offset, *ty)?,
            Expr::GetI { descr, ix, bias } => {
                let off = self.element_offset(descr, fr.atom(ix)?, *bias);
                self.get_reg(off, descr.elem_ty)?
            }
            Expr::RdTmp(t) => fr.atom(&Atom::Tmp(*t))?,
            Expr::Const(c) => Value::from_const(c),
            Expr::Unop(op, a) => eval_unop(*op, fr.atom(a)?)?,
            Expr::Binop(op, a, b) => eval_binop(*op, fr.atom(a)?, fr.atom(b)?)?,
            Expr::Triop(op, a, b, c) => eval_triop(*op, fr.atom(a)?, fr.atom(b)?, fr.atom(c)?)?,
            Expr::Qop(op, a, b, c, d) => eval_qop(
                *op,
                [fr.atom(a)?, fr.atom(b)?, fr.atom(c)?, fr.atom(d)?],
            )?,
            Expr::Load { end, ty, addr } => {
                let a = fr.atom(addr)?.as_u64();
                self.load_mem(*end, *ty, a)
            }
            Expr::Ite {
                cond,
                iftrue,
                iffalse,
            } => {
                if fr.atom(cond)?.as_bool() {
                    fr.atom(iftrue)?
                } else {
                    fr.atom(iffalse)?
                }
            }
            Expr::CCall {
                callee,
                retty,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|a| fr.atom(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let v = self.call_helper(&callee.name, &args)?;
                Value { ty: *retty, ..v }
            }
        })
    }
}

/// Per-run state of one block
struct Frame<'a> {
    block: &'a Block,
    temps: Vec<Option<Value>>,
}

impl<'a> Frame<'a> {
    fn atom(&self, a: &Atom) -> Result<Value, String> {
        match a {
            Atom::Const(c) => Ok(Value::from_const(c)),
            Atom::Tmp(t) => self
                .temps
                .get(t.0)
                .copied()
                .flatten()
                .ok_or_else(|| format!("Read of unassigned temporary {}", t)),
        }
    }

    fn set(&mut self, t: Temp, v: Value) {
        let ty = self.block.tyenv.type_of(t);
        self.temps[t.0] = Some(Value { ty, ..v });
    }
}

fn unsupported(op: Op) -> String {
    format!("Operator {} is not supported by the interpreter", op.name())
}

fn lane(v: u128, i: u32, bits: u32) -> u128 {
    (v >> (i * bits)) & mask(bits)
}

/// Build a `width`-bit value from `width / bits` lanes computed by `f`.
fn from_lanes(width: u32, bits: u32, f: impl Fn(u32) -> u128) -> u128 {
    (0..width / bits).fold(0u128, |acc, i| acc | ((f(i) & mask(bits)) << (i * bits)))
}

fn map_lanes(width: u32, bits: u32, a: u128, f: impl Fn(u128) -> u128) -> u128 {
    from_lanes(width, bits, |i| f(lane(a, i, bits)))
}

fn zip_lanes(width: u32, bits: u32, a: u128, b: u128, f: impl Fn(u128, u128) -> u128) -> u128 {
    from_lanes(width, bits, |i| f(lane(a, i, bits), lane(b, i, bits)))
}

fn saturate_signed(v: i128, bits: u32) -> u128 {
    let max = (1i128 << (bits - 1)) - 1;
    let min = -(1i128 << (bits - 1));
    (v.clamp(min, max) as u128) & mask(bits)
}

fn saturate_unsigned(v: i128, bits: u32) -> u128 {
    v.clamp(0, mask(bits) as i128) as u128
}

fn shift_left(x: u128, n: u128, bits: u32) -> u128 {
    if n >= bits as u128 {
        0
    } else {
        (x << n) & mask(bits)
    }
}

fn shift_right(x: u128, n: u128, bits: u32) -> u128 {
    if n >= bits as u128 {
        0
    } else {
        x >> n
    }
}

fn shift_right_arith(x: u128, n: u128, bits: u32) -> u128 {
    let n = n.min(bits as u128 - 1) as u32;
    (sext(x, bits) >> n) as u128 & mask(bits)
}

#[derive(Clone, Copy)]
enum LaneFn {
    Add,
    Sub,
    Mul,
    MulHiU,
    MulHiS,
    QAddU,
    QAddS,
    QSubU,
    QSubS,
    AvgU,
    MaxU,
    MinU,
    MaxS,
    MinS,
    CmpEQ,
    CmpGTS,
    Shl,
    Shr,
    Sar,
}

impl LaneFn {
    fn apply(self, x: u128, y: u128, bits: u32) -> u128 {
        let (sx, sy) = (sext(x, bits), sext(y, bits));
        let all = mask(bits);
        match self {
            LaneFn::Add => x.wrapping_add(y),
            LaneFn::Sub => x.wrapping_sub(y),
            LaneFn::Mul => x.wrapping_mul(y),
            LaneFn::MulHiU => (x * y) >> bits,
            LaneFn::MulHiS => ((sx * sy) >> bits) as u128,
            LaneFn::QAddU => saturate_unsigned(x as i128 + y as i128, bits),
            LaneFn::QAddS => saturate_signed(sx + sy, bits),
            LaneFn::QSubU => x.saturating_sub(y),
            LaneFn::QSubS => saturate_signed(sx - sy, bits),
            LaneFn::AvgU => (x + y + 1) >> 1,
            LaneFn::MaxU => x.max(y),
            LaneFn::MinU => x.min(y),
            LaneFn::MaxS => sx.max(sy) as u128,
            LaneFn::MinS => sx.min(sy) as u128,
            LaneFn::CmpEQ => {
                if x == y {
                    all
                } else {
                    0
                }
            }
            LaneFn::CmpGTS => {
                if sx > sy {
                    all
                } else {
                    0
                }
            }
            LaneFn::Shl => shift_left(x, y, bits),
            LaneFn::Shr => shift_right(x, y, bits),
            LaneFn::Sar => shift_right_arith(x, y, bits),
        }
    }
}

/// The per-lane function and lane width of a lane-wise binary operator.
fn lane_binop(op: Op) -> Option<(LaneFn, u32)> {
    use LaneFn as L;
    use Op::*;
    Some(match op {
        Add8x16 | Add8x8 | Add8x32 => (L::Add, 8),
        Add16x8 | Add16x4 | Add16x16 => (L::Add, 16),
        Add32x4 | Add32x2 | Add32x8 => (L::Add, 32),
        Add64x2 | Add64x4 => (L::Add, 64),
        Sub8x16 | Sub8x8 | Sub8x32 => (L::Sub, 8),
        Sub16x8 | Sub16x4 | Sub16x16 => (L::Sub, 16),
        Sub32x4 | Sub32x2 | Sub32x8 => (L::Sub, 32),
        Sub64x2 | Sub64x4 => (L::Sub, 64),
        Mul8x16 => (L::Mul, 8),
        Mul16x8 | Mul16x4 => (L::Mul, 16),
        Mul32x4 => (L::Mul, 32),
        MulHi16Ux8 => (L::MulHiU, 16),
        MulHi16Sx8 | MulHi16Sx4 => (L::MulHiS, 16),
        QAdd8Ux16 | QAdd8Ux8 => (L::QAddU, 8),
        QAdd8Sx16 => (L::QAddS, 8),
        QAdd16Ux8 => (L::QAddU, 16),
        QAdd16Sx8 => (L::QAddS, 16),
        QSub8Ux16 => (L::QSubU, 8),
        QSub16Sx8 => (L::QSubS, 16),
        Avg8Ux16 | Avg8Ux8 => (L::AvgU, 8),
        Max8Ux16 | Max8Ux8 | Max8Ux32 => (L::MaxU, 8),
        Min8Ux16 | Min8Ux8 | Min8Ux32 => (L::MinU, 8),
        Max16Sx8 => (L::MaxS, 16),
        Min16Sx8 => (L::MinS, 16),
        Max32Sx4 => (L::MaxS, 32),
        Min32Sx4 => (L::MinS, 32),
        CmpEQ8x16 | CmpEQ8x8 | CmpEQ8x32 => (L::CmpEQ, 8),
        CmpEQ16x8 | CmpEQ16x4 => (L::CmpEQ, 16),
        CmpEQ32x4 | CmpEQ32x2 | CmpEQ32x8 => (L::CmpEQ, 32),
        CmpEQ64x2 => (L::CmpEQ, 64),
        CmpGT8Sx16 | CmpGT8Sx8 => (L::CmpGTS, 8),
        CmpGT16Sx8 => (L::CmpGTS, 16),
        CmpGT32Sx4 | CmpGT32Sx8 => (L::CmpGTS, 32),
        CmpGT64Sx2 => (L::CmpGTS, 64),
        Shl8x16 => (L::Shl, 8),
        Shl16x8 => (L::Shl, 16),
        Shl32x4 => (L::Shl, 32),
        Shl64x2 => (L::Shl, 64),
        Shr8x16 => (L::Shr, 8),
        Shr16x8 => (L::Shr, 16),
        Shr32x4 => (L::Shr, 32),
        Shr64x2 => (L::Shr, 64),
        Sar8x16 => (L::Sar, 8),
        Sar16x8 => (L::Sar, 16),
        Sar32x4 => (L::Sar, 32),
        Sar64x2 => (L::Sar, 64),
        _ => return None,
    })
}

/// Lane-wise shifts by a scalar amount
fn lane_shift_n(op: Op) -> Option<(LaneFn, u32)> {
    use LaneFn as L;
    use Op::*;
    Some(match op {
        ShlN8x16 => (L::Shl, 8),
        ShlN16x8 | ShlN16x4 | ShlN16x16 => (L::Shl, 16),
        ShlN32x4 | ShlN32x2 => (L::Shl, 32),
        ShlN64x2 => (L::Shl, 64),
        ShrN8x16 => (L::Shr, 8),
        ShrN16x8 | ShrN16x4 => (L::Shr, 16),
        ShrN32x4 | ShrN32x8 => (L::Shr, 32),
        ShrN64x2 => (L::Shr, 64),
        SarN8x16 => (L::Sar, 8),
        SarN16x8 | SarN16x4 | SarN16x16 => (L::Sar, 16),
        SarN32x4 => (L::Sar, 32),
        _ => return None,
    })
}

/// Apply a 128-bit-or-narrower lane computation to each 128-bit half of a value.
fn per_half(v: Value, w: Value, rty: Type, f: impl Fn(u128, u128, u32) -> u128) -> Value {
    match rty {
        Type::V256 => Value::wide(f(v.lo, w.lo, 128), f(v.hi, w.hi, 128)),
        _ => Value::new(rty, f(v.lo, w.lo, rty.bits())),
    }
}

pub fn eval_unop(op: Op, a: Value) -> Result<Value, String> {
    use Op::*;
    let rty = op.signature().result;
    let abits = a.ty.bits();
    let r = |v: u128| Value::new(rty, v);
    let lanes_nez = |bits: u32| {
        per_half(a, a, rty, |x, _, w| {
            map_lanes(w, bits, x, |l| if l != 0 { mask(bits) } else { 0 })
        })
    };
    Ok(match op {
        Not1 | Not8 | Not16 | Not32 | Not64 | NotV128 => r(!a.lo),
        NotV256 => Value::wide(!a.lo, !a.hi),
        CmpNEZ8 | CmpNEZ16 | CmpNEZ32 | CmpNEZ64 => Value::bool(a.lo != 0),
        CmpwNEZ32 | CmpwNEZ64 => r(if a.lo != 0 { u128::MAX } else { 0 }),
        Left8 | Left16 | Left32 | Left64 => r(a.lo | a.lo.wrapping_neg()),
        Clz32 => r((a.lo as u32).leading_zeros() as u128),
        Clz64 => r((a.lo as u64).leading_zeros() as u128),
        Ctz32 => r((a.lo as u32).trailing_zeros() as u128),
        Ctz64 => r((a.lo as u64).trailing_zeros() as u128),

        U1to8 | U1to32 | U1to64 | U8to16 | U8to32 | U8to64 | U16to32 | U16to64 | U32to64
        | Trunc64to1 | Trunc32to1 | Trunc64to8 | Trunc32to8 | Trunc64to16 | Trunc32to16
        | Trunc16to8 | Trunc64to32 | Trunc128to64 | ReinterpF64asI64 | ReinterpI64asF64
        | ReinterpF32asI32 | ReinterpI32asF32 | ReinterpD64asI64 | ReinterpI64asD64
        | F128LOtoF64 | D128LOtoD64 | V128to64 | V128to32 | U32toV128 | U64toV128
        | V256to64_0 | V256toV128_0 => r(a.lo),
        S1to8 | S1to16 | S1to32 | S1to64 | S8to16 | S8to32 | S8to64 | S16to32 | S16to64
        | S32to64 => r(sext(a.lo, abits) as u128),
        Hi16to8 => r(a.lo >> 8),
        Hi32to16 => r(a.lo >> 16),
        Hi64to32 => r(a.lo >> 32),
        Hi128to64 | V128HIto64 | F128HItoF64 | D128HItoD64 | V256to64_1 => r(a.lo >> 64),
        V256to64_2 | V256toV128_1 => r(a.hi),
        V256to64_3 => r(a.hi >> 64),

        Dup8x16 => r(map_lanes(128, 8, 0, |_| a.lo)),
        Dup16x8 => r(map_lanes(128, 16, 0, |_| a.lo)),
        Dup32x4 => r(map_lanes(128, 32, 0, |_| a.lo)),

        CmpNEZ8x16 | CmpNEZ8x8 => lanes_nez(8),
        CmpNEZ16x8 | CmpNEZ16x4 => lanes_nez(16),
        CmpNEZ32x4 | CmpNEZ32x2 | CmpNEZ32x8 => lanes_nez(32),
        CmpNEZ64x2 | CmpNEZ64x4 => lanes_nez(64),
        Abs8x16 | Abs16x8 | Abs32x4 => {
            let bits = match op {
                Abs8x16 => 8,
                Abs16x8 => 16,
                _ => 32,
            };
            r(map_lanes(128, bits, a.lo, |l| sext(l, bits).unsigned_abs()))
        }
        Reverse8sIn32_x4 => r(map_lanes(128, 32, a.lo, |l| (l as u32).swap_bytes() as u128)),
        Reverse8sIn64_x2 => r(map_lanes(128, 64, a.lo, |l| (l as u64).swap_bytes() as u128)),
        Reverse16sIn32_x4 => r(map_lanes(128, 32, a.lo, |l| {
            (l as u32).rotate_left(16) as u128
        })),

        NarrowUn16to8x8 => r(narrow(a.lo, 16, |l| l & 0xff)),
        NarrowUn32to16x4 => r(narrow(a.lo, 32, |l| l & 0xffff)),
        NarrowUn64to32x2 => r(narrow(a.lo, 64, |l| l & 0xffff_ffff)),
        QNarrowUn16Sto8Sx8 => r(narrow(a.lo, 16, |l| saturate_signed(sext(l, 16), 8))),
        QNarrowUn16Sto8Ux8 => r(narrow(a.lo, 16, |l| saturate_unsigned(sext(l, 16), 8))),
        QNarrowUn32Sto16Sx4 => r(narrow(a.lo, 32, |l| saturate_signed(sext(l, 32), 16))),
        QNarrowUn64Sto32Sx2 => r(narrow(a.lo, 64, |l| saturate_signed(sext(l, 64), 32))),
        Widen8Uto16x8 => r(from_lanes(128, 16, |i| lane(a.lo, i, 8))),
        Widen8Sto16x8 => r(from_lanes(128, 16, |i| sext(lane(a.lo, i, 8), 8) as u128)),
        Widen16Uto32x4 => r(from_lanes(128, 32, |i| lane(a.lo, i, 16))),
        Widen16Sto32x4 => r(from_lanes(128, 32, |i| sext(lane(a.lo, i, 16), 16) as u128)),
        Widen32Uto64x2 => r(from_lanes(128, 64, |i| lane(a.lo, i, 32))),
        Widen32Sto64x2 => r(from_lanes(128, 64, |i| sext(lane(a.lo, i, 32), 32) as u128)),
        _ => return Err(unsupported(op)),
    })
}

/// Narrow each `bits`-wide lane of a 128-bit value with `f`, packing the results at half width
/// into a 64-bit value.
fn narrow(v: u128, bits: u32, f: impl Fn(u128) -> u128) -> u128 {
    from_lanes(64, bits / 2, |i| f(lane(v, i, bits)))
}

pub fn eval_binop(op: Op, a: Value, b: Value) -> Result<Value, String> {
    use Op::*;
    let sig = op.signature();
    let rty = sig.result;
    let abits = a.ty.bits();
    let r = |v: u128| Value::new(rty, v);
    let flag = |c: bool| Value::bool(c);

    if let Some((f, bits)) = lane_binop(op) {
        return Ok(per_half(a, b, rty, |x, y, w| {
            zip_lanes(w, bits, x, y, |p, q| f.apply(p, q, bits))
        }));
    }
    if let Some((f, bits)) = lane_shift_n(op) {
        let n = b.lo;
        return Ok(per_half(a, a, rty, |x, _, w| {
            map_lanes(w, bits, x, |p| f.apply(p, n, bits))
        }));
    }

    Ok(match op {
        Add8 | Add16 | Add32 | Add64 => r(a.lo.wrapping_add(b.lo)),
        Sub8 | Sub16 | Sub32 | Sub64 => r(a.lo.wrapping_sub(b.lo)),
        Mul8 | Mul16 | Mul32 | Mul64 => r(a.lo.wrapping_mul(b.lo)),
        Or1 | Or8 | Or16 | Or32 | Or64 | OrV128 => r(a.lo | b.lo),
        And1 | And8 | And16 | And32 | And64 | AndV128 => r(a.lo & b.lo),
        Xor8 | Xor16 | Xor32 | Xor64 | XorV128 => r(a.lo ^ b.lo),
        OrV256 => Value::wide(a.lo | b.lo, a.hi | b.hi),
        AndV256 => Value::wide(a.lo & b.lo, a.hi & b.hi),
        XorV256 => Value::wide(a.lo ^ b.lo, a.hi ^ b.hi),
        Shl8 | Shl16 | Shl32 | Shl64 => r(shift_left(a.lo, b.lo, abits)),
        Shr8 | Shr16 | Shr32 | Shr64 => r(shift_right(a.lo, b.lo, abits)),
        Sar8 | Sar16 | Sar32 | Sar64 => r(shift_right_arith(a.lo, b.lo, abits)),
        Max32U => r(a.lo.max(b.lo)),
        QAdd32S => r(saturate_signed(a.signed() + b.signed(), 32)),
        Sad8Ux4 => r((0..4)
            .map(|i| lane(a.lo, i, 8).abs_diff(lane(b.lo, i, 8)))
            .sum()),

        CmpEQ8 | CmpEQ16 | CmpEQ32 | CmpEQ64 | CasCmpEQ8 | CasCmpEQ16 | CasCmpEQ32
        | CasCmpEQ64 => flag(a.lo == b.lo),
        CmpNE8 | CmpNE16 | CmpNE32 | CmpNE64 | CasCmpNE8 | CasCmpNE16 | CasCmpNE32
        | CasCmpNE64 | ExpCmpNE8 | ExpCmpNE16 | ExpCmpNE32 | ExpCmpNE64 => flag(a.lo != b.lo),
        CmpLT32S | CmpLT64S => flag(a.signed() < b.signed()),
        CmpLT32U | CmpLT64U => flag(a.lo < b.lo),
        CmpLE32S | CmpLE64S => flag(a.signed() <= b.signed()),
        CmpLE32U | CmpLE64U => flag(a.lo <= b.lo),
        CmpORD32S | CmpORD64S | CmpORD32U | CmpORD64U => {
            let ord = if matches!(op, CmpORD32S | CmpORD64S) {
                a.signed().cmp(&b.signed())
            } else {
                a.lo.cmp(&b.lo)
            };
            r(match ord {
                std::cmp::Ordering::Less => 8,
                std::cmp::Ordering::Greater => 4,
                std::cmp::Ordering::Equal => 2,
            })
        }

        MullU8 | MullU16 | MullU32 | MullU64 => r(a.lo * b.lo),
        MullS8 | MullS16 | MullS32 | MullS64 => r((a.signed() * b.signed()) as u128),

        DivU32 | DivU64 | DivS32 | DivS64 | DivModU64to32 | DivModS64to32 | DivModU128to64
        | DivModS128to64 | DivModS64to64
            if b.lo == 0 =>
        {
            return Err(format!("Division by zero in {}", op.name()))
        }
        DivU32 | DivU64 => r(a.lo / b.lo),
        DivS32 | DivS64 => r(a.signed().wrapping_div(b.signed()) as u128),
        DivModU64to32 | DivModU128to64 => {
            let half = b.ty.bits();
            let (q, m) = (a.lo / b.lo, a.lo % b.lo);
            r((m << half) | (q & mask(half)))
        }
        DivModS64to32 | DivModS128to64 | DivModS64to64 => {
            let half = rty.bits() / 2;
            let (x, y) = (a.signed(), b.signed());
            let (q, m) = (x.wrapping_div(y), x.wrapping_rem(y));
            r(((m as u128 & mask(half)) << half) | (q as u128 & mask(half)))
        }

        Hl8to16 | Hl16to32 | Hl32to64 | Hl64to128 | Hl64toV128 => r((a.lo << abits) | b.lo),
        V128HLtoV256 => Value::wide(b.lo, a.lo),

        ShlV128 => r(shift_left(a.lo, b.lo, 128)),
        ShrV128 => r(shift_right(a.lo, b.lo, 128)),
        Perm8x16 => r(from_lanes(128, 8, |i| lane(a.lo, (lane(b.lo, i, 8) & 15) as u32, 8))),
        Perm32x4 => r(from_lanes(128, 32, |i| lane(a.lo, (lane(b.lo, i, 32) & 3) as u32, 32))),
        Perm8x8 => r(from_lanes(64, 8, |i| lane(a.lo, (lane(b.lo, i, 8) & 7) as u32, 8))),
        Perm32x8 => {
            let pick = |i: u32| {
                let k = (lane(if i < 4 { b.lo } else { b.hi }, i % 4, 32) & 7) as u32;
                lane(if k < 4 { a.lo } else { a.hi }, k % 4, 32)
            };
            Value::wide(
                from_lanes(128, 32, &pick),
                from_lanes(128, 32, |i| pick(i + 4)),
            )
        }
        InterleaveLO8x16 | InterleaveHI8x16 | InterleaveLO16x8 | InterleaveHI16x8
        | InterleaveLO32x4 | InterleaveHI32x4 | InterleaveLO64x2 | InterleaveHI64x2
        | InterleaveLO8x8 | InterleaveHI8x8 => {
            let bits = match op {
                InterleaveLO8x16 | InterleaveHI8x16 | InterleaveLO8x8 | InterleaveHI8x8 => 8,
                InterleaveLO16x8 | InterleaveHI16x8 => 16,
                InterleaveLO32x4 | InterleaveHI32x4 => 32,
                _ => 64,
            };
            let width = rty.bits();
            let high = matches!(
                op,
                InterleaveHI8x16
                    | InterleaveHI16x8
                    | InterleaveHI32x4
                    | InterleaveHI64x2
                    | InterleaveHI8x8
            );
            let base = if high { width / bits / 2 } else { 0 };
            r(from_lanes(width, bits, |i| {
                let src = if i % 2 == 0 { b.lo } else { a.lo };
                lane(src, base + i / 2, bits)
            }))
        }
        CatEvenLanes16x8 | CatOddLanes16x8 | CatEvenLanes32x4 | CatOddLanes32x4
        | CatOddLanes16x4 => {
            let bits = if matches!(op, CatEvenLanes32x4 | CatOddLanes32x4) {
                32
            } else {
                16
            };
            let odd = matches!(op, CatOddLanes16x8 | CatOddLanes32x4 | CatOddLanes16x4) as u32;
            let width = rty.bits();
            let half = width / bits / 2;
            r(from_lanes(width, bits, |i| {
                let (src, k) = if i < half { (b.lo, i) } else { (a.lo, i - half) };
                lane(src, 2 * k + odd, bits)
            }))
        }
        GetElem8x16 => r(lane(a.lo, (b.lo % 16) as u32, 8)),
        GetElem16x8 => r(lane(a.lo, (b.lo % 8) as u32, 16)),
        GetElem32x4 => r(lane(a.lo, (b.lo % 4) as u32, 32)),
        GetElem64x2 => r(lane(a.lo, (b.lo % 2) as u32, 64)),
        GetElem8x8 => r(lane(a.lo, (b.lo % 8) as u32, 8)),
        SetV128lo32 => r((a.lo & !mask(32)) | b.lo),
        SetV128lo64 => r((a.lo & !mask(64)) | b.lo),

        NarrowBin16to8x16 | NarrowBin32to16x8 | QNarrowBin16Sto8Ux16 | QNarrowBin16Sto8Sx16
        | QNarrowBin32Sto16Sx8 | QNarrowBin32Sto16Ux8 | NarrowBin16to8x8 | NarrowBin32to16x4
        | QNarrowBin16Sto8Ux8 | QNarrowBin32Sto16Sx4 => {
            let bits = match op {
                NarrowBin16to8x16 | QNarrowBin16Sto8Ux16 | QNarrowBin16Sto8Sx16
                | NarrowBin16to8x8 | QNarrowBin16Sto8Ux8 => 16,
                _ => 32,
            };
            let nb = bits / 2;
            let f = |l: u128| match op {
                QNarrowBin16Sto8Ux16 | QNarrowBin32Sto16Ux8 | QNarrowBin16Sto8Ux8 => {
                    saturate_unsigned(sext(l, bits), nb)
                }
                QNarrowBin16Sto8Sx16 | QNarrowBin32Sto16Sx8 | QNarrowBin32Sto16Sx4 => {
                    saturate_signed(sext(l, bits), nb)
                }
                _ => l & mask(nb),
            };
            let width = rty.bits();
            let half = width / nb / 2;
            r(from_lanes(width, nb, |i| {
                if i < half {
                    f(lane(b.lo, i, bits))
                } else {
                    f(lane(a.lo, i - half, bits))
                }
            }))
        }
        _ => return Err(unsupported(op)),
    })
}

pub fn eval_triop(op: Op, a: Value, b: Value, c: Value) -> Result<Value, String> {
    use Op::*;
    let rty = op.signature().result;
    Ok(match op {
        SliceV128 | Slice64 => {
            let width = rty.bits();
            let n = (c.lo as u32 % (width / 8)) * 8;
            let r = if n == 0 {
                b.lo
            } else {
                (b.lo >> n) | (a.lo << (width - n))
            };
            Value::new(rty, r)
        }
        SetElem8x8 => {
            let i = (b.lo % 8) as u32 * 8;
            Value::new(rty, (a.lo & !(0xff << i)) | ((c.lo & 0xff) << i))
        }
        SetElem32x2 => {
            let i = (b.lo % 2) as u32 * 32;
            Value::new(rty, (a.lo & !(mask(32) << i)) | ((c.lo & mask(32)) << i))
        }
        _ => return Err(unsupported(op)),
    })
}

pub fn eval_qop(op: Op, args: [Value; 4]) -> Result<Value, String> {
    match op {
        Op::I64x4toV256 => {
            let [a, b, c, d] = args;
            Ok(Value::wide((c.lo << 64) | d.lo, (a.lo << 64) | b.lo))
        }
        _ => Err(unsupported(op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(ty: Type, x: u128) -> Value {
        Value::new(ty, x)
    }

    #[test]
    fn scalar_arithmetic_wraps() {
        assert_eq!(
            eval_binop(Op::Add8, v(Type::I8, 0xff), v(Type::I8, 2)).unwrap(),
            v(Type::I8, 1)
        );
        assert_eq!(
            eval_binop(Op::Sar32, v(Type::I32, 0x8000_0000), v(Type::I8, 4)).unwrap(),
            v(Type::I32, 0xf800_0000)
        );
        assert_eq!(eval_unop(Op::Left32, v(Type::I32, 0x10)).unwrap(), v(Type::I32, 0xffff_fff0));
        assert_eq!(eval_unop(Op::S8to32, v(Type::I8, 0x80)).unwrap(), v(Type::I32, 0xffff_ff80));
    }

    #[test]
    fn lane_operations() {
        let a = v(Type::V128, 0x00ff_0000_0000_0001);
        assert_eq!(
            eval_unop(Op::CmpNEZ8x16, a).unwrap(),
            v(Type::V128, 0x00ff_0000_0000_00ff)
        );
        assert_eq!(
            eval_unop(Op::CmpNEZ32x4, a).unwrap(),
            v(Type::V128, 0xffff_ffff_ffff_ffff)
        );
        let sum = eval_binop(Op::Add16x8, v(Type::V128, 0xffff), v(Type::V128, 1)).unwrap();
        assert_eq!(sum, v(Type::V128, 0));
        assert_eq!(
            eval_binop(Op::ShlN32x4, v(Type::V128, 0x8000_0001), v(Type::I8, 1)).unwrap(),
            v(Type::V128, 2)
        );
    }

    #[test]
    fn data_movement() {
        let hl = eval_binop(Op::Hl64toV128, v(Type::I64, 1), v(Type::I64, 2)).unwrap();
        assert_eq!(hl.lo, (1u128 << 64) | 2);
        assert_eq!(eval_unop(Op::V128HIto64, hl).unwrap(), v(Type::I64, 1));
        let wide = eval_binop(Op::V128HLtoV256, v(Type::V128, 7), v(Type::V128, 9)).unwrap();
        assert_eq!((wide.lo, wide.hi), (9, 7));
        assert_eq!(eval_unop(Op::V256to64_2, wide).unwrap(), v(Type::I64, 7));
        let il = eval_binop(Op::InterleaveLO8x16, v(Type::V128, 0x0201), v(Type::V128, 0x0403))
            .unwrap();
        assert_eq!(il.lo, 0x0204_0103);
    }

    #[test]
    fn floating_point_is_unsupported() {
        let e = eval_unop(Op::NegF64, v(Type::F64, 0)).unwrap_err();
        assert!(e.contains("NegF64"));
    }

    #[test]
    fn reporting_helper_names() {
        assert_eq!(reporting_helper_operands("helperc_2_tainted_enc64"), Some(2));
        assert_eq!(reporting_helper_operands("helperc_1_tainted_enc32"), Some(1));
        assert_eq!(reporting_helper_operands("helperc_1_tainted_enc16"), None);
        assert_eq!(reporting_helper_operands("LOADV32le"), None);
    }
}
