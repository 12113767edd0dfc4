//! Parser for the textual block format, as produced by the `Display` implementations in
//! [`crate::ir`].
//!
//! An input file may start with a `layout ...` line describing the guest state, followed by one
//! `IRSB { ... }` block. Blank lines and lines starting with `#` are ignored.

use crate::ir::{
    Atom, Block, Callee, Cas, Const, Dirty, DirtyArg, Effect, Endness, Expr, GuestEffect,
    GuestLayout, JumpKind, LoadG, LoadGOp, MemBusEvent, MemEffect, RegArray, SideEffects, Stmt,
    StoreG, Temp, Type,
};
use crate::ops::Op;

/// A position in the text being parsed.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s.trim() }
    }

    /// Consume `prefix`, ignoring leading whitespace on both sides.
    fn eat(&mut self, prefix: &str) -> bool {
        match self.rest.trim_start().strip_prefix(prefix.trim_start()) {
            Some(r) => {
                self.rest = r;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, prefix: &str) -> Result<(), String> {
        if self.eat(prefix) {
            Ok(())
        } else {
            Err(format!("Expected `{}` at `{}`", prefix, self.rest))
        }
    }

    /// Everything up to `delim`, consuming the delimiter.
    fn until(&mut self, delim: &str) -> Result<&'a str, String> {
        match self.rest.split_once(delim) {
            Some((before, after)) => {
                self.rest = after;
                Ok(before.trim())
            }
            None => Err(format!("Expected `{}` in `{}`", delim, self.rest)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a str, String> {
        if self.rest.len() < n || !self.rest.is_char_boundary(n) {
            return Err(format!("Unexpected end of input at `{}`", self.rest));
        }
        let (a, b) = self.rest.split_at(n);
        self.rest = b;
        Ok(a)
    }

    fn rest(&mut self) -> &'a str {
        let r = self.rest.trim();
        self.rest = "";
        r
    }

    fn finish(&self) -> Result<(), String> {
        if self.rest.trim().is_empty() {
            Ok(())
        } else {
            Err(format!("Unexpected trailing `{}`", self.rest))
        }
    }
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let r = match s.strip_prefix("0x") {
        Some(h) => u64::from_str_radix(h, 16),
        None => s.parse(),
    };
    r.map_err(|e| format!("Bad number `{}`: {}", s, e))
}

fn parse_u128(s: &str) -> Result<u128, String> {
    let s = s.trim();
    let r = match s.strip_prefix("0x") {
        Some(h) => u128::from_str_radix(h, 16),
        None => s.parse(),
    };
    r.map_err(|e| format!("Bad number `{}`: {}", s, e))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let v = parse_u64(s)?;
    u32::try_from(v).map_err(|_| format!("Number `{}` out of range", s))
}

fn parse_i32(s: &str) -> Result<i32, String> {
    s.trim()
        .parse()
        .map_err(|e| format!("Bad number `{}`: {}", s, e))
}

fn parse_type(s: &str) -> Result<Type, String> {
    Type::from_name(s.trim()).ok_or_else(|| format!("Unknown type `{}`", s))
}

fn parse_endness(s: &str) -> Result<Endness, String> {
    match s {
        "le" => Ok(Endness::Little),
        "be" => Ok(Endness::Big),
        _ => Err(format!("Unknown endianness `{}`", s)),
    }
}

fn parse_jumpkind(s: &str) -> Result<JumpKind, String> {
    JumpKind::from_name(s.trim()).ok_or_else(|| format!("Unknown jump kind `{}`", s))
}

pub fn parse_const(s: &str) -> Result<Const, String> {
    let (v, ty) = s
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| format!("Constant `{}` has no type", s))?;
    let n = parse_u128(v)?;
    let narrow = |bits: u32| {
        if bits < 128 && n >> bits != 0 {
            Err(format!("Constant `{}` does not fit its type", s))
        } else {
            Ok(n)
        }
    };
    Ok(match ty {
        "I1" => Const::U1(narrow(1)? != 0),
        "I8" => Const::U8(narrow(8)? as u8),
        "I16" => Const::U16(narrow(16)? as u16),
        "I32" => Const::U32(narrow(32)? as u32),
        "I64" => Const::U64(narrow(64)? as u64),
        "I128" => Const::U128(n),
        "F32" => Const::F32(narrow(32)? as u32),
        "F32i" => Const::F32i(narrow(32)? as u32),
        "F64" => Const::F64(narrow(64)? as u64),
        "F64i" => Const::F64i(narrow(64)? as u64),
        "V128" => Const::V128(narrow(16)? as u16),
        "V256" => Const::V256(narrow(32)? as u32),
        _ => return Err(format!("Unknown constant type `{}`", ty)),
    })
}

fn parse_temp(s: &str) -> Result<Temp, String> {
    let s = s.trim();
    s.strip_prefix('t')
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
        .map(Temp)
        .ok_or_else(|| format!("Bad temporary `{}`", s))
}

pub fn parse_atom(s: &str) -> Result<Atom, String> {
    let s = s.trim();
    if s.starts_with('t') {
        parse_temp(s).map(Atom::Tmp)
    } else {
        parse_const(s).map(Atom::Const)
    }
}

fn parse_atoms(s: &str) -> Result<Vec<Atom>, String> {
    if s.trim().is_empty() {
        return Ok(vec![]);
    }
    s.split(',').map(parse_atom).collect()
}

/// `base:nxTy`, without the surrounding parentheses
fn parse_reg_array(s: &str) -> Result<RegArray, String> {
    let (base, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("Bad register array `{}`", s))?;
    let (n, ty) = rest
        .split_once('x')
        .ok_or_else(|| format!("Bad register array `{}`", s))?;
    Ok(RegArray {
        base: parse_u32(base)?,
        elem_ty: parse_type(ty)?,
        n_elems: parse_u32(n)?,
    })
}

fn parse_callee(c: &mut Cursor) -> Result<Callee, String> {
    let name = c.until("{")?;
    c.expect("rp=")?;
    let regparms = parse_u32(c.until(",")?)?;
    c.expect("mcx=")?;
    let mcx_mask = parse_u32(c.until("}")?)?;
    if name.is_empty() {
        return Err("Helper with no name".to_string());
    }
    Ok(Callee {
        name: name.to_string(),
        regparms,
        mcx_mask,
    })
}

pub fn parse_expr(s: &str) -> Result<Expr, String> {
    let mut c = Cursor::new(s);
    let e = if c.eat("GET:") {
        let ty = parse_type(c.until("(")?)?;
        let offset = parse_u32(c.until(")")?)?;
        Expr::Get { offset, ty }
    } else if c.eat("GETI(") {
        let descr = parse_reg_array(c.until(")")?)?;
        c.expect("[")?;
        let ix = parse_atom(c.until(",")?)?;
        let bias = parse_i32(c.until("]")?)?;
        Expr::GetI { descr, ix, bias }
    } else if c.eat("ITE(") {
        match parse_atoms(c.until(")")?)?[..] {
            [cond, iftrue, iffalse] => Expr::Ite {
                cond,
                iftrue,
                iffalse,
            },
            _ => return Err(format!("ITE needs three operands in `{}`", s)),
        }
    } else if c.eat("CCALL:") {
        let retty = parse_type(c.until(" ")?)?;
        let callee = parse_callee(&mut c)?;
        c.expect("(")?;
        let args = parse_atoms(c.until(")")?)?;
        Expr::CCall {
            callee,
            retty,
            args,
        }
    } else if c.rest.starts_with("LD") && c.rest.get(4..5) == Some(":") {
        c.expect("LD")?;
        let end = parse_endness(c.take(2)?)?;
        c.expect(":")?;
        let ty = parse_type(c.until("(")?)?;
        let addr = parse_atom(c.until(")")?)?;
        Expr::Load { end, ty, addr }
    } else if !c.rest.contains('(') {
        return Ok(parse_atom(c.rest())?.into());
    } else {
        let name = c.until("(")?;
        let op = Op::from_name(name).ok_or_else(|| format!("Unknown operator `{}`", name))?;
        let args = parse_atoms(c.until(")")?)?;
        match args[..] {
            [a] => Expr::Unop(op, a),
            [a, b] => Expr::Binop(op, a, b),
            [a, b, x] => Expr::Triop(op, a, b, x),
            [a, b, x, y] => Expr::Qop(op, a, b, x, y),
            _ => return Err(format!("Operator {} with {} operands", name, args.len())),
        }
    };
    c.finish()?;
    Ok(e)
}

fn parse_effect(tag: &str) -> Result<Effect, String> {
    [Effect::Read, Effect::Write, Effect::Modify]
        .into_iter()
        .find(|e| e.tag() == tag)
        .ok_or_else(|| format!("Unknown effect `{}`", tag))
}

/// `DIRTY guard effects... ::: callee(args)`, after the `DIRTY ` prefix.
fn parse_dirty(s: &str, tmp: Option<Temp>) -> Result<Dirty, String> {
    let (head, tail) = s
        .split_once(" ::: ")
        .ok_or_else(|| format!("Dirty call without callee in `{}`", s))?;
    let mut words = head.split_whitespace();
    let guard = parse_atom(
        words
            .next()
            .ok_or_else(|| "Dirty call without guard".to_string())?,
    )?;
    let mut effects = SideEffects::default();
    for w in words {
        let mut c = Cursor::new(w);
        let fx = parse_effect(c.take(2)?)?;
        if c.eat("FX-mem(") {
            let (addr, size) = c
                .until(")")?
                .split_once(',')
                .ok_or_else(|| format!("Bad memory effect `{}`", w))?;
            effects.mem = Some(MemEffect {
                fx,
                addr: parse_atom(addr)?,
                size: parse_u32(size)?,
            });
        } else {
            c.expect("FX-gst(")?;
            let nums = c
                .until(")")?
                .split(',')
                .map(parse_u32)
                .collect::<Result<Vec<_>, _>>()?;
            let g = match nums[..] {
                [offset, size] => GuestEffect::new(fx, offset, size),
                [offset, size, repeats, repeat_len] => GuestEffect {
                    fx,
                    offset,
                    size,
                    repeats,
                    repeat_len,
                },
                _ => return Err(format!("Bad guest effect `{}`", w)),
            };
            effects.guest.push(g);
        }
        c.finish()?;
    }

    let mut c = Cursor::new(tail);
    let callee = parse_callee(&mut c)?;
    c.expect("(")?;
    let inner = c.until(")")?;
    c.finish()?;
    let args = if inner.is_empty() {
        vec![]
    } else {
        inner
            .split(',')
            .map(|a| match a.trim() {
                "VECRET" => Ok(DirtyArg::VecRet),
                "GSPTR" => Ok(DirtyArg::GuestStatePtr),
                a => parse_atom(a).map(DirtyArg::Atom),
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(Dirty {
        callee,
        guard,
        args,
        tmp,
        effects,
    })
}

fn parse_cas(lhs: &str, c: &mut Cursor) -> Result<Cas, String> {
    let end = parse_endness(c.take(2)?)?;
    c.expect("(")?;
    let addr = parse_atom(c.until(" :: ")?)?;
    if c.eat("(") {
        let expd_hi = parse_atom(c.until(",")?)?;
        let expd_lo = parse_atom(c.until(")")?)?;
        c.expect("->(")?;
        let data_hi = parse_atom(c.until(",")?)?;
        let data_lo = parse_atom(c.until(")")?)?;
        c.expect(")")?;
        let (old_hi, old_lo) = lhs
            .split_once(',')
            .ok_or_else(|| format!("Double-width CAS needs two results, got `{}`", lhs))?;
        Ok(Cas {
            old_hi: Some(parse_temp(old_hi)?),
            old_lo: parse_temp(old_lo)?,
            end,
            addr,
            expd_hi: Some(expd_hi),
            expd_lo,
            data_hi: Some(data_hi),
            data_lo,
        })
    } else {
        let expd_lo = parse_atom(c.until("->")?)?;
        let data_lo = parse_atom(c.until(")")?)?;
        Ok(Cas {
            old_hi: None,
            old_lo: parse_temp(lhs)?,
            end,
            addr,
            expd_hi: None,
            expd_lo,
            data_hi: None,
            data_lo,
        })
    }
}

pub fn parse_stmt(s: &str) -> Result<Stmt, String> {
    let mut c = Cursor::new(s);
    let line = c.rest;
    let stmt = match line {
        _ if c.eat("IR-NoOp") => Stmt::NoOp,
        _ if c.eat("IR-Fence") => Stmt::MBE(MemBusEvent::Fence),
        _ if c.eat("IR-CancelReservation") => Stmt::MBE(MemBusEvent::CancelReservation),
        _ if c.eat("------ IMark(") => {
            let addr = parse_u64(c.until(",")?)?;
            let len = parse_u32(c.until(",")?)?;
            let delta = parse_u32(c.until(")")?)?;
            c.expect("------")?;
            Stmt::IMark {
                addr,
                len,
                delta: u8::try_from(delta).map_err(|_| format!("Bad delta {}", delta))?,
            }
        }
        _ if c.eat("====== AbiHint(") => {
            let base = parse_atom(c.until(",")?)?;
            let len = parse_i32(c.until(",")?)?;
            let nia = parse_atom(c.until(")")?)?;
            c.expect("======")?;
            Stmt::AbiHint { base, len, nia }
        }
        _ if c.eat("PUTI(") => {
            let descr = parse_reg_array(c.until(")")?)?;
            c.expect("[")?;
            let ix = parse_atom(c.until(",")?)?;
            let bias = parse_i32(c.until("]")?)?;
            c.expect("=")?;
            let data = parse_atom(c.rest())?;
            Stmt::PutI {
                descr,
                ix,
                bias,
                data,
            }
        }
        _ if c.eat("PUT(") => {
            let offset = parse_u32(c.until(")")?)?;
            c.expect("=")?;
            let data = parse_atom(c.rest())?;
            Stmt::Put { offset, data }
        }
        _ if c.eat("ST") => {
            let end = parse_endness(c.take(2)?)?;
            c.expect("(")?;
            let addr = parse_atom(c.until(")")?)?;
            c.expect(" = ")?;
            let data = parse_atom(c.rest())?;
            Stmt::Store { end, addr, data }
        }
        _ if c.eat("if (") => {
            let guard = parse_atom(c.until(")")?)?;
            c.rest = c.rest.trim_start();
            if c.eat("{ PUT(") {
                let offs_ip = parse_u32(c.until(")")?)?;
                c.expect(" = ")?;
                let dst = parse_const(c.until(";")?)?;
                c.expect("exit-")?;
                let jk = parse_jumpkind(c.until("}")?)?;
                Stmt::Exit {
                    guard,
                    jk,
                    dst,
                    offs_ip,
                }
            } else {
                c.expect("ST")?;
                let end = parse_endness(c.take(2)?)?;
                c.expect("(")?;
                let addr = parse_atom(c.until(")")?)?;
                c.expect(" = ")?;
                let data = parse_atom(c.rest())?;
                Stmt::StoreG(StoreG {
                    end,
                    addr,
                    data,
                    guard,
                })
            }
        }
        _ if c.eat("DIRTY ") => Stmt::Dirty(parse_dirty(c.rest(), None)?),
        _ => {
            let lhs = c.until(" = ")?;
            if c.eat("DIRTY ") {
                Stmt::Dirty(parse_dirty(c.rest(), Some(parse_temp(lhs)?))?)
            } else if c.eat("CAS") {
                Stmt::Cas(parse_cas(lhs, &mut c)?)
            } else if c.eat("if (") {
                let guard = parse_atom(c.until(")")?)?;
                c.expect(" LD")?;
                let end = parse_endness(c.take(2)?)?;
                c.expect(":")?;
                let cvt_name = c.until("(")?;
                let cvt = LoadGOp::from_name(cvt_name)
                    .ok_or_else(|| format!("Unknown load conversion `{}`", cvt_name))?;
                let addr = parse_atom(c.until(")")?)?;
                c.expect(" else ")?;
                let alt = parse_atom(c.rest())?;
                Stmt::LoadG(LoadG {
                    end,
                    cvt,
                    dst: parse_temp(lhs)?,
                    addr,
                    alt,
                    guard,
                })
            } else if c.eat("( ST") {
                let end = parse_endness(c.take(2)?)?;
                c.expect("-Cond(")?;
                let addr = parse_atom(c.until(")")?)?;
                c.expect(" = ")?;
                let data = parse_atom(c.until(" )")?)?;
                Stmt::LLSC {
                    end,
                    result: parse_temp(lhs)?,
                    addr,
                    storedata: Some(data),
                }
            } else if c.rest.contains("-Linked(") {
                c.expect("LD")?;
                let end = parse_endness(c.take(2)?)?;
                c.expect("-Linked(")?;
                let addr = parse_atom(c.until(")")?)?;
                Stmt::LLSC {
                    end,
                    result: parse_temp(lhs)?,
                    addr,
                    storedata: None,
                }
            } else {
                Stmt::WrTmp {
                    tmp: parse_temp(lhs)?,
                    data: parse_expr(c.rest())?,
                }
            }
        }
    };
    c.finish()?;
    Ok(stmt)
}

/// A layout line: `layout total=N sp=OFF:SIZE ip=OFF:SIZE [defined=OFF:SIZE,...]`.
pub fn parse_layout(line: &str) -> Result<GuestLayout, String> {
    let mut words = line.split_whitespace().peekable();
    if words.peek() == Some(&"layout") {
        words.next();
    }
    let pair = |s: &str| -> Result<(u32, u32), String> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected OFFSET:SIZE, got `{}`", s))?;
        Ok((parse_u32(a)?, parse_u32(b)?))
    };
    let (mut total, mut sp, mut ip) = (None, None, None);
    let mut always_defined = vec![];
    for w in words {
        let (k, v) = w
            .split_once('=')
            .ok_or_else(|| format!("Expected KEY=VALUE, got `{}`", w))?;
        match k {
            "total" => total = Some(parse_u32(v)?),
            "sp" => sp = Some(pair(v)?),
            "ip" => ip = Some(pair(v)?),
            "defined" => {
                for r in v.split(',').filter(|r| !r.is_empty()) {
                    always_defined.push(pair(r)?);
                }
            }
            _ => return Err(format!("Unknown layout key `{}`", k)),
        }
    }
    let total_size = total.ok_or("Layout without total size")?;
    let (offset_sp, sizeof_sp) = sp.ok_or("Layout without stack pointer")?;
    let (offset_ip, sizeof_ip) = ip.ok_or("Layout without instruction pointer")?;
    Ok(GuestLayout {
        total_size,
        offset_sp,
        sizeof_sp,
        offset_ip,
        sizeof_ip,
        always_defined,
    })
}

/// `PUT(offs_ip) = next; exit-Kind`
fn parse_block_exit(line: &str) -> Result<(u32, Atom, JumpKind), String> {
    let mut c = Cursor::new(line);
    c.expect("PUT(")?;
    let offs_ip = parse_u32(c.until(")")?)?;
    c.expect(" = ")?;
    let next = parse_atom(c.until(";")?)?;
    c.expect("exit-")?;
    let jk = parse_jumpkind(c.rest())?;
    Ok((offs_ip, next, jk))
}

/// Parse one `IRSB { ... }` block.
pub fn parse_block(text: &str) -> Result<Block, String> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .collect();
    let at = |n: usize, e: String| format!("Line {}: {}", n, e);

    let (first, rest) = lines.split_first().ok_or("Empty block")?;
    if first.1 != "IRSB {" {
        return Err(at(first.0, format!("Expected `IRSB {{`, got `{}`", first.1)));
    }
    let (last, rest) = rest.split_last().ok_or("Unterminated block")?;
    if last.1 != "}" {
        return Err(at(last.0, format!("Expected `}}`, got `{}`", last.1)));
    }
    let (temps, rest) = rest.split_first().ok_or("Block without temporaries")?;
    let (exit, body) = rest.split_last().ok_or("Block without exit")?;

    let mut c = Cursor::new(temps.1);
    c.expect("temps:").map_err(|e| at(temps.0, e))?;
    let mut decls = vec![];
    for d in c.rest().split_whitespace() {
        let (t, ty) = d
            .split_once(':')
            .ok_or_else(|| at(temps.0, format!("Bad temporary declaration `{}`", d)))?;
        let t = parse_temp(t).map_err(|e| at(temps.0, e))?;
        if t.0 != decls.len() {
            return Err(at(temps.0, format!("Temporary {} declared out of order", t)));
        }
        decls.push(parse_type(ty).map_err(|e| at(temps.0, e))?);
    }

    let (offs_ip, next, jumpkind) = parse_block_exit(exit.1).map_err(|e| at(exit.0, e))?;

    let mut block = Block::new(next, jumpkind, offs_ip);
    for ty in decls {
        block.tyenv.new_temp(ty);
    }
    for (n, l) in body {
        block.stmts.push(parse_stmt(l).map_err(|e| at(*n, e))?);
    }
    Ok(block)
}

/// Parse an input file: an optional layout line followed by a block.
pub fn parse_input(text: &str) -> Result<(Option<GuestLayout>, Block), String> {
    let mut layout = None;
    let mut body = String::new();
    for line in text.lines() {
        if layout.is_none() && body.trim().is_empty() && line.trim().starts_with("layout ") {
            layout = Some(parse_layout(line)?);
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    Ok((layout, parse_block(&body)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_and_constants() {
        assert_eq!(parse_atom("t12").unwrap(), Atom::Tmp(Temp(12)));
        assert_eq!(parse_atom("0x10:I32").unwrap(), Atom::u32(16));
        assert_eq!(parse_atom("1:I1").unwrap(), Atom::u1(true));
        assert_eq!(
            parse_const("0xffff:V128").unwrap(),
            Const::V128(0xffff)
        );
        assert!(parse_const("0x100:I8").is_err());
        assert!(parse_atom("tx").is_err());
    }

    #[test]
    fn expressions_print_back() {
        for text in [
            "GET:I64(16)",
            "GETI(100:8xI64)[t3,-1]",
            "Add32(t1,0x4:I32)",
            "64HLtoV128(t1,t2)",
            "LDbe:I16(t0)",
            "ITE(t0,t1,0x0:I8)",
            "CCALL:I64 calc{rp=2,mcx=0x1}(t1,t2)",
            "t4",
        ] {
            let e = parse_expr(text).unwrap();
            assert_eq!(format!("{}", e), text);
        }
        assert!(parse_expr("NoSuchOp(t1)").is_err());
    }

    #[test]
    fn statements_print_back() {
        for text in [
            "------ IMark(0x400000, 4, 0) ------",
            "PUT(16) = t2",
            "PUTI(100:8xI64)[t3,0] = t4",
            "STle(t1) = t2",
            "if (t0) STbe(t1) = t2",
            "t3 = if (t0) LDle:16Uto32(t1) else t2",
            "t3 = CASle(t1 :: t2->t4)",
            "t3,t5 = CASle(t1 :: (t2,t6)->(t7,t8))",
            "t3 = LDle-Linked(t1)",
            "t3 = ( STle-Cond(t1) = t2 )",
            "t3 = DIRTY 1:I1 RdFX-mem(t1,8) WrFX-gst(16,8) MoFX-gst(0,4,3,8) ::: h{rp=0,mcx=0x0}(GSPTR,t1)",
            "DIRTY t0 ::: cb{rp=1,mcx=0x0}()",
            "IR-Fence",
            "IR-NoOp",
            "IR-CancelReservation",
            "if (t0) { PUT(184) = 0x400010:I64; exit-Boring }",
            "t9 = Not1(t0)",
        ] {
            let s = parse_stmt(text).unwrap();
            assert_eq!(format!("{}", s), text);
        }
    }

    #[test]
    fn layouts() {
        let l = parse_layout("layout total=1024 sp=48:8 ip=184:8 defined=0:16,200:8").unwrap();
        assert_eq!(l.total_size, 1024);
        assert_eq!(l.always_defined, vec![(0, 16), (200, 8)]);
        assert_eq!(parse_layout(&l.to_string()).unwrap(), l);
        assert!(parse_layout("total=1 sp=0:8").is_err());
    }

    #[test]
    fn blocks_with_bus_events_and_noops() {
        let text = "IRSB {\n   temps: t0:I32\n   ------ IMark(0x1000, 4, 0) ------\n   IR-Fence\n   IR-NoOp\n   IR-CancelReservation\n   PUT(184) = 0x1004:I64; exit-Boring\n}";
        let b = parse_block(text).unwrap();
        assert_eq!(
            &b.stmts[1..],
            &[
                Stmt::MBE(MemBusEvent::Fence),
                Stmt::NoOp,
                Stmt::MBE(MemBusEvent::CancelReservation),
            ]
        );
        assert_eq!(parse_block(&b.to_string()).unwrap(), b);
    }

    #[test]
    fn bad_block_reports_line() {
        let text = "IRSB {\n   temps: t0:I32\n   t0 = Bogus(1)\n   PUT(0) = t0; exit-Boring\n}";
        let e = parse_block(text).unwrap_err();
        assert!(e.starts_with("Line 3"), "{}", e);
    }
}
