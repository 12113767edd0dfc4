use crate::config::InstrumentConfig;
use crate::exec::{Execution, Machine, Value};
use crate::instrument::{instrument, instrument_annotated, InstrumentContext};
use crate::ir::{Block, Endness, GuestLayout, Stmt, Type};
use crate::ir_parser::parse_block;
use crate::shadow_env::Provenance;

#[cfg(test)]
use crate::diagnostics::DiagnosticKind;

/// Guest state used throughout the tests: 256 bytes, stack pointer at 48, instruction pointer
/// at 184.
pub fn test_layout() -> GuestLayout {
    GuestLayout {
        total_size: 256,
        offset_sp: 48,
        sizeof_sp: 8,
        offset_ip: 184,
        sizeof_ip: 8,
        always_defined: vec![],
    }
}

/// A block with the given temporary declarations and statements, falling through to `0x1004`.
pub fn block(temps: &str, body: &str) -> Block {
    let text = format!(
        "IRSB {{\n   temps: {}\n{}\n   PUT(184) = 0x1004:I64; exit-Boring\n}}",
        temps, body
    );
    match parse_block(&text) {
        Ok(b) => b,
        Err(e) => panic!("Bad test block: {}\n{}", e, text),
    }
}

/// Instrument `b` for a 64-bit guest and host with the default configuration.
pub fn instrumented(b: &Block) -> (Block, Vec<Provenance>) {
    instrumented_with(InstrumentConfig::default(), b)
}

pub fn instrumented_with(config: InstrumentConfig, b: &Block) -> (Block, Vec<Provenance>) {
    let mut ctx = InstrumentContext::new(config);
    instrument_annotated(&mut ctx, b, &test_layout(), Type::I64, Type::I64)
}

pub fn machine() -> Machine {
    Machine::new(test_layout(), Type::I64)
}

/// Instrument `b`, run it on `m`, and return the execution.
pub fn run_instrumented(m: &mut Machine, b: &Block) -> Execution {
    let (out, _) = instrumented(b);
    match m.run(&out) {
        Ok(ex) => ex,
        Err(e) => panic!("Execution failed: {}\n{}", e, out),
    }
}

/// Whether `xs` occurs, in order, within `ys`.
fn is_subsequence(xs: &[Stmt], ys: &[Stmt]) -> bool {
    let mut ys = ys.iter();
    xs.iter().all(|x| ys.any(|y| y == x))
}

#[cfg(test)]
fn set_reg(m: &mut Machine, offset: u32, ty: Type, value: u128, label: u128) {
    m.put_reg(offset, Value::new(ty, value)).unwrap();
    m.set_shadow_reg(offset, Value::new(ty, label)).unwrap();
}

#[cfg(test)]
fn label_of_reg(m: &Machine, offset: u32, ty: Type) -> u128 {
    m.shadow_reg(offset, ty).unwrap().lo
}

#[test]
fn taint_flows_from_memory_through_registers() {
    use crate::shadow_memory::ShadowMemory;

    let b = block(
        "t0:I64 t1:I32 t2:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = LDle:I32(t0)
   t2 = Add32(t1,0x1:I32)
   PUT(24) = t2",
    );
    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    m.store_mem(Endness::Little, 0x5000, Value::new(Type::I32, 41));
    m.shadow_memory.store_shadow(0x5000, 4, Endness::Little, 0xff);

    let ex = run_instrumented(&mut m, &b);
    assert_eq!(ex.exit.target, 0x1004);
    assert_eq!(m.get_reg(24, Type::I32).unwrap().lo, 42);
    assert_eq!(label_of_reg(&m, 24, Type::I32), 0xff);

    let kinds: Vec<DiagnosticKind> = m.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![DiagnosticKind::Load, DiagnosticKind::Binop, DiagnosticKind::Put]
    );
    let load = &m.events[0];
    assert_eq!(load.values, vec![41, 0x5000]);
    assert_eq!(load.shadows, vec![0xff, 0]);
    assert!(load.text.starts_with("t1=ld i32 t0"), "{}", load.text);
}

#[test]
fn untainted_execution_reports_nothing() {
    let b = block(
        "t0:I64 t1:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = Add64(t0,t0)
   PUT(24) = t1",
    );
    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 3)).unwrap();
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(24, Type::I64).unwrap().lo, 6);
    assert!(m.events.is_empty());
}

#[test]
fn merges_or_at_operand_width() {
    let b = block(
        "t0:I32 t1:I32 t2:I32 t3:I8 t4:I8",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = GET:I32(24)
   t2 = Xor32(t0,t1)
   PUT(32) = t2
   t3 = GET:I8(40)
   t4 = Add8(t3,0x1:I8)
   PUT(41) = t4",
    );
    let mut m = machine();
    set_reg(&mut m, 16, Type::I32, 0xf0, 0x0f);
    set_reg(&mut m, 24, Type::I32, 0x0f, 0xf0);
    set_reg(&mut m, 40, Type::I8, 7, 0x04);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(32, Type::I32).unwrap().lo, 0xff);
    assert_eq!(label_of_reg(&m, 32, Type::I32), 0xff);
    // Carries smear the label towards the most significant bit.
    assert_eq!(m.get_reg(41, Type::I8).unwrap().lo, 8);
    assert_eq!(label_of_reg(&m, 41, Type::I8), 0xfc);
}

#[test]
fn constants_are_untainted() {
    let b = block(
        "",
        "   ------ IMark(0x1000, 4, 0) ------
   PUT(24) = 0x5:I32",
    );
    let mut m = machine();
    set_reg(&mut m, 24, Type::I32, 1, 0xffff_ffff);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(24, Type::I32).unwrap().lo, 5);
    assert_eq!(label_of_reg(&m, 24, Type::I32), 0);
    assert!(m.events.is_empty());
}

#[test]
fn output_keeps_originals_in_order_and_stays_valid() {
    let b = block(
        "t0:I64 t1:I32 t2:I1 t3:I64 t4:V128",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = LDle:I32(t0)
   t2 = CmpEQ32(t1,0x0:I32)
   if (t2) { PUT(184) = 0x2000:I64; exit-Boring }
   ------ IMark(0x1004, 4, 0) ------
   t3 = 32Uto64(t1)
   STle(t0) = t3
   t4 = GET:V128(64)
   STbe(t0) = t4",
    );
    let (out, provenance) = instrumented(&b);
    assert_eq!(out.stmts.len(), provenance.len());
    assert!(out.try_confirm_valid().is_ok(), "{}", out);
    assert!(is_subsequence(&b.stmts, &out.stmts), "{}", out);
    assert!(out.tyenv.len() > b.tyenv.len());
    // The original temporaries keep their types.
    for (t, ty) in b.tyenv.iter() {
        assert_eq!(out.tyenv.type_of(t), ty);
    }
    assert!(provenance.contains(&Provenance::Shadow));
    assert!(provenance.contains(&Provenance::Diagnostic));
}

#[test]
fn stores_and_loads_round_trip_labels() {
    use crate::shadow_memory::ShadowMemory;

    let b = block(
        "t0:I64 t1:I32 t2:I32 t3:V128 t4:V128",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = GET:I32(24)
   STle(t0) = t1
   t2 = LDle:I32(t0)
   PUT(32) = t2
   t3 = GET:V128(64)
   STle(0x6000:I64) = t3
   t4 = LDle:V128(0x6000:I64)
   PUT(96) = t4",
    );
    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    set_reg(&mut m, 24, Type::I32, 0xdead_beef, 0x1200_3400);
    let vlabel = 0x00ff_0000_0000_0000_0000_0000_0000_ff00u128;
    set_reg(&mut m, 64, Type::V128, 0, vlabel);
    run_instrumented(&mut m, &b);

    assert_eq!(
        m.shadow_memory.load_shadow(0x5000, 4, Endness::Little),
        0x1200_3400
    );
    assert_eq!(m.get_reg(32, Type::I32).unwrap().lo, 0xdead_beef);
    assert_eq!(label_of_reg(&m, 32, Type::I32), 0x1200_3400);
    assert_eq!(
        m.shadow_memory.load_shadow(0x6000, 16, Endness::Little),
        vlabel
    );
    assert_eq!(label_of_reg(&m, 96, Type::V128), vlabel);
}

#[cfg(test)]
fn cas_block(expected: u32) -> Block {
    block(
        "t0:I64 t1:I32 t2:I32",
        &format!(
            "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = GET:I32(24)
   t2 = CASle(t0 :: {:#x}:I32->t1)",
            expected
        ),
    )
}

#[test]
fn successful_cas_stores_the_data_label() {
    use crate::shadow_memory::ShadowMemory;

    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    set_reg(&mut m, 24, Type::I32, 9, 0xaa);
    m.store_mem(Endness::Little, 0x5000, Value::new(Type::I32, 5));

    run_instrumented(&mut m, &cas_block(5));
    assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5000).lo, 9);
    assert_eq!(m.shadow_memory.load_shadow(0x5000, 4, Endness::Little), 0xaa);
}

#[test]
fn failed_cas_leaves_memory_label_unchanged() {
    use crate::shadow_memory::ShadowMemory;

    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    set_reg(&mut m, 24, Type::I32, 9, 0xaa);
    m.store_mem(Endness::Little, 0x5000, Value::new(Type::I32, 5));
    m.shadow_memory.store_shadow(0x5000, 4, Endness::Little, 0x11);

    let ex = run_instrumented(&mut m, &cas_block(6));
    assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5000).lo, 5);
    assert_eq!(m.shadow_memory.load_shadow(0x5000, 4, Endness::Little), 0x11);
    // The old value is returned either way, carrying the memory's label.
    assert_eq!(ex.temp(crate::ir::Temp(2)).unwrap().lo, 5);
}

#[cfg(test)]
fn double_cas_block(expd_hi: u32, expd_lo: u32) -> Block {
    block(
        "t0:I64 t1:I32 t2:I32 t3:I32 t4:I32",
        &format!(
            "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = GET:I32(24)
   t2 = GET:I32(32)
   t3,t4 = CASle(t0 :: ({:#x}:I32,{:#x}:I32)->(t1,t2))
   PUT(40) = t3
   PUT(44) = t4",
            expd_hi, expd_lo
        ),
    )
}

/// Run a double-width CAS against `[lo=5, hi=6]` at 0x5000, labelled `[0x11, 0x22]`, swapping in
/// data labelled `[0xaa, 0xbb]`. Returns the memory labels and the old values' labels.
#[cfg(test)]
fn run_double_cas(expd_hi: u32, expd_lo: u32) -> (Machine, [u128; 4]) {
    use crate::shadow_memory::ShadowMemory;

    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    set_reg(&mut m, 24, Type::I32, 8, 0xbb);
    set_reg(&mut m, 32, Type::I32, 9, 0xaa);
    m.store_mem(Endness::Little, 0x5000, Value::new(Type::I32, 5));
    m.store_mem(Endness::Little, 0x5004, Value::new(Type::I32, 6));
    m.shadow_memory.store_shadow(0x5000, 4, Endness::Little, 0x11);
    m.shadow_memory.store_shadow(0x5004, 4, Endness::Little, 0x22);

    run_instrumented(&mut m, &double_cas_block(expd_hi, expd_lo));
    let labels = [
        m.shadow_memory.load_shadow(0x5000, 4, Endness::Little),
        m.shadow_memory.load_shadow(0x5004, 4, Endness::Little),
        label_of_reg(&m, 44, Type::I32),
        label_of_reg(&m, 40, Type::I32),
    ];
    (m, labels)
}

#[test]
fn successful_double_cas_stores_both_data_labels() {
    let (m, labels) = run_double_cas(6, 5);
    assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5000).lo, 9);
    assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5004).lo, 8);
    assert_eq!(labels, [0xaa, 0xbb, 0x11, 0x22]);
}

#[test]
fn failed_double_cas_leaves_both_memory_labels_unchanged() {
    for (hi, lo) in [(6, 4), (7, 5)] {
        let (m, labels) = run_double_cas(hi, lo);
        assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5000).lo, 5);
        assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x5004).lo, 6);
        assert_eq!(labels, [0x11, 0x22, 0x11, 0x22]);
    }
}

#[test]
fn store_conditional_passes_its_label_to_load_linked() {
    let b = block(
        "t0:I64 t1:I32 t2:I1 t3:I32 t4:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = GET:I32(24)
   t2 = ( STle-Cond(t0) = t1 )
   t3 = LDle-Linked(t0)
   PUT(32) = t3
   t4 = 1Uto32(t2)
   PUT(36) = t4",
    );
    let mut m = machine();
    m.put_reg(16, Value::new(Type::I64, 0x5000)).unwrap();
    set_reg(&mut m, 24, Type::I32, 0x77, 0x3c);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(32, Type::I32).unwrap().lo, 0x77);
    assert_eq!(label_of_reg(&m, 32, Type::I32), 0x3c);
    // The success flag is never tainted.
    assert_eq!(m.get_reg(36, Type::I32).unwrap().lo, 1);
    assert_eq!(label_of_reg(&m, 36, Type::I32), 0);
}

#[test]
fn guarded_loads_take_the_label_of_the_value_chosen() {
    use crate::shadow_memory::ShadowMemory;

    let b = block(
        "t0:I32 t1:I1 t2:I64 t3:I32 t4:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = CmpNE32(t0,0x0:I32)
   t2 = GET:I64(24)
   t3 = GET:I32(32)
   t4 = if (t1) LDle:16Uto32(t2) else t3
   PUT(40) = t4",
    );
    let run = |taken: bool| {
        let mut m = machine();
        set_reg(&mut m, 16, Type::I32, taken as u128, 0);
        m.put_reg(24, Value::new(Type::I64, 0x5000)).unwrap();
        set_reg(&mut m, 32, Type::I32, 0xabcd, 0x0f00_0000);
        m.store_mem(Endness::Little, 0x5000, Value::new(Type::I16, 0x1234));
        m.shadow_memory.store_shadow(0x5000, 2, Endness::Little, 0x00c3);
        run_instrumented(&mut m, &b);
        (
            m.get_reg(40, Type::I32).unwrap().lo,
            label_of_reg(&m, 40, Type::I32),
        )
    };
    assert_eq!(run(true), (0x1234, 0xc3));
    assert_eq!(run(false), (0xabcd, 0x0f00_0000));
}

#[test]
fn guarded_stores_label_memory_only_when_taken() {
    use crate::shadow_memory::ShadowMemory;

    let b = block(
        "t0:I32 t1:I1 t2:I64 t3:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = CmpNE32(t0,0x0:I32)
   t2 = GET:I64(24)
   t3 = GET:I32(32)
   if (t1) STle(t2) = t3",
    );
    let run = |taken: bool| {
        let mut m = machine();
        set_reg(&mut m, 16, Type::I32, taken as u128, 0);
        m.put_reg(24, Value::new(Type::I64, 0x5000)).unwrap();
        set_reg(&mut m, 32, Type::I32, 9, 0xaa);
        m.store_mem(Endness::Little, 0x5000, Value::new(Type::I32, 5));
        m.shadow_memory.store_shadow(0x5000, 4, Endness::Little, 0x11);
        run_instrumented(&mut m, &b);
        (
            m.load_mem(Endness::Little, Type::I32, 0x5000).lo,
            m.shadow_memory.load_shadow(0x5000, 4, Endness::Little),
        )
    };
    assert_eq!(run(true), (9, 0xaa));
    assert_eq!(run(false), (5, 0x11));
}

#[test]
fn dirty_results_take_their_arguments_labels() {
    let b = block(
        "t0:I64 t1:I64 t2:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = GET:I64(24)
   t2 = DIRTY 1:I1 ::: calc{rp=2,mcx=0x0}(t0,t1)
   PUT(32) = t2",
    );
    let run = |label: u128| {
        let mut m = machine();
        m.register_helper("calc", |args: &[Value]| {
            Ok(Value::new(Type::I64, args[0].lo + args[1].lo))
        });
        set_reg(&mut m, 16, Type::I64, 2, label);
        set_reg(&mut m, 24, Type::I64, 3, 0);
        run_instrumented(&mut m, &b);
        assert_eq!(m.get_reg(32, Type::I64).unwrap().lo, 5);
        label_of_reg(&m, 32, Type::I64)
    };
    assert_eq!(run(0x1), 0x1);
    assert_eq!(run(0), 0);
}

#[test]
fn guarded_dirty_calls_touch_guest_labels_only_when_taken() {
    let b = block(
        "t0:I32 t1:I1 t2:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(32)
   t1 = CmpNE32(t0,0x0:I32)
   t2 = DIRTY t1 RdFX-gst(16,8) WrFX-gst(40,8) ::: fx{rp=0,mcx=0x0}()
   PUT(64) = t2",
    );
    let run = |taken: bool| {
        let mut m = machine();
        m.register_helper("fx", |_: &[Value]| Ok(Value::new(Type::I64, 7)));
        set_reg(&mut m, 32, Type::I32, taken as u128, 0);
        set_reg(&mut m, 16, Type::I64, 1, 0xff);
        set_reg(&mut m, 40, Type::I64, 2, 0x7700);
        run_instrumented(&mut m, &b);
        (label_of_reg(&m, 64, Type::I64), label_of_reg(&m, 40, Type::I64))
    };
    assert_eq!(run(true), (0xff, 0xff));
    // A call that does not happen reads nothing and writes nothing.
    assert_eq!(run(false), (0, 0x7700));
}

#[test]
fn tainted_conditions_taint_selections() {
    let b = block(
        "t0:I32 t1:I1 t2:I64 t3:I64 t4:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = CmpNE32(t0,0x0:I32)
   t2 = GET:I64(24)
   t3 = GET:I64(32)
   t4 = ITE(t1,t2,t3)
   PUT(64) = t4",
    );
    let mut m = machine();
    set_reg(&mut m, 16, Type::I32, 1, 0x4);
    set_reg(&mut m, 24, Type::I64, 10, 0);
    set_reg(&mut m, 32, Type::I64, 20, 0);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(64, Type::I64).unwrap().lo, 10);
    assert_ne!(label_of_reg(&m, 64, Type::I64) & 0x4, 0);

    // An untainted condition selects the label of the branch taken.
    let mut m = machine();
    set_reg(&mut m, 16, Type::I32, 0, 0);
    set_reg(&mut m, 24, Type::I64, 10, 0xff);
    set_reg(&mut m, 32, Type::I64, 20, 0x0f00);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(64, Type::I64).unwrap().lo, 20);
    assert_eq!(label_of_reg(&m, 64, Type::I64), 0x0f00);
}

#[test]
fn or_merges_exactly_at_every_width() {
    let b = block(
        "t0:I8 t1:I8 t2:I8 t3:I16 t4:I16 t5:I16 t6:I64 t7:I64 t8:I64 t9:V128 t10:V128 t11:V128 \
         t12:V256 t13:V256 t14:V256 t15:I128",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I8(166)
   t1 = GET:I8(167)
   t2 = Or8(t0,t1)
   PUT(168) = t2
   t3 = GET:I16(160)
   t4 = GET:I16(162)
   t5 = Or16(t3,t4)
   PUT(164) = t5
   t6 = GET:I64(136)
   t7 = GET:I64(144)
   t8 = Or64(t6,t7)
   PUT(152) = t8
   t9 = GET:V128(88)
   t10 = GET:V128(104)
   t11 = OrV128(t9,t10)
   PUT(120) = t11
   t12 = GET:V256(192)
   t13 = GET:V256(224)
   t14 = OrV256(t12,t13)
   PUT(56) = t14
   t15 = 64HLto128(t6,t7)
   PUT(0) = t15",
    );
    let mut m = machine();
    set_reg(&mut m, 166, Type::I8, 0, 0x0f);
    set_reg(&mut m, 167, Type::I8, 0, 0x30);
    set_reg(&mut m, 160, Type::I16, 0, 0x0100);
    set_reg(&mut m, 162, Type::I16, 0, 0x8001);
    set_reg(&mut m, 136, Type::I64, 0, 0x0000_0100_0000_0000);
    set_reg(&mut m, 144, Type::I64, 0, 0x8000_0000_0000_00ff);
    set_reg(&mut m, 88, Type::V128, 0, 0xfu128 << 120);
    set_reg(&mut m, 104, Type::V128, 0, 0x1);
    m.set_shadow_reg(192, Value::wide(0x10, 0)).unwrap();
    m.set_shadow_reg(224, Value::wide(0, 0x2u128 << 100)).unwrap();
    run_instrumented(&mut m, &b);

    assert_eq!(label_of_reg(&m, 168, Type::I8), 0x3f);
    assert_eq!(label_of_reg(&m, 164, Type::I16), 0x8101);
    assert_eq!(label_of_reg(&m, 152, Type::I64), 0x8000_0100_0000_00ff);
    assert_eq!(label_of_reg(&m, 120, Type::V128), (0xfu128 << 120) | 0x1);
    assert_eq!(
        m.shadow_reg(56, Type::V256).unwrap(),
        Value::wide(0x10, 0x2 << 100)
    );
    assert_eq!(
        label_of_reg(&m, 0, Type::I128),
        (0x0000_0100_0000_0000u128 << 64) | 0x8000_0000_0000_00ff
    );
}

#[cfg(test)]
fn compare_label(literal: u32) -> u128 {
    let b = block(
        "t0:I32 t1:I1 t2:I32",
        &format!(
            "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = CmpEQ32(t0,{:#x}:I32)
   t2 = 1Uto32(t1)
   PUT(24) = t2",
            literal
        ),
    );
    let mut m = machine();
    set_reg(&mut m, 16, Type::I32, 0, 0x1);
    run_instrumented(&mut m, &b);
    label_of_reg(&m, 24, Type::I32)
}

#[test]
fn bogus_literals_pessimise_equality() {
    assert_eq!(compare_label(0x1234_5678), 0x1);
    assert_eq!(compare_label(0x8080_8080), 0xffff_ffff);
}

#[test]
fn preamble_temporaries_are_defined() {
    let b = block(
        "t0:I64",
        "   t0 = GET:I64(16)
   ------ IMark(0x1000, 4, 0) ------
   PUT(24) = t0",
    );
    let (out, provenance) = instrumented(&b);
    assert_eq!(out.stmts[0], b.stmts[0]);
    assert_eq!(provenance[0], Provenance::Original);

    let mut m = machine();
    set_reg(&mut m, 16, Type::I64, 7, 0xff);
    run_instrumented(&mut m, &b);
    assert_eq!(m.get_reg(24, Type::I64).unwrap().lo, 7);
    assert_eq!(label_of_reg(&m, 24, Type::I64), 0);
}

#[test]
fn blocks_outside_the_window_are_unchanged() {
    let b = block(
        "t0:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   PUT(24) = t0",
    );
    let mut ctx = InstrumentContext::new(InstrumentConfig {
        after_kbb: 1,
        ..InstrumentConfig::default()
    });
    let out = instrument(&mut ctx, &b, &test_layout(), Type::I64, Type::I64);
    assert_eq!(out, b);
}

#[test]
fn tainted_exit_guards_are_reported_before_leaving() {
    let b = block(
        "t0:I32 t1:I1",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I32(16)
   t1 = CmpNE32(t0,0x0:I32)
   if (t1) { PUT(184) = 0x2000:I64; exit-Boring }",
    );
    let mut m = machine();
    set_reg(&mut m, 16, Type::I32, 1, 0x1);
    let ex = run_instrumented(&mut m, &b);
    assert_eq!(ex.exit.target, 0x2000);
    assert!(ex.exit.stmt_index.is_some());
    assert_eq!(
        m.events.last().map(|e| e.kind),
        Some(DiagnosticKind::Exit)
    );
}

#[test]
fn critical_only_reports_loads_alone() {
    let b = block(
        "t0:I64 t1:I64 t2:I64",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = LDle:I64(t0)
   t2 = Add64(t1,t1)
   PUT(24) = t2",
    );
    let (out, provenance) = instrumented_with(
        InstrumentConfig {
            critical_ins_only: true,
            ..InstrumentConfig::default()
        },
        &b,
    );
    let reports: Vec<&Stmt> = out
        .stmts
        .iter()
        .zip(&provenance)
        .filter(|(_, p)| **p == Provenance::Diagnostic)
        .map(|(s, _)| s)
        .collect();
    assert_eq!(reports.len(), 1, "{}", out);
}

#[test]
#[should_panic(expected = "word size mismatch")]
fn word_size_mismatch_is_fatal() {
    let b = block("", "   ------ IMark(0x1000, 4, 0) ------");
    let mut ctx = InstrumentContext::new(InstrumentConfig::default());
    instrument(&mut ctx, &b, &test_layout(), Type::I32, Type::I64);
}

#[test]
fn instrumented_blocks_print_and_parse_back() {
    let b = block(
        "t0:I64 t1:I32 t2:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = GET:I64(16)
   t1 = LDle:I32(t0)
   t2 = Add32(t1,0x1:I32)
   STle(t0) = t2",
    );
    let (out, _) = instrumented(&b);
    let text = format!("{}", out);
    assert_eq!(parse_block(&text).unwrap(), out);
}

#[test]
fn file_reads_taint_what_the_block_loads() {
    use crate::taint_source::{TaintSourcePolicy, TaintSources};

    let mut sources = TaintSources::new(TaintSourcePolicy {
        file_filter: "/input".to_string(),
        taint_start: 2,
        taint_len: 2,
        ..Default::default()
    });
    let mut m = machine();
    sources.on_open(1, 3, "/input/data.bin");
    sources.on_read(1, 3, 0x7000, 8, &mut m.shadow_memory);

    let b = block(
        "t0:I32 t1:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = LDle:I32(0x7000:I64)
   t1 = LDle:I32(0x7004:I64)
   PUT(24) = t0
   PUT(32) = t1",
    );
    run_instrumented(&mut m, &b);
    assert_eq!(label_of_reg(&m, 24, Type::I32), 0xffff_0000);
    assert_eq!(label_of_reg(&m, 32, Type::I32), 0);
    assert_eq!(
        m.events
            .iter()
            .filter(|e| e.kind == DiagnosticKind::Load)
            .count(),
        1
    );
}

#[test]
fn file_label_survives_increment_and_store() {
    use crate::shadow_memory::ShadowMemory;
    use crate::taint_source::{TaintSourcePolicy, TaintSources};

    let mut sources = TaintSources::new(TaintSourcePolicy {
        file_filter: "/input".to_string(),
        taint_start: 0,
        taint_len: 2,
        label: 0x55,
        ..Default::default()
    });
    let mut m = machine();
    m.store_mem(Endness::Little, 0x7000, Value::new(Type::I32, 41));
    sources.on_open(1, 3, "/input/data.bin");
    sources.on_read(1, 3, 0x7000, 8, &mut m.shadow_memory);
    assert_eq!(
        m.shadow_memory.load_shadow(0x7000, 4, Endness::Little),
        0x5555
    );

    let b = block(
        "t0:I32 t1:I32",
        "   ------ IMark(0x1000, 4, 0) ------
   t0 = LDle:I32(0x7000:I64)
   t1 = Add32(t0,0x1:I32)
   STle(0x8000:I64) = t1",
    );
    run_instrumented(&mut m, &b);
    assert_eq!(m.load_mem(Endness::Little, Type::I32, 0x8000).lo, 42);
    assert_eq!(
        m.shadow_memory.load_shadow(0x8000, 4, Endness::Little),
        0x5555
    );
}
