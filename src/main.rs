use taintflow::*;

use std::path::PathBuf;

use clap::Parser;

use ir::{GuestLayout, Type};

/// Instrument blocks for taint propagation
#[derive(Parser, Debug)]
#[clap(about, version, author)]
enum Args {
    /// Instrument a block given in textual form
    Instrument {
        /// Path to a block file, optionally starting with a `layout ...` line
        block: PathBuf,
        /// Guest state layout, as `total=N sp=OFF:SIZE ip=OFF:SIZE [defined=OFF:SIZE,...]`.
        /// Overrides any layout given in the block file.
        #[clap(long)]
        layout: Option<String>,
        /// Host (and guest) word type
        #[clap(long, default_value = "i64", possible_values = ["i32", "i64"])]
        host_word: String,
        /// Path to output file for the instrumented block
        #[clap(long)]
        output: Option<PathBuf>,
        /// Output the instrumented block as a GraphViz `.dot` file to the given path
        #[clap(long)]
        debug_output_graphviz: Option<PathBuf>,
        /// Run the instrumented block in the reference executor and print the reported
        /// taint events
        #[clap(long)]
        execute: bool,
        /// Before executing, taint guest memory `ADDR:LEN` (repeatable)
        #[clap(long, requires = "execute")]
        taint_mem: Vec<String>,
        /// Before executing, taint the guest register bytes `OFFSET:SIZE` (repeatable)
        #[clap(long, requires = "execute")]
        taint_reg: Vec<String>,
        /// Leave blocks uninstrumented until this many thousand blocks have been seen
        #[clap(long)]
        after_kbb: Option<u64>,
        /// Leave blocks uninstrumented once more than this many thousand blocks have been seen
        #[clap(long)]
        before_kbb: Option<u64>,
        /// Disable terminal logging, even for high severity alerts. Strongly discouraged for normal
        /// use.
        #[clap(long)]
        debug_disable_terminal_logging: bool,
        /// Force blocking for terminal logging. If too many messages are being spewed the logger,
        /// by default, does not block, but instead dumps a dropped-messages alert. This option
        /// forces it to block and dump even if too many are being sent.
        #[clap(long)]
        debug_forced_blocking_terminal_logging: bool,
        /// Path to send log (as JSON) to
        ///
        /// Error or higher severity alerts will still continue being shown at stderr (in addition
        /// to being added to the log)
        #[clap(long = "--log")]
        log_file: Option<PathBuf>,
        /// Debug level (repeat for more: 0-warn, 1-info, 2-debug, 3-trace)
        #[clap(short, long, parse(from_occurrences))]
        debug: usize,
        /// Advanced configuration options to tweak the instrumentation behavior
        #[clap(short = 'Z', long, arg_enum)]
        advanced_config: Vec<config::CommandLineInstrumentConfig>,
    },
}

/// A layout for guests that don't give one: a 1 KiB state with the stack pointer at 48 and the
/// instruction pointer at 184.
fn default_layout(host_word: Type) -> GuestLayout {
    let w = host_word.size_bytes();
    GuestLayout {
        total_size: 1024,
        offset_sp: 48,
        sizeof_sp: w,
        offset_ip: 184,
        sizeof_ip: w,
        always_defined: vec![],
    }
}

fn parse_pair(s: &str) -> (u64, u64) {
    let num = |x: &str| match x.strip_prefix("0x") {
        Some(h) => u64::from_str_radix(h, 16),
        None => x.parse(),
    };
    let (a, b) = s
        .split_once(':')
        .unwrap_or_else(|| panic!("Expected START:LEN, got `{}`", s));
    (
        num(a).unwrap_or_else(|e| panic!("Bad number `{}`: {}", a, e)),
        num(b).unwrap_or_else(|e| panic!("Bad number `{}`: {}", b, e)),
    )
}

fn main() {
    let args = Args::parse();

    match args {
        Args::Instrument {
            block,
            layout,
            host_word,
            output,
            debug_output_graphviz,
            execute,
            taint_mem,
            taint_reg,
            after_kbb,
            before_kbb,
            debug_disable_terminal_logging,
            debug_forced_blocking_terminal_logging,
            log_file,
            debug,
            advanced_config,
        } => {
            let _log_guard = slog_scope::set_global_logger(crate::log::FileAndTermDrain::new(
                debug,
                debug_disable_terminal_logging,
                debug_forced_blocking_terminal_logging,
                log_file,
            ));

            config::InstrumentConfig::initialize(
                config::InstrumentConfig::from(advanced_config)
                    .with_block_window(after_kbb, before_kbb),
            );

            let host_word = match host_word.as_str() {
                "i32" => Type::I32,
                _ => Type::I64,
            };

            let (file_layout, input) = ir_parser::parse_input(
                &std::fs::read_to_string(block).expect("Block file could not be read"),
            )
            .unwrap_or_else(|e| panic!("Block file could not be parsed: {}", e));
            let layout = match layout {
                Some(l) => ir_parser::parse_layout(&l)
                    .unwrap_or_else(|e| panic!("Layout could not be parsed: {}", e)),
                None => file_layout.unwrap_or_else(|| default_layout(host_word)),
            };
            log::debug!("Read block"; "stmts" => input.stmts.len(), "layout" => %layout);

            let mut ctx = instrument::InstrumentContext::from_global();
            let (out, provenance) =
                instrument::instrument_annotated(&mut ctx, &input, &layout, host_word, host_word);

            let printed = if config::CONFIG.dump_shadow_only {
                instrument::shadow_only(&out, &provenance)
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                format!("{}", out)
            };
            if let Some(path) = output {
                use std::io::Write;
                writeln!(std::fs::File::create(path).unwrap(), "{}", printed).unwrap();
            } else {
                println!("{}", printed);
            }

            if let Some(path) = debug_output_graphviz {
                use std::io::Write;
                write!(
                    std::fs::File::create(path).unwrap(),
                    "{}",
                    graphviz::generate_dot(&out, &provenance)
                )
                .unwrap();
            }

            if execute {
                use shadow_memory::ShadowMemory;

                let mut machine = exec::Machine::new(layout.clone(), host_word);
                for m in &taint_mem {
                    let (addr, len) = parse_pair(m);
                    machine.shadow_memory.mark_tainted(addr, len, 0xff);
                }
                for r in &taint_reg {
                    let (offset, size) = parse_pair(r);
                    let ty = Type::integer_of_size(size as u32);
                    machine
                        .set_shadow_reg(offset as u32, exec::Value::new(ty, u128::MAX))
                        .unwrap_or_else(|e| panic!("Could not taint register: {}", e));
                }
                match machine.run(&out) {
                    Ok(ex) => {
                        for e in &machine.events {
                            println!("{}", e);
                        }
                        println!(
                            "exit-{} to {:#x}",
                            ex.exit.jumpkind.name(),
                            ex.exit.target
                        );
                    }
                    Err(e) => log::error!("Execution failed"; "error" => e),
                }
            }

            log::trace!("Done");
        }
    }
}
