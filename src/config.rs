//! A global store of flags that can impact instrumentation.
//!
//! WARNING: Currently only supports a single consistent configuration amongst threads (i.e., cannot
//! have different configurations for different instrumentation runs in the same process). Callers
//! that need per-run settings should construct an [`InstrumentConfig`] directly and hand it to
//! [`crate::instrument::InstrumentContext::new`].

/// The global configuration store. Its fields are expected to be accessed across the program via
/// the global [`CONFIG`](static@CONFIG).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentConfig {
    /// Only report diagnostics for critical instructions (loads, which may make a tainted value
    /// flow out of memory). Shadow propagation is still performed for every statement.
    pub critical_ins_only: bool,
    /// Suppress diagnostics for statements whose every operand is a compile-time constant, since
    /// those are never tainted at runtime.
    pub tainted_ins_only: bool,
    /// Leave blocks uninstrumented until this many thousand blocks have been seen. Zero
    /// instruments from the start.
    pub after_kbb: u64,
    /// Leave blocks uninstrumented once more than this many thousand blocks have been seen.
    pub before_kbb: Option<u64>,
    /// Log every emitted statement at trace level (useful when debugging)
    pub trace_instrumentation: bool,
    /// When printing instrumented blocks, show only shadow statements
    pub dump_shadow_only: bool,
}

impl InstrumentConfig {
    /// Internal method: sets up initialization
    #[allow(static_mut_refs)]
    fn from_initialized() -> Self {
        let init = unsafe {
            INTERNAL_CONFIG_INITIALIZER
                .take()
                .expect("Should be initialized only once")
        };
        init.unwrap_or_default()
    }

    /// Initialize with the given command line configuration. Should only be called once, and should
    /// only be called from `main`.
    #[allow(static_mut_refs)]
    pub fn initialize(config: InstrumentConfig) {
        let prev = unsafe { INTERNAL_CONFIG_INITIALIZER.replace(Some(config)) };
        assert!(prev.is_some(), "Performed double initialization");
        lazy_static::initialize(&CONFIG);
    }

    /// Apply the window bounds given on the command line
    pub fn with_block_window(mut self, after_kbb: Option<u64>, before_kbb: Option<u64>) -> Self {
        if let Some(a) = after_kbb {
            self.after_kbb = a;
        }
        if before_kbb.is_some() {
            self.before_kbb = before_kbb;
        }
        self
    }
}

/// Internal initialization detail.
static mut INTERNAL_CONFIG_INITIALIZER: Option<Option<InstrumentConfig>> = Some(None);

lazy_static::lazy_static! {
    /// The global configuration store
    pub static ref CONFIG: InstrumentConfig = InstrumentConfig::from_initialized();
}

#[derive(clap::ArgEnum, Clone, Debug)]
/// Instrumentation configuration parameters
pub enum CommandLineInstrumentConfig {
    EnableCriticalInsOnly,
    DisableTaintedInsOnly,
    EnableTraceInstrumentation,
    EnableDumpShadowOnly,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        InstrumentConfig {
            critical_ins_only: false,
            tainted_ins_only: true,
            after_kbb: 0,
            before_kbb: None,
            trace_instrumentation: false,
            dump_shadow_only: false,
        }
    }
}

impl From<Vec<CommandLineInstrumentConfig>> for InstrumentConfig {
    fn from(v: Vec<CommandLineInstrumentConfig>) -> Self {
        use CommandLineInstrumentConfig::*;
        let mut r = InstrumentConfig::default();
        for v in v {
            match v {
                EnableCriticalInsOnly => {
                    r.critical_ins_only = true;
                }
                DisableTaintedInsOnly => {
                    r.tainted_ins_only = false;
                }
                EnableTraceInstrumentation => {
                    r.trace_instrumentation = true;
                }
                EnableDumpShadowOnly => {
                    r.dump_shadow_only = true;
                }
            }
        }
        r
    }
}
