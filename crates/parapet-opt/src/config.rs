use std::env;
use std::path::PathBuf;

/// Stage toggles and reporting knobs. Defaults enable every optimization
/// stage; the environment constructor reads the variables the original
/// toolchain used.
#[derive(Clone, Debug)]
pub struct OptConfig {
    pub modification: bool,
    pub elimination: bool,
    pub loop_propagation: bool,
    /// Same-block duplicate removal; defaults to mirroring `elimination`.
    pub clean_same_bb: bool,
    pub dump_stats: bool,
    pub verbose: bool,
    pub dump_dst: Option<PathBuf>,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            modification: true,
            elimination: true,
            loop_propagation: true,
            clean_same_bb: true,
            dump_stats: true,
            verbose: false,
            dump_dst: None,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.as_str(), "" | "0" | "false"),
        Err(_) => default,
    }
}

impl OptConfig {
    /// `MODIFICATION`, `ELIMINATION`, `LOOP_PROPAGATION`,
    /// `CLEAN_REDUNDANT_CHECK_IN_SAME_BB`, `DUMP_STATS`, `VERBOSE`,
    /// `DUMP_DST`.
    pub fn from_env() -> Self {
        let elimination = env_flag("ELIMINATION", true);
        Self {
            modification: env_flag("MODIFICATION", true),
            elimination,
            loop_propagation: env_flag("LOOP_PROPAGATION", true),
            clean_same_bb: env_flag("CLEAN_REDUNDANT_CHECK_IN_SAME_BB", elimination),
            dump_stats: env_flag("DUMP_STATS", true),
            verbose: env_flag("VERBOSE", false),
            dump_dst: env::var_os("DUMP_DST").map(PathBuf::from),
        }
    }

    pub fn with_modification(mut self, on: bool) -> Self {
        self.modification = on;
        self
    }

    pub fn with_elimination(mut self, on: bool) -> Self {
        self.elimination = on;
        self
    }

    pub fn with_loop_propagation(mut self, on: bool) -> Self {
        self.loop_propagation = on;
        self
    }

    pub fn with_clean_same_bb(mut self, on: bool) -> Self {
        self.clean_same_bb = on;
        self
    }

    pub fn quiet() -> Self {
        Self {
            dump_stats: false,
            ..Self::default()
        }
    }
}

/// Stderr trace gated by the configuration.
macro_rules! verbose {
    ($cfg:expr, $($arg:tt)*) => {
        if $cfg.verbose {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use verbose;
