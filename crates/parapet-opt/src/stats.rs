use std::fs::OpenOptions;
use std::io::Write;

use parapet_ir::{Function, Opcode};

use crate::cgen::CheckSymbols;
use crate::config::OptConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckCount {
    pub lower: usize,
    pub upper: usize,
}

impl CheckCount {
    pub fn total(&self) -> usize {
        self.lower + self.upper
    }
}

/// Count the surviving check calls of one procedure.
pub fn count_checks(f: &Function, symbols: CheckSymbols) -> CheckCount {
    let mut count = CheckCount::default();
    for block in f.blocks() {
        for inst in f.insts(block) {
            if let Opcode::Call(callee) = f.inst(inst).opcode() {
                if *callee == symbols.lower {
                    count.lower += 1;
                } else if *callee == symbols.upper {
                    count.upper += 1;
                }
            }
        }
    }
    count
}

/// One pipeline checkpoint: a boxed summary on stderr when verbose, and a
/// CSV row appended to `DUMP_DST` when stats dumping is on. The row format
/// is `procedure, checkpoint, lower, upper, total`.
pub fn report_checkpoint(config: &OptConfig, procedure: &str, checkpoint: &str, count: CheckCount) {
    if config.verbose {
        eprintln!("╭─────────────────────────────────────────────────╮");
        eprintln!("│ {procedure}: {checkpoint}");
        eprintln!("│ Lower Bound Check: {}", count.lower);
        eprintln!("│ Upper Bound Check: {}", count.upper);
        eprintln!("│ Total Bound Check: {}", count.total());
        eprintln!("╰─────────────────────────────────────────────────╯");
    }
    if !config.dump_stats {
        return;
    }
    let Some(path) = &config.dump_dst else {
        return;
    };
    // stats are best-effort; a bad path must not fail the compilation
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(
        file,
        "{procedure}, {checkpoint}, {}, {}, {}",
        count.lower,
        count.upper,
        count.total()
    );
}
