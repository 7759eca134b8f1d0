use parapet_ir::{DomTree, Module, find_loops, is_host_library, predecessors, reverse_post_order};

use crate::cgen::{CheckSymbols, collect_checks};
use crate::cleanup::clean_block_duplicates;
use crate::config::{OptConfig, verbose};
use crate::effect::EffectSummary;
use crate::elimination::run_elimination;
use crate::error::OptError;
use crate::loop_prop::run_loop_propagation;
use crate::modification::run_modification;
use crate::stats::{count_checks, report_checkpoint};

/// The driver: per procedure, effects → modification → same-block
/// cleanup → rebuilt C_GEN → elimination → loop propagation, each stage
/// independently toggleable.
///
/// A contract violation inside the predicate algebra aborts that one
/// procedure with a diagnostic and leaves its checks untouched; other
/// procedures are unaffected.
pub struct BoundCheckOptimization {
    config: OptConfig,
}

impl BoundCheckOptimization {
    pub fn new(config: OptConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(OptConfig::from_env())
    }

    pub fn config(&self) -> &OptConfig {
        &self.config
    }

    pub fn run(&self, module: &mut Module) {
        let symbols = CheckSymbols::intern(module);
        for index in 0..module.function_count() {
            let name = module.resolve(module.function(index).name()).to_string();
            if is_host_library(&name) {
                verbose!(self.config, "parapet: skipping host library {name}");
                continue;
            }
            if let Err(error) = self.run_function(module, index, symbols, &name) {
                eprintln!("parapet: {name}: {error}; leaving procedure unoptimized");
            }
        }
    }

    fn run_function(
        &self,
        module: &mut Module,
        index: usize,
        symbols: CheckSymbols,
        name: &str,
    ) -> Result<(), OptError> {
        let f = module.function_mut(index);
        report_checkpoint(
            &self.config,
            name,
            "before-optimization",
            count_checks(f, symbols),
        );

        let universe = collect_checks(f, symbols);
        if universe.sites.is_empty() {
            return Ok(());
        }
        // effects cover both the subscript variables (the monotonicity
        // tables) and the bound variables (fact invalidation on overwrite)
        let mut tracked = universe.subscript_variables.clone();
        for &v in &universe.bound_variables {
            if !tracked.contains(&v) {
                tracked.push(v);
            }
        }
        let effects = EffectSummary::compute(f, &tracked);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let dom = DomTree::new(f);

        if self.config.modification {
            verbose!(self.config, "parapet: {name}: modification");
            run_modification(f, &universe, &effects, &preds, &rpo, &dom, symbols)?;
            report_checkpoint(
                &self.config,
                name,
                "after-modification",
                count_checks(f, symbols),
            );
        }

        if self.config.clean_same_bb {
            let erased = clean_block_duplicates(f, symbols);
            verbose!(
                self.config,
                "parapet: {name}: cleanup erased {erased} duplicate checks"
            );
            report_checkpoint(&self.config, name, "after-cleanup", count_checks(f, symbols));
        }

        // stages above rewrote and moved checks; later stages see a fresh
        // universe over the mutated IR
        let universe = collect_checks(f, symbols);

        if self.config.elimination {
            let erased = run_elimination(f, &universe, &effects, &preds, &rpo)?;
            verbose!(
                self.config,
                "parapet: {name}: elimination erased {erased} checks"
            );
            report_checkpoint(
                &self.config,
                name,
                "after-elimination",
                count_checks(f, symbols),
            );
        }

        if self.config.loop_propagation {
            let loops = find_loops(f, &dom, &preds);
            verbose!(
                self.config,
                "parapet: {name}: loop propagation over {} loops",
                loops.len()
            );
            run_loop_propagation(f, &effects, &dom, &preds, &loops, symbols)?;
            report_checkpoint(
                &self.config,
                name,
                "after-loop-propagation",
                count_checks(f, symbols),
            );
        }
        Ok(())
    }
}
