use rustc_hash::FxHashMap;

use parapet_ir::{Block, Function, Inst, Module, Opcode, Symbol, Value};
use parapet_ir::{CHECK_LOWER_BOUND, CHECK_UPPER_BOUND};

use crate::dataflow::Direction;
use crate::effect::EffectSummary;
use crate::error::OptError;
use crate::predicate::{BoundPredicate, PredicateKind, PredicateParts};
use crate::set::BoundPredicateSet;
use crate::subscript::{SubscriptBase, SubscriptExpr};
use crate::transfer;

/// The two reserved callee symbols, resolved once per module.
#[derive(Clone, Copy, Debug)]
pub struct CheckSymbols {
    pub lower: Symbol,
    pub upper: Symbol,
}

impl CheckSymbols {
    pub fn intern(module: &mut Module) -> Self {
        Self {
            lower: module.intern(CHECK_LOWER_BOUND),
            upper: module.intern(CHECK_UPPER_BOUND),
        }
    }

    pub fn kind_of(&self, callee: Symbol) -> Option<PredicateKind> {
        if callee == self.lower {
            Some(PredicateKind::Lower)
        } else if callee == self.upper {
            Some(PredicateKind::Upper)
        } else {
            None
        }
    }
}

/// One recognized check call: its position, its normalized predicate, and
/// the variable its subscript tracks (`None` for constant subscripts).
#[derive(Clone, Copy, Debug)]
pub struct CheckSite {
    pub inst: Inst,
    pub block: Block,
    pub kind: PredicateKind,
    pub predicate: BoundPredicate,
    pub variable: Option<Value>,
}

impl CheckSite {
    pub fn parts(&self) -> &PredicateParts {
        self.predicate.parts()
    }
}

/// Everything one scan of the procedure learns about its checks: the
/// sites in block order, the variables referenced by subscripts, the
/// variables referenced by bounds, and the `file` operand shared by the
/// original checks.
#[derive(Clone, Debug, Default)]
pub struct CheckUniverse {
    pub sites: Vec<CheckSite>,
    pub subscript_variables: Vec<Value>,
    pub bound_variables: Vec<Value>,
    pub file: Option<Value>,
}

impl CheckUniverse {
    pub fn sites_in(&self, block: Block) -> impl Iterator<Item = &CheckSite> {
        self.sites.iter().filter(move |s| s.block == block)
    }

    pub fn sites_of(&self, variable: Value) -> impl Iterator<Item = &CheckSite> {
        self.sites
            .iter()
            .filter(move |s| s.variable == Some(variable))
    }
}

/// Recognize the check calls of one block, in instruction order.
pub fn scan_block_checks(f: &Function, block: Block, symbols: CheckSymbols) -> Vec<CheckSite> {
    let mut sites = Vec::new();
    for inst in f.insts(block) {
        let info = f.inst(inst);
        let Opcode::Call(callee) = info.opcode() else {
            continue;
        };
        let Some(kind) = symbols.kind_of(*callee) else {
            continue;
        };
        let bound = SubscriptExpr::evaluate(f, info.operands()[0]);
        let index = SubscriptExpr::evaluate(f, info.operands()[1]);
        let predicate = match kind {
            PredicateKind::Lower => BoundPredicate::lower(bound, index),
            PredicateKind::Upper => BoundPredicate::upper(bound, index),
        }
        .normalized();
        let variable = match index.base {
            Some(SubscriptBase::Slot(p)) if !index.is_constant() => Some(p),
            _ => None,
        };
        sites.push(CheckSite {
            inst,
            block,
            kind,
            predicate,
            variable,
        });
    }
    sites
}

/// Scan the procedure, recognizing the reserved check calls and recording
/// the predicate each produces.
pub fn collect_checks(f: &Function, symbols: CheckSymbols) -> CheckUniverse {
    let mut universe = CheckUniverse::default();
    for block in f.blocks() {
        universe.sites.extend(scan_block_checks(f, block, symbols));
    }
    for site in &universe.sites {
        if universe.file.is_none() {
            universe.file = f.inst(site.inst).operands().get(2).copied();
        }
        if let Some(v) = site.variable {
            if !universe.subscript_variables.contains(&v) {
                universe.subscript_variables.push(v);
            }
        }
        let bound = site.parts().bound;
        if let Some(SubscriptBase::Slot(p)) = bound.base {
            if !bound.is_constant() && !universe.bound_variables.contains(&p) {
                universe.bound_variables.push(p);
            }
        }
    }
    universe
}

/// `C_GEN` for one subscript variable: per block, the set of predicates
/// the block's own checks assert *at the relevant block boundary*.
///
/// A fact is exported raw only when no store to the variable separates the
/// check from that boundary (after the check for the forward pass, before
/// it for the backward pass); otherwise it must survive the block-effect
/// table like any transferred fact. Without this a block that checks and
/// then overwrites its subscript would export a stale fact.
pub fn build_cgen(
    f: &Function,
    universe: &CheckUniverse,
    variable: Value,
    direction: Direction,
    effects: &EffectSummary,
) -> Result<FxHashMap<Block, BoundPredicateSet>, OptError> {
    let site_by_inst: FxHashMap<Inst, &CheckSite> = universe
        .sites_of(variable)
        .map(|site| (site.inst, site))
        .collect();
    let mut cgen: FxHashMap<Block, BoundPredicateSet> = FxHashMap::default();
    for block in f.blocks() {
        let insts: Vec<Inst> = f.insts(block).collect();
        let store_positions: Vec<usize> = insts
            .iter()
            .enumerate()
            .filter(|&(_, &inst)| {
                let info = f.inst(inst);
                *info.opcode() == Opcode::Store && info.operands()[1] == variable
            })
            .map(|(position, _)| position)
            .collect();

        let mut set = BoundPredicateSet::new();
        for (position, inst) in insts.iter().enumerate() {
            let Some(site) = site_by_inst.get(inst) else {
                continue;
            };
            let exposed = match direction {
                Direction::Forward => store_positions.iter().all(|&s| s < position),
                Direction::Backward => store_positions.iter().all(|&s| s > position),
            };
            let keep = exposed
                || transfer::keeps(
                    direction,
                    site.kind,
                    site.parts().index.a,
                    &effects.effect(variable, block),
                );
            if keep && transfer::bound_intact(&site.parts().bound, effects, block) {
                set.add_predicate(&site.predicate)?;
            }
        }
        cgen.insert(block, set);
    }
    Ok(cgen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_ir::FunctionBuilder;

    #[test]
    fn checks_are_recognized_and_grouped() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let i_slot = b.alloca(1);
        let n_slot = b.alloca(1);
        let i = b.load(i_slot);
        let n = b.load(n_slot);
        let one = b.constant(1);
        let limit = b.sub(n, one);
        let zero = b.constant(0);
        let file_ref = b.func().global_ref(file);
        b.call_void(symbols.lower, [zero, i, file_ref, zero]);
        b.call_void(symbols.upper, [limit, i, file_ref, zero]);
        b.ret(None);

        let universe = collect_checks(f, symbols);
        assert_eq!(universe.sites.len(), 2);
        assert_eq!(universe.subscript_variables, vec![i_slot]);
        assert_eq!(universe.bound_variables, vec![n_slot]);
        assert_eq!(universe.file, Some(file_ref));

        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let cgen = build_cgen(f, &universe, i_slot, Direction::Forward, &effects).unwrap();
        let set = &cgen[&entry];
        assert_eq!(set.lowers().len(), 1);
        assert_eq!(set.uppers().len(), 1);
        assert_eq!(set.uppers()[0].bound, SubscriptExpr::slot(n_slot) - 1);
    }

    #[test]
    fn store_after_check_filters_forward_export() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let i_slot = b.alloca(1);
        let zero = b.constant(0);
        let nine = b.constant(9);
        let file_ref = b.func().global_ref(file);
        let i = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i, file_ref, zero]);
        b.call_void(symbols.upper, [nine, i, file_ref, zero]);
        let one = b.constant(1);
        let next = b.add(i, one);
        b.store(next, i_slot);
        b.ret(None);

        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);

        // forward: the increment after the checks preserves the lower
        // bound but invalidates the upper one
        let fwd = build_cgen(f, &universe, i_slot, Direction::Forward, &effects).unwrap();
        assert_eq!(fwd[&entry].lowers().len(), 1);
        assert_eq!(fwd[&entry].uppers().len(), 0);

        // backward: no store precedes the checks, so both export raw
        let bwd = build_cgen(f, &universe, i_slot, Direction::Backward, &effects).unwrap();
        assert_eq!(bwd[&entry].len(), 2);
    }

    #[test]
    fn constant_subscripts_have_no_variable() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let three = b.constant(3);
        let nine = b.constant(9);
        let zero = b.constant(0);
        let file_ref = b.func().global_ref(file);
        b.call_void(symbols.lower, [zero, three, file_ref, zero]);
        b.call_void(symbols.upper, [nine, three, file_ref, zero]);
        b.ret(None);

        let universe = collect_checks(f, symbols);
        assert_eq!(universe.sites.len(), 2);
        assert!(universe.subscript_variables.is_empty());
        assert!(universe.sites.iter().all(|s| s.variable.is_none()));
        assert!(universe.sites.iter().all(|s| s.predicate.always_true()));
    }
}
