mod cost;
mod depth_limiter;
mod limits;

pub use cost::CostParams;
pub use depth_limiter::{DepthGuard, DepthLimiter, QueryDepth};
pub use limits::{
    DEFAULT_GAS_MULTIPLIER, DEFAULT_INSTANCE_COST, DEFAULT_QUERY_DEPTH_LIMIT,
    DEFAULT_QUERY_FLAT_COST, DEFAULT_SMART_QUERY_GAS_LIMIT, DEFAULT_SUB_QUERY_COST,
};

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use log::trace;

use crate::{host::error::TryBorrowOrErr, ErrorCode, ErrorType, HostError};

/// The reasons a [Budget] is charged. Used as indexes into the reporting
/// tracker, so the discriminants must stay dense.
#[repr(usize)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CostType {
    /// Fixed cost of loading a contract into the sandbox, paid before any of
    /// its code runs.
    Instantiation = 0,
    /// VM fuel burned by contract code, converted to gas.
    VmExecution = 1,
    /// Fixed cost a calling frame pays for each nested smart query that
    /// returned to it.
    SubQuery = 2,
    /// Flat cost of a query that runs no contract code (chain metadata, raw
    /// state, contract info).
    PassThroughQuery = 3,
}

impl CostType {
    pub const fn variants() -> [CostType; 4] {
        [
            CostType::Instantiation,
            CostType::VmExecution,
            CostType::SubQuery,
            CostType::PassThroughQuery,
        ]
    }

    pub const fn name(&self) -> &'static str {
        match self {
            CostType::Instantiation => "Instantiation",
            CostType::VmExecution => "VmExecution",
            CostType::SubQuery => "SubQuery",
            CostType::PassThroughQuery => "PassThroughQuery",
        }
    }
}

#[derive(Clone, Default)]
struct MeterTracker {
    // Tracks the `(iterations, total_amount)` charged for each `CostType`
    cost_tracker: [(u64, u64); CostType::variants().len()],
    // Total number of times the meter was charged a nonzero amount
    count: u32,
}

pub(crate) struct BudgetImpl {
    limit: u64,
    consumed: u64,
    /// For reporting only; not used for budget-limiting.
    tracker: MeterTracker,
    /// Charges made against this meter are also made against every ancestor.
    parent: Option<Budget>,
}

impl BudgetImpl {
    fn new(limit: u64, parent: Option<Budget>) -> Self {
        Self {
            limit,
            consumed: 0,
            tracker: Default::default(),
            parent,
        }
    }

    fn get_remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    fn check_charge(&self, amount: u64) -> Result<(), HostError> {
        match self.consumed.checked_add(amount) {
            Some(total) if total <= self.limit => Ok(()),
            _ => Err((ErrorType::Budget, ErrorCode::ExceededLimit).into()),
        }
    }

    fn apply_charge(&mut self, ty: CostType, amount: u64) {
        // `check_charge` has already been called on this meter, so this
        // cannot exceed the limit.
        self.consumed = self.consumed.saturating_add(amount);
        self.tracker.count = self.tracker.count.saturating_add(1);
        let (iters, total) = &mut self.tracker.cost_tracker[ty as usize];
        *iters = iters.saturating_add(1);
        *total = total.saturating_add(amount);
    }
}

impl Debug for BudgetImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "Gas limit: {}; used: {}", self.limit, self.consumed)?;
        writeln!(f, "Has parent: {}", self.parent.is_some())?;
        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "{:<25}{:<15}{}", "CostType", "iterations", "gas")?;
        for ct in CostType::variants() {
            let (iters, total) = self.tracker.cost_tracker[ct as usize];
            writeln!(f, "{:<25}{:<15}{}", ct.name(), iters, total)?;
        }
        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "Total # times meter was charged: {}", self.tracker.count)?;
        writeln!(f, "{:=<60}", "")?;
        Ok(())
    }
}

impl Display for BudgetImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:=<40}", "")?;
        writeln!(f, "Gas limit: {}; used: {}", self.limit, self.consumed)?;
        writeln!(f, "{:=<40}", "")?;
        writeln!(f, "{:<25}{}", "CostType", "gas")?;
        for ct in CostType::variants() {
            writeln!(
                f,
                "{:<25}{}",
                ct.name(),
                self.tracker.cost_tracker[ct as usize].1
            )?;
        }
        writeln!(f, "{:=<40}", "")?;
        Ok(())
    }
}

/// A gas meter with a fixed limit. `Budget` is a cheap, clonable handle;
/// clones observe and charge the same meter.
///
/// A budget may be the child of another budget (see [Budget::child]). Every
/// charge against a child is checked against, and applied to, the child and
/// all of its ancestors, so cost only ever flows upward. A charge that would
/// push any meter in the chain over its limit fails with
/// `(ErrorType::Budget, ErrorCode::ExceededLimit)` and leaves every meter
/// untouched.
#[derive(Clone)]
pub struct Budget(pub(crate) Rc<RefCell<BudgetImpl>>);

impl Default for Budget {
    fn default() -> Self {
        #[cfg(all(not(target_family = "wasm"), feature = "tracy"))]
        let _client = tracy_client::Client::start();
        Self::new(DEFAULT_SMART_QUERY_GAS_LIMIT)
    }
}

impl Debug for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?}", self.0.try_borrow().map_err(|_| std::fmt::Error)?)
    }
}

impl Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.0.try_borrow().map_err(|_| std::fmt::Error)?)
    }
}

impl Budget {
    /// Creates a top-level meter with the given gas limit.
    pub fn new(limit: u64) -> Self {
        Self(Rc::new(RefCell::new(BudgetImpl::new(limit, None))))
    }

    /// Creates a meter scoped to a single nested frame. Its own `limit` is
    /// enforced in addition to whatever remains on `self` and its ancestors.
    pub fn child(&self, limit: u64) -> Self {
        Self(Rc::new(RefCell::new(BudgetImpl::new(
            limit,
            Some(self.clone()),
        ))))
    }

    /// Charges `amount` gas under the given [CostType]. Charging zero always
    /// succeeds and changes nothing.
    pub fn charge(&self, ty: CostType, amount: u64) -> Result<(), HostError> {
        if amount == 0 {
            return Ok(());
        }
        let _span = tracy_span!("charge");

        // Check the whole chain before touching any meter.
        let mut next = Some(self.clone());
        while let Some(b) = next {
            let imp = b.0.try_borrow_or_err()?;
            imp.check_charge(amount)?;
            next = imp.parent.clone();
        }

        let mut next = Some(self.clone());
        while let Some(b) = next {
            let mut imp = b.0.try_borrow_mut_or_err()?;
            imp.apply_charge(ty, amount);
            next = imp.parent.clone();
        }

        trace!("charged {} gas for {}", amount, ty.name());
        Ok(())
    }

    pub fn get_limit(&self) -> Result<u64, HostError> {
        Ok(self.0.try_borrow_or_err()?.limit)
    }

    pub fn get_consumed(&self) -> Result<u64, HostError> {
        Ok(self.0.try_borrow_or_err()?.consumed)
    }

    /// `limit - consumed` of this meter alone. For a child created with the
    /// remaining gas of its parent this agrees with the parent, since every
    /// charge flows through both.
    pub fn get_remaining(&self) -> Result<u64, HostError> {
        Ok(self.0.try_borrow_or_err()?.get_remaining())
    }

    /// Returns `(iterations, total_gas)` charged under `ty`, including the
    /// charges propagated up from descendants.
    pub fn get_tracker(&self, ty: CostType) -> Result<(u64, u64), HostError> {
        self.0
            .try_borrow_or_err()?
            .tracker
            .cost_tracker
            .get(ty as usize)
            .copied()
            .ok_or_else(|| (ErrorType::Budget, ErrorCode::InternalError).into())
    }

    pub fn has_parent(&self) -> Result<bool, HostError> {
        Ok(self.0.try_borrow_or_err()?.parent.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn charge_within_limit() -> Result<(), HostError> {
        let budget = Budget::new(100);
        budget.charge(CostType::Instantiation, 60)?;
        budget.charge(CostType::VmExecution, 40)?;
        assert_eq!(budget.get_consumed()?, 100);
        assert_eq!(budget.get_remaining()?, 0);
        // zero charges never fail, even on an exhausted meter
        budget.charge(CostType::SubQuery, 0)?;
        assert_eq!(budget.get_tracker(CostType::SubQuery)?, (0, 0));
        Ok(())
    }

    #[test]
    fn failed_charge_does_not_mutate() -> Result<(), HostError> {
        let budget = Budget::new(100);
        budget.charge(CostType::Instantiation, 90)?;
        let res = budget.charge(CostType::VmExecution, 11);
        assert!(HostError::result_matches_err(
            res,
            (ErrorType::Budget, ErrorCode::ExceededLimit)
        ));
        assert_eq!(budget.get_consumed()?, 90);
        assert_eq!(budget.get_tracker(CostType::VmExecution)?, (0, 0));
        Ok(())
    }

    #[test]
    fn overflowing_charge_is_out_of_budget() -> Result<(), HostError> {
        let budget = Budget::new(u64::MAX);
        budget.charge(CostType::VmExecution, u64::MAX - 1)?;
        let res = budget.charge(CostType::VmExecution, 2);
        assert!(HostError::result_matches_err(
            res,
            (ErrorType::Budget, ErrorCode::ExceededLimit)
        ));
        Ok(())
    }

    #[test]
    fn child_charges_propagate_to_ancestors() -> Result<(), HostError> {
        let root = Budget::new(1_000);
        root.charge(CostType::Instantiation, 100)?;
        let child = root.child(root.get_remaining()?);
        let grandchild = child.child(500);
        grandchild.charge(CostType::VmExecution, 200)?;
        assert_eq!(grandchild.get_consumed()?, 200);
        assert_eq!(child.get_consumed()?, 200);
        assert_eq!(root.get_consumed()?, 300);
        assert_eq!(root.get_tracker(CostType::VmExecution)?, (1, 200));
        assert!(child.has_parent()?);
        assert!(!root.has_parent()?);
        Ok(())
    }

    #[test]
    fn child_limit_and_ancestor_limit_both_apply() -> Result<(), HostError> {
        let root = Budget::new(1_000);
        let child = root.child(100);
        // over the child's own limit
        assert!(child.charge(CostType::VmExecution, 101).is_err());
        root.charge(CostType::Instantiation, 950)?;
        // within the child's limit, but over what the root has left
        let res = child.charge(CostType::VmExecution, 60);
        assert!(HostError::result_matches_err(
            res,
            (ErrorType::Budget, ErrorCode::ExceededLimit)
        ));
        assert_eq!(child.get_consumed()?, 0);
        assert_eq!(root.get_consumed()?, 950);
        Ok(())
    }

    #[test]
    fn display_reports_per_cost_type() -> Result<(), HostError> {
        let budget = Budget::new(100_000);
        budget.charge(CostType::Instantiation, 60_000)?;
        budget.charge(CostType::VmExecution, 5_016)?;
        budget.charge(CostType::SubQuery, 30)?;
        let actual = format!("{}", budget);
        expect![[r#"
            ========================================
            Gas limit: 100000; used: 65046
            ========================================
            CostType                 gas
            Instantiation            60000
            VmExecution              5016
            SubQuery                 30
            PassThroughQuery         0
            ========================================

        "#]]
        .assert_eq(&actual);
        Ok(())
    }
}
