use log::debug;

use crate::{
    budget::{CostType, DepthGuard},
    vm::Vm,
    Address, Host, HostError, QueryContext,
};

impl Host {
    /// Runs one smart query against `contract` on behalf of the frame that
    /// owns `ctx.budget`.
    ///
    /// The instantiation cost is committed to the caller's budget before the
    /// contract is even loaded. The contract then runs against a child of that
    /// budget holding whatever is left, so it and everything it queries can
    /// never spend more than the caller had. When a nested query (depth > 1)
    /// succeeds, the calling frame also pays the sub-query cost.
    ///
    /// Unrecoverable errors (out of budget, depth ceiling, host-internal
    /// failures) are returned unchanged; every other failure of the contract
    /// is reported as a recoverable "query wasm contract failed" error.
    pub(crate) fn dispatch_smart_query(
        &self,
        ctx: &QueryContext<'_>,
        contract: &Address,
        msg: &[u8],
    ) -> Result<Vec<u8>, HostError> {
        let _span = tracy_span!("dispatch_smart_query");
        let _guard = DepthGuard::new(ctx.depth)
            .map_err(|e| self.augment_err(Some(contract), e, "query depth limit exceeded"))?;
        let depth = ctx.depth.current();
        let params = self.cost_params();
        debug!(
            "smart query to {} at depth {}, {} gas remaining",
            contract,
            depth,
            ctx.budget.get_remaining()?
        );

        let child_limit = ctx
            .budget
            .get_remaining()?
            .saturating_sub(params.instance_cost);
        ctx.budget
            .charge(CostType::Instantiation, params.instance_cost)
            .map_err(|e| self.augment_err(Some(contract), e, "out of gas loading contract"))?;

        let instance = self.load_contract(contract)?;
        let vm = Vm::new(self, *contract, instance, ctx.budget.child(child_limit), ctx.depth)?;
        let res = match vm.invoke_query(msg) {
            Err(e) if !e.is_recoverable() => Err(e),
            // Work done before a recoverable failure is still paid for.
            res => {
                vm.charge_unsettled_fuel()?;
                res
            }
        };

        match res {
            Ok(out) => {
                if depth > 1 {
                    ctx.budget.charge(CostType::SubQuery, params.sub_query_cost)?;
                }
                debug!(
                    "smart query to {} at depth {} returned {} bytes, {} fuel; caller used {} gas",
                    contract,
                    depth,
                    out.data.len(),
                    out.fuel_used,
                    ctx.budget.get_consumed()?
                );
                Ok(out.data)
            }
            Err(e) if e.is_recoverable() => {
                debug!("smart query to {} at depth {} failed: {:?}", contract, depth, e.error);
                Err(self.error_in_contract(
                    Some(contract),
                    e.error,
                    &format!("query wasm contract failed: {}", e.reason()),
                ))
            }
            Err(e) => {
                debug!("smart query to {} at depth {} aborted: {:?}", contract, depth, e.error);
                Err(self.augment_err(Some(contract), e, "smart query aborted"))
            }
        }
    }
}
