//! Query handlers: the port through which a running contract asks the host
//! for data.
//!
//! The host owns one chain of handlers. At the bottom sits the
//! [ChainQueryHandler], which answers chain-native queries. Above it the
//! [WasmQueryHandler] takes care of queries addressed to contracts, feeding
//! smart queries back into the dispatcher. Any number of decorators may wrap
//! the chain; each forwards every call unchanged and observes it exactly once.

use std::{cell::Cell, rc::Rc};

use log::debug;
use serde_json::json;

use crate::{
    budget::CostType, Address, ChainQuery, ContractInfoResponse, ErrorCode, ErrorType, HostError,
    QueryContext, QueryRequest, RawQueryResponse, WasmQuery,
};

pub trait QueryHandler {
    /// Answers `request` on behalf of the contract at `caller`, charging
    /// `ctx.budget` for the work done.
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError>;
}

impl<H: QueryHandler + ?Sized> QueryHandler for Box<H> {
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        (**self).handle_query(ctx, caller, request)
    }
}

/// The terminal handler. Answers chain-native queries from the host's
/// [BlockInfo](crate::BlockInfo) for a flat charge and refuses everything
/// else.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainQueryHandler;

impl QueryHandler for ChainQueryHandler {
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        _caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        let QueryRequest::Chain(query) = request else {
            return Err(ctx.host.err(
                ErrorType::Context,
                ErrorCode::InvalidAction,
                "unsupported query type",
            ));
        };
        ctx.budget
            .charge(CostType::PassThroughQuery, ctx.host.cost_params().query_flat_cost)?;
        let info = ctx.host.block_info()?;
        let response = match query {
            ChainQuery::BlockHeight => json!({ "height": info.height }),
            ChainQuery::BlockTime => json!({ "time": info.time }),
            ChainQuery::ChainId => json!({ "chain_id": info.chain_id }),
        };
        Ok(serde_json::to_vec(&response)?)
    }
}

/// The recursive handler. Smart queries re-enter the dispatcher one level
/// deeper; raw-state and contract-info lookups are answered for a flat
/// charge; chain queries go to `next`.
#[derive(Clone, Debug, Default)]
pub struct WasmQueryHandler<H = ChainQueryHandler> {
    next: H,
}

impl<H: QueryHandler> WasmQueryHandler<H> {
    pub fn new(next: H) -> Self {
        Self { next }
    }
}

impl<H: QueryHandler> QueryHandler for WasmQueryHandler<H> {
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        match request {
            QueryRequest::Wasm(WasmQuery::Smart { contract_addr, msg }) => {
                ctx.host.dispatch_smart_query(ctx, contract_addr, msg.as_slice())
            }
            QueryRequest::Wasm(WasmQuery::Raw { contract_addr, key }) => {
                let data = ctx
                    .host
                    .query_raw_state(&ctx.budget, contract_addr, key.as_slice())?;
                Ok(serde_json::to_vec(&RawQueryResponse {
                    data: data.map(Into::into),
                })?)
            }
            QueryRequest::Wasm(WasmQuery::ContractInfo { contract_addr }) => {
                let info: ContractInfoResponse =
                    ctx.host.query_contract_info(&ctx.budget, contract_addr)?;
                Ok(serde_json::to_vec(&info)?)
            }
            QueryRequest::Chain(_) => self.next.handle_query(ctx, caller, request),
        }
    }
}

/// Calls `observer` once per query before forwarding it.
pub struct ObservingQueryHandler<H, F> {
    next: H,
    observer: F,
}

impl<H, F> ObservingQueryHandler<H, F>
where
    H: QueryHandler,
    F: Fn(&Address, &QueryRequest),
{
    pub fn new(next: H, observer: F) -> Self {
        Self { next, observer }
    }
}

impl<H, F> QueryHandler for ObservingQueryHandler<H, F>
where
    H: QueryHandler,
    F: Fn(&Address, &QueryRequest),
{
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        (self.observer)(caller, request);
        self.next.handle_query(ctx, caller, request)
    }
}

/// A shared counter of the queries seen by one or more
/// [CountingQueryHandler]s.
#[derive(Clone, Debug, Default)]
pub struct QueryCounter(Rc<Cell<u32>>);

impl QueryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn reset(&self) {
        self.0.set(0)
    }

    fn increment(&self) {
        self.0.set(self.0.get().saturating_add(1))
    }
}

pub struct CountingQueryHandler<H> {
    next: H,
    counter: QueryCounter,
}

impl<H: QueryHandler> CountingQueryHandler<H> {
    pub fn new(next: H, counter: QueryCounter) -> Self {
        Self { next, counter }
    }
}

impl<H: QueryHandler> QueryHandler for CountingQueryHandler<H> {
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        self.counter.increment();
        self.next.handle_query(ctx, caller, request)
    }
}

/// Logs every query and its outcome at debug level.
pub struct LoggingQueryHandler<H> {
    next: H,
}

impl<H: QueryHandler> LoggingQueryHandler<H> {
    pub fn new(next: H) -> Self {
        Self { next }
    }
}

impl<H: QueryHandler> QueryHandler for LoggingQueryHandler<H> {
    fn handle_query(
        &self,
        ctx: &QueryContext<'_>,
        caller: &Address,
        request: &QueryRequest,
    ) -> Result<Vec<u8>, HostError> {
        debug!(
            "query from {} at depth {}: {:?}",
            caller,
            ctx.depth.current(),
            request
        );
        let res = self.next.handle_query(ctx, caller, request);
        match &res {
            Ok(data) => debug!("query from {} answered with {} bytes", caller, data.len()),
            Err(e) => debug!("query from {} failed: {:?}", caller, e.error),
        }
        res
    }
}
