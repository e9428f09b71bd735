use std::panic::{catch_unwind, set_hook, take_hook, UnwindSafe};
use std::{cell::Cell, rc::Rc, sync::Once};

use serde::{Deserialize, Serialize};

use crate::{
    budget::CostParams,
    query::{CountingQueryHandler, QueryCounter, QueryHandler},
    storage::MemoryContractStore,
    vm::{QueryContract, VmEnv, SHA256_FUEL},
    Address, Binary, Host, HostBuilder, HostError, QueryRequest, QueryResponse,
};

/// Catch panics while suppressing the default panic hook that prints to the
/// console.
///
/// For the purposes of test reporting we don't want every panicking (but
/// caught) contract call to print to the console. This requires overriding
/// the panic hook, a global resource. This is an awkward thing to do with
/// tests running in parallel.
///
/// This function lazily performs a one-time wrapping of the existing panic
/// hook. It then uses a thread local variable to track contract call depth.
/// If a panic occurs during a contract call the original hook is not
/// called, otherwise it is called.
pub fn call_with_suppressed_panic_hook<C, R>(closure: C) -> std::thread::Result<R>
where
    C: FnOnce() -> R + UnwindSafe,
{
    thread_local! {
        static TEST_CONTRACT_CALL_COUNT: Cell<u64> = const { Cell::new(0) };
    }

    static WRAP_PANIC_HOOK: Once = Once::new();

    WRAP_PANIC_HOOK.call_once(|| {
        let existing_panic_hook = take_hook();
        set_hook(Box::new(move |info| {
            let calling_test_contract = TEST_CONTRACT_CALL_COUNT.with(|c| c.get() != 0);
            if !calling_test_contract {
                existing_panic_hook(info)
            }
        }))
    });

    TEST_CONTRACT_CALL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    let res = catch_unwind(closure);
    TEST_CONTRACT_CALL_COUNT.with(|c| c.set(c.get().saturating_sub(1)));
    res
}

/// The message understood by [RecurseContract].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurseMsg {
    Recurse { depth: u32, work: u32 },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecurseResponse {
    pub hashed: Binary,
}

/// Encodes `{"recurse":{"depth":depth,"work":work}}`.
pub fn recurse_msg(depth: u32, work: u32) -> Vec<u8> {
    serde_json::to_vec(&RecurseMsg::Recurse { depth, work }).unwrap_or_default()
}

/// A contract that hashes its own address `work` times and then, while
/// `depth` is positive, asks itself the same question with `depth - 1`. The
/// innermost answer is passed back up unchanged.
///
/// With `work == 0` the answer is the contract's address string; otherwise
/// it is a 32-byte digest.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecurseContract;

impl QueryContract for RecurseContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        let RecurseMsg::Recurse { depth, work } = serde_json::from_slice(msg)
            .map_err(|_| env.contract_error(1, "unknown query message"))?;

        let contract = env.contract_address();
        let mut hashed = contract.to_string().into_bytes();
        for _ in 0..work {
            hashed = env.sha256(&hashed)?.to_vec();
        }
        if depth == 0 {
            return Ok(serde_json::to_vec(&RecurseResponse {
                hashed: hashed.into(),
            })?);
        }

        let request = QueryRequest::smart(contract, recurse_msg(depth - 1, work));
        let raw = env.query_raw(&request.to_json_vec()?)?;
        match QueryResponse::from_json_slice(&raw)? {
            QueryResponse::Ok(data) => Ok(data.into_vec()),
            QueryResponse::Err(reason) => {
                Err(env.contract_error(2, &format!("sub-query failed: {}", reason)))
            }
        }
    }
}

/// Gas charged for one [RecurseContract] frame doing `work` rounds,
/// excluding nested frames and sub-query overhead.
pub fn recurse_frame_cost(params: &CostParams, work: u32) -> u64 {
    params.instance_cost + params.to_budget_units(SHA256_FUEL * work as u64)
}

/// A test host whose query handler chain counts every query a contract
/// issues, with [RecurseContract] registered on it.
pub fn counting_recurse_host(
    max_query_depth: u32,
) -> Result<(Host, QueryCounter, Address), HostError> {
    let counter = QueryCounter::new();
    let c = counter.clone();
    let host = HostBuilder::new(Rc::new(MemoryContractStore::new()))
        .with_max_query_depth(max_query_depth)
        .with_query_handler_decorator(move |next| {
            Box::new(CountingQueryHandler::new(next, c)) as Box<dyn QueryHandler>
        })
        .build();
    let addr = host.register_test_contract("recurse", Rc::new(RecurseContract))?;
    Ok((host, counter, addr))
}
