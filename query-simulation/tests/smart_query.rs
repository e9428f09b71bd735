use std::rc::Rc;

use pretty_assertions::assert_eq;
use query_env_host::{
    query::{CountingQueryHandler, QueryCounter, QueryHandler},
    storage::{ContractInstance, MemoryContractStore},
    testutils::{recurse_msg, RecurseContract, RecurseResponse},
    BlockInfo,
};
use query_simulation::{QueryConfig, QueryError, SmartQuerier};

fn counting_querier(config_json: &str) -> anyhow::Result<(SmartQuerier, QueryCounter, String)> {
    let config = QueryConfig::from_json(config_json)?;
    let store = Rc::new(MemoryContractStore::new());
    let addr = store.register(ContractInstance::new(7, "recurse", Rc::new(RecurseContract)))?;
    let counter = QueryCounter::new();
    let c = counter.clone();
    let host = config
        .host_builder(store, BlockInfo::default())
        .with_query_handler_decorator(move |next| {
            Box::new(CountingQueryHandler::new(next, c)) as Box<dyn QueryHandler>
        })
        .build();
    Ok((SmartQuerier::new(host, config), counter, addr.to_string()))
}

#[test]
fn configured_cost_model_drives_gas_used() -> anyhow::Result<()> {
    let (q, counter, addr) = counting_querier(r#"{"gas_multiplier": 200}"#)?;
    let resp = q.smart_contract_state(&addr, &recurse_msg(2, 50), None)?;
    // 501_650 fuel per frame is 2_508 gas at 200 fuel per gas.
    assert_eq!(resp.gas_used, 3 * (60_000 + 2_508) + 2 * 30);
    let hashed: RecurseResponse = serde_json::from_slice(&resp.data)?;
    assert_eq!(hashed.hashed.len(), 32);
    assert_eq!(counter.get(), 2);
    Ok(())
}

#[test]
fn every_call_starts_a_new_chain() -> anyhow::Result<()> {
    let (q, counter, addr) = counting_querier(r#"{"max_query_depth": 4}"#)?;
    for _ in 0..3 {
        counter.reset();
        let resp = q.smart_contract_state(&addr, &recurse_msg(3, 1), Some(1_000_000))?;
        assert_eq!(resp.gas_used, 4 * (60_000 + 100) + 3 * 30);
        assert_eq!(counter.get(), 3);
    }
    let err = q
        .smart_contract_state(&addr, &recurse_msg(4, 1), Some(1_000_000))
        .unwrap_err();
    assert!(matches!(err, QueryError::RecursionLimitExceeded { limit: 4 }));
    assert_eq!(counter.get(), 3 + 4);
    Ok(())
}

#[test]
fn amplification_is_cut_off_by_the_caller_budget() -> anyhow::Result<()> {
    let (q, counter, addr) = counting_querier("{}")?;
    let limit = 5 * 65_016 - 1;
    let err = q
        .smart_contract_state(&addr, &recurse_msg(50, 50), Some(limit))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("out of gas: limit {}, used {}", limit, 320_064)
    );
    assert_eq!(counter.get(), 4);
    Ok(())
}
