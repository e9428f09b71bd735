use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;

use crate::{
    query::{
        CountingQueryHandler, LoggingQueryHandler, ObservingQueryHandler, QueryCounter,
        QueryHandler,
    },
    storage::MemoryContractStore,
    test::util::run,
    testutils::recurse_msg,
    Host, HostBuilder, HostError, QueryRequest, WasmQuery,
};

fn builder() -> HostBuilder {
    HostBuilder::new(Rc::new(MemoryContractStore::new()))
}

#[test]
fn stacked_decorators_do_not_change_results() -> Result<(), HostError> {
    let (plain, addr) = Host::test_host().with_recurse_contract()?;
    let (plain_res, plain_consumed) = run(&plain, 10_000_000, &addr, &recurse_msg(4, 20));

    let first = QueryCounter::new();
    let second = QueryCounter::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (f, s, log) = (first.clone(), second.clone(), seen.clone());
    let host = builder()
        .with_query_handler_decorator(move |next| {
            Box::new(CountingQueryHandler::new(next, f)) as Box<dyn QueryHandler>
        })
        .with_query_handler_decorator(|next| {
            Box::new(LoggingQueryHandler::new(next)) as Box<dyn QueryHandler>
        })
        .with_query_handler_decorator(move |next| {
            Box::new(ObservingQueryHandler::new(next, move |_caller, req: &QueryRequest| {
                if let QueryRequest::Wasm(WasmQuery::Smart { msg, .. }) = req {
                    log.borrow_mut().push(msg.clone());
                }
            })) as Box<dyn QueryHandler>
        })
        .with_query_handler_decorator(move |next| {
            Box::new(CountingQueryHandler::new(next, s)) as Box<dyn QueryHandler>
        })
        .build();
    let (host, addr2) = host.with_recurse_contract()?;
    // same label and registration order, so the same address
    assert_eq!(addr, addr2);

    let (res, consumed) = run(&host, 10_000_000, &addr, &recurse_msg(4, 20));
    assert_eq!(res?, plain_res?);
    assert_eq!(consumed, plain_consumed);
    assert_eq!(first.get(), 4);
    assert_eq!(second.get(), 4);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0].as_slice(), recurse_msg(3, 20).as_slice());
    assert_eq!(seen[3].as_slice(), recurse_msg(0, 20).as_slice());
    Ok(())
}

#[test]
fn last_added_decorator_sees_queries_first() -> Result<(), HostError> {
    let order = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let host = builder()
        .with_query_handler_decorator(move |next| {
            Box::new(ObservingQueryHandler::new(next, move |_: &_, _: &_| {
                a.borrow_mut().push("inner")
            })) as Box<dyn QueryHandler>
        })
        .with_query_handler_decorator(move |next| {
            Box::new(ObservingQueryHandler::new(next, move |_: &_, _: &_| {
                b.borrow_mut().push("outer")
            })) as Box<dyn QueryHandler>
        })
        .build();
    let (host, addr) = host.with_recurse_contract()?;
    run(&host, 10_000_000, &addr, &recurse_msg(1, 0)).0?;
    assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    Ok(())
}

#[test]
fn counters_are_scoped_to_their_host() -> Result<(), HostError> {
    let (h1, c1, a1) = crate::testutils::counting_recurse_host(10)?;
    let (h2, c2, a2) = crate::testutils::counting_recurse_host(10)?;
    run(&h1, 10_000_000, &a1, &recurse_msg(3, 0)).0?;
    run(&h2, 10_000_000, &a2, &recurse_msg(1, 0)).0?;
    assert_eq!(c1.get(), 3);
    assert_eq!(c2.get(), 1);
    Ok(())
}

#[test]
fn observers_see_failed_queries_too() -> Result<(), HostError> {
    let (host, counter, addr) = crate::testutils::counting_recurse_host(2)?;
    let (res, _) = run(&host, 10_000_000, &addr, &recurse_msg(5, 0));
    assert!(res.unwrap_err().is_recursion_limit());
    // the query that hit the ceiling was still observed
    assert_eq!(counter.get(), 2);
    Ok(())
}
