use crate::{
    test::util::{run, COST_50},
    testutils::{counting_recurse_host, recurse_msg},
    HostError,
};

#[test]
fn ceiling_is_configurable() -> Result<(), HostError> {
    for max in [1u32, 2, 5] {
        let (host, counter, addr) = counting_recurse_host(max)?;
        // max frames fit, one more does not
        let (res, _) = run(&host, 10_000_000, &addr, &recurse_msg(max - 1, 50));
        res?;
        counter.reset();
        let (res, consumed) = run(&host, 10_000_000, &addr, &recurse_msg(max, 50));
        assert!(res.unwrap_err().is_recursion_limit());
        assert_eq!(counter.get(), max);
        assert_eq!(consumed, max as u64 * COST_50);
    }
    Ok(())
}

#[test]
fn zero_ceiling_refuses_without_charging() -> Result<(), HostError> {
    let (host, counter, addr) = counting_recurse_host(0)?;
    let (res, consumed) = run(&host, 10_000_000, &addr, &recurse_msg(0, 0));
    assert!(res.unwrap_err().is_recursion_limit());
    assert_eq!(consumed, 0);
    assert_eq!(counter.get(), 0);
    Ok(())
}

#[test]
fn each_top_level_call_starts_at_depth_zero() -> Result<(), HostError> {
    let (host, _counter, addr) = counting_recurse_host(3)?;
    // a failing call must not leave depth behind for the next one
    for _ in 0..5 {
        let (res, _) = run(&host, 10_000_000, &addr, &recurse_msg(10, 0));
        assert!(res.unwrap_err().is_recursion_limit());
        let (res, _) = run(&host, 10_000_000, &addr, &recurse_msg(2, 0));
        res?;
    }
    Ok(())
}
