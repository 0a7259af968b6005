//! End-to-end tests for dynamic calls between deployed modules.
//!
//! Each test deploys sample modules into an in-memory [Harness] and drives them
//! through [crate::Layer], checking both the returned outcome and what was
//! committed to state.

use commonware_codec::DecodeExt;
use dynlink_types::{Address, LogEntry, Message, Transaction, Value};
use std::{
    collections::BTreeMap,
    num::{NonZeroU64, NonZeroUsize},
};

use crate::{
    mocks::{
        contracts::{Auction, CallNumber, Callee, Caller, Nft, Number, Relay},
        create_account, Harness,
    },
    Error, Invocation, Journal, ValidatedConfig,
};

const TRAP: &str = "Error in dynamic link: RuntimeError: unreachable";
const REENTRY: &str = "A contract can only be called once per one call stack.";

fn msg(entry_point: &str, args: Vec<Value>) -> Message {
    Message::new(entry_point, args)
}

fn addr_arg(address: &Address) -> Value {
    Value::str(address.to_hex())
}

fn ping_pong(harness: &mut Harness) -> (Address, Address) {
    let callee = harness.deploy(Box::new(Callee), "callee", None).unwrap();
    let caller = harness
        .deploy(
            Box::new(Caller),
            "caller",
            Some(msg("instantiate", vec![addr_arg(&callee)])),
        )
        .unwrap();
    (caller, callee)
}

fn numbers(harness: &mut Harness) -> (Address, Address) {
    let number = harness
        .deploy(
            Box::new(Number),
            "number",
            Some(msg("instantiate", vec![Value::Int(21)])),
        )
        .unwrap();
    let call_number = harness
        .deploy(
            Box::new(CallNumber),
            "call_number",
            Some(msg("instantiate", vec![addr_arg(&number)])),
        )
        .unwrap();
    (call_number, number)
}

fn rendered(logs: &[LogEntry]) -> Vec<String> {
    logs.iter().map(ToString::to_string).collect()
}

fn record(fields: Vec<(&str, Value)>) -> Value {
    Value::Record(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn stored_int(harness: &Harness, module: &Address, key: &[u8]) -> Option<i64> {
    harness
        .stored(module, key)
        .map(|bytes| i64::decode(bytes.as_slice()).unwrap())
}

#[test]
fn test_ping_pong_marshals_structured_values() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);

    let logs = harness
        .execute(&create_account(1), &caller, &msg("ping", vec![Value::Int(100)]), 0)
        .unwrap();
    let rendered: Vec<(String, String)> = logs
        .iter()
        .map(|entry| (entry.key.clone(), entry.value.clone()))
        .collect();
    let callee_hex = callee.to_hex();
    assert_eq!(
        rendered,
        vec![
            ("pong".to_string(), "100".to_string()),
            ("returned_pong".to_string(), "101".to_string()),
            ("returned_pong_with_struct".to_string(), "hello world 101".to_string()),
            ("returned_pong_with_tuple".to_string(), "(hello world, 42)".to_string()),
            (
                "returned_pong_with_tuple_takes_2_args".to_string(),
                "(hello world, 42)".to_string()
            ),
            ("returned_contract_address".to_string(), callee_hex),
        ]
    );

    // Entries keep the module that emitted them.
    assert_eq!(logs[0].module, callee);
    assert!(logs[1..].iter().all(|entry| entry.module == caller));
    assert_eq!(stored_int(&harness, &caller, b"pings"), Some(1));
}

#[test]
fn test_reentrancy_is_rejected() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);

    let err = harness
        .execute(&create_account(1), &caller, &msg("try_re_entrancy", vec![]), 0)
        .unwrap_err();
    assert!(matches!(&err, Error::Reentrancy { callee } if *callee == caller));
    assert_eq!(err.to_string(), REENTRY);
    assert_eq!(harness.stored(&caller, b"reentered"), None);
    assert_eq!(harness.stored(&callee, b"attempted"), None);
}

#[test]
fn test_reentrancy_through_any_ancestor() {
    let mut harness = Harness::default();
    let relays: Vec<Address> = (0..3)
        .map(|i| {
            harness
                .deploy(Box::new(Relay), &format!("relay{i}"), None)
                .unwrap()
        })
        .collect();

    // r0 -> r1 -> r2 -> r0
    let hops = format!("{},{},{}", relays[1], relays[2], relays[0]);
    let err = harness
        .query(&relays[0], &msg("forward", vec![Value::str(hops)]))
        .unwrap_err();
    assert!(matches!(err, Error::Reentrancy { .. }));
}

#[test]
fn test_interface_validation() {
    let mut harness = Harness::default();
    let (caller, _) = ping_pong(&mut harness);

    assert_eq!(
        harness
            .query(&caller, &msg("validate_interface", vec![]))
            .unwrap(),
        Vec::<Value>::new()
    );

    harness
        .execute(&create_account(1), &caller, &msg("validate_interface", vec![]), 0)
        .unwrap();

    for _ in 0..2 {
        let err = harness
            .query(&caller, &msg("validate_interface_err", vec![]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The following functions are not implemented: not_exist1, pong_env, not_exist2"
        );
    }
}

#[test]
fn test_dynamic_call_and_query_observe_same_value() {
    let mut harness = Harness::default();
    let (call_number, number) = numbers(&mut harness);

    let logs = harness
        .execute(&create_account(1), &call_number, &msg("mul", vec![Value::Int(2)]), 0)
        .unwrap();
    let rendered: Vec<String> = logs.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["value_by_dynamic=42", "value_by_query=42"]);
    assert!(logs.iter().all(|entry| entry.module == call_number));

    assert_eq!(
        harness.query(&number, &msg("value", vec![])).unwrap(),
        vec![Value::Int(42)]
    );
    assert_eq!(
        harness.query(&call_number, &msg("number", vec![])).unwrap(),
        vec![Value::Int(42)]
    );
    assert_eq!(
        harness
            .query(&call_number, &msg("number_dyn", vec![]))
            .unwrap(),
        vec![Value::Int(42)]
    );
}

#[test]
fn test_writes_in_read_only_context_are_rejected() {
    let mut harness = Harness::default();
    let (call_number, number) = numbers(&mut harness);
    let sender = create_account(1);

    let cases = [
        // Query of a read-write entry point.
        harness.query(&number, &msg("set_value", vec![Value::Int(1)])),
        harness.query(&call_number, &msg("mul", vec![Value::Int(2)])),
        // Read-only entry point that writes anyway.
        harness.query(&number, &msg("sneaky_write", vec![])),
        // Nested read-write call below a read-only frame.
        harness.query(&call_number, &msg("set_via_query", vec![Value::Int(5)])),
        // Nested write caught at the storage boundary.
        harness.query(&call_number, &msg("sneaky_via_call", vec![])),
    ];
    for result in cases {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::ReadOnlyViolation), "{err}");
        assert_eq!(
            err.to_string(),
            "a read-write callable point is called in read-only context"
        );
    }

    // Declared read-only entry points stay read-only inside transactions.
    for entry_point in ["sneaky_via_call", "set_via_query"] {
        let args = if entry_point == "set_via_query" {
            vec![Value::Int(5)]
        } else {
            vec![]
        };
        let err = harness
            .execute(&sender, &call_number, &msg(entry_point, args), 0)
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyViolation));
    }

    assert_eq!(stored_int(&harness, &number, b"value"), Some(21));
}

#[test]
fn test_callee_trap_is_wrapped_and_rolled_back() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);

    let err = harness
        .execute(&create_account(1), &caller, &msg("do_panic", vec![]), 0)
        .unwrap_err();
    assert!(matches!(&err, Error::DynamicLinkTrap { inner } if inner == "RuntimeError: unreachable"));
    assert_eq!(err.to_string(), TRAP);

    assert_eq!(harness.stored(&caller, b"before_panic"), None);
    assert_eq!(harness.stored(&callee, b"panicked"), None);
}

#[test]
fn test_root_trap_is_not_prefixed() {
    let mut harness = Harness::default();
    let (_, callee) = ping_pong(&mut harness);

    let err = harness
        .execute(&create_account(1), &callee, &msg("do_panic", vec![]), 0)
        .unwrap_err();
    assert_eq!(err.to_string(), "RuntimeError: unreachable");
    assert_eq!(harness.stored(&callee, b"panicked"), None);
}

#[test]
fn test_swallowed_trap_aborts_invocation() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);

    // `try_panic` ignores the failed call and returns normally.
    let err = harness
        .execute(&create_account(1), &caller, &msg("try_panic", vec![]), 0)
        .unwrap_err();
    assert!(matches!(&err, Error::DynamicLinkTrap { inner } if inner == "RuntimeError: unreachable"));
    assert_eq!(err.to_string(), TRAP);

    assert_eq!(harness.stored(&caller, b"before_panic"), None);
    assert_eq!(harness.stored(&callee, b"panicked"), None);
}

#[test]
fn test_swallowed_depth_overflow_aborts_invocation() {
    let mut harness = Harness::new(ValidatedConfig {
        max_call_depth: NonZeroUsize::new(1).unwrap(),
        ..ValidatedConfig::default()
    });
    let (caller, _) = ping_pong(&mut harness);

    let err = harness
        .execute(&create_account(1), &caller, &msg("recover_re_entrancy", vec![]), 0)
        .unwrap_err();
    assert!(matches!(err, Error::StackDepthExceeded { max: 1 }));
    assert_eq!(harness.stored(&caller, b"recovered"), None);
}

#[test]
fn test_frame_balance_after_recovered_call() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);

    let logs = harness
        .execute(&create_account(1), &caller, &msg("recover_re_entrancy", vec![]), 0)
        .unwrap();
    assert_eq!(
        rendered(&logs),
        vec![
            format!("error={REENTRY}"),
            "depth_before=0".to_string(),
            "depth_after=0".to_string(),
        ]
    );

    // The caller's own write survives, the failed callee's does not.
    assert_eq!(harness.stored(&caller, b"recovered"), Some(vec![1]));
    assert_eq!(harness.stored(&callee, b"attempted"), None);
}

#[test]
fn test_refused_call_costs_no_gas() {
    let mut harness = Harness::default();
    let (caller, _) = ping_pong(&mut harness);

    let outcome = Invocation::new(
        Journal::new(&harness.state),
        &harness.config,
        &harness.registry,
        &harness.runtime,
        Some(create_account(1)),
        0,
    )
    .execute(&caller, &msg("try_self_call", vec![]), false)
    .unwrap();
    assert_eq!(outcome.results, vec![Value::str(REENTRY)]);

    // Root frame plus the read of the stored callee address.
    let gas = harness.config.gas;
    assert_eq!(outcome.gas_used, gas.call + gas.read);
}

#[test]
fn test_env_reports_caller_sender_and_attached_value() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);
    let sender = create_account(7);

    let logs = harness
        .execute(&sender, &caller, &msg("report_env", vec![]), 500)
        .unwrap();
    assert_eq!(logs.len(), 12);
    let env: BTreeMap<String, String> = logs
        .iter()
        .map(|entry| (entry.key.clone(), entry.value.clone()))
        .collect();

    assert_eq!(env["contract"], caller.to_hex());
    assert_eq!(env["caller"], sender.to_hex());
    assert_eq!(env["sender"], sender.to_hex());
    assert_eq!(env["attached_value"], "500");
    assert_eq!(env["read_only"], "0");
    assert_eq!(env["depth"], "0");

    // Nested frames see the original sender but no attached value.
    assert_eq!(env["callee_contract"], callee.to_hex());
    assert_eq!(env["callee_caller"], caller.to_hex());
    assert_eq!(env["callee_sender"], sender.to_hex());
    assert_eq!(env["callee_attached_value"], "0");
    assert_eq!(env["callee_read_only"], "1");
    assert_eq!(env["callee_depth"], "1");

    assert_eq!(
        harness.query(&callee, &msg("env_report", vec![])).unwrap(),
        vec![record(vec![
            ("contract", Value::str(callee.to_hex())),
            ("caller", Value::str("")),
            ("sender", Value::str("")),
            ("attached_value", Value::Int(0)),
            ("read_only", Value::Int(1)),
            ("depth", Value::Int(0)),
        ])]
    );
}

#[test]
fn test_auction_transfers_token_through_dynamic_calls() {
    let mut harness = Harness::default();
    let seller = create_account(1);
    let bidder = create_account(2);
    let nft = harness
        .deploy(Box::new(Nft), "nft", Some(msg("instantiate", vec![addr_arg(&seller)])))
        .unwrap();
    let auction = harness
        .deploy(Box::new(Auction), "auction", Some(msg("instantiate", vec![])))
        .unwrap();
    let token = || Value::str("nft");
    let owner_of = |harness: &Harness| {
        harness
            .query(&nft, &msg("owner_of", vec![token()]))
            .unwrap()
    };

    // Only the minter mints.
    let err = harness
        .execute(&bidder, &nft, &msg("mint", vec![token(), addr_arg(&bidder)]), 0)
        .unwrap_err();
    assert_eq!(err.to_string(), "unauthorized");
    let logs = harness
        .execute(&seller, &nft, &msg("mint", vec![token(), addr_arg(&seller)]), 0)
        .unwrap();
    assert_eq!(
        rendered(&logs),
        vec![
            "action=mint".to_string(),
            format!("minter={seller}"),
            format!("owner={seller}"),
            "token_id=nft".to_string(),
        ]
    );

    // The auction cannot take custody before the seller approves it.
    let start = msg(
        "start_auction",
        vec![addr_arg(&nft), token(), Value::Int(100)],
    );
    let err = harness.execute(&seller, &auction, &start, 0).unwrap_err();
    assert_eq!(err.to_string(), "Error in dynamic link: unauthorized");
    assert_eq!(
        owner_of(&harness),
        vec![record(vec![
            ("owner", Value::str(seller.to_hex())),
            ("approved", Value::str("")),
        ])]
    );

    harness
        .execute(&seller, &nft, &msg("approve", vec![addr_arg(&auction), token()]), 0)
        .unwrap();
    let logs = harness.execute(&seller, &auction, &start, 0).unwrap();
    assert_eq!(
        rendered(&logs),
        vec![
            "action=transfer_nft".to_string(),
            format!("sender={auction}"),
            format!("recipient={auction}"),
            "token_id=nft".to_string(),
            "method=start_auction".to_string(),
            format!("seller={seller}"),
            format!("nft_address={nft}"),
            "token_id=nft".to_string(),
            "start_bid=100".to_string(),
        ]
    );
    assert_eq!(
        owner_of(&harness),
        vec![record(vec![
            ("owner", Value::str(auction.to_hex())),
            ("approved", Value::str("")),
        ])]
    );
    assert_eq!(
        harness
            .query(&auction, &msg("get_auction_item", vec![]))
            .unwrap(),
        vec![record(vec![
            ("seller", Value::str(seller.to_hex())),
            ("nft_address", Value::str(nft.to_hex())),
            ("token_id", token()),
            ("start_bid", Value::Int(100)),
        ])]
    );

    // The attached value is the bid.
    let err = harness
        .execute(&bidder, &auction, &msg("place_bid", vec![]), 50)
        .unwrap_err();
    assert_eq!(err.to_string(), "bid 50 too low");
    let logs = harness
        .execute(&bidder, &auction, &msg("place_bid", vec![]), 200)
        .unwrap();
    assert_eq!(
        rendered(&logs),
        vec![
            "method=place_bid".to_string(),
            "bid=200".to_string(),
            format!("bidder={bidder}"),
        ]
    );
    assert_eq!(
        harness
            .query(&auction, &msg("get_highest_bid", vec![]))
            .unwrap(),
        vec![record(vec![
            ("highest_bid", Value::Int(200)),
            ("bidder", Value::str(bidder.to_hex())),
        ])]
    );

    let logs = harness
        .execute(&bidder, &auction, &msg("end_auction", vec![]), 0)
        .unwrap();
    let own: Vec<String> = logs
        .iter()
        .filter(|entry| entry.module == auction)
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        own,
        vec![
            "method=end_auction".to_string(),
            "highest_bid=200".to_string(),
            format!("bidder={bidder}"),
        ]
    );
    assert!(logs
        .iter()
        .any(|entry| entry.module == nft && entry.key == "recipient" && entry.value == bidder.to_hex()));

    assert_eq!(
        harness
            .query(&auction, &msg("get_auction_history", vec![Value::Int(0)]))
            .unwrap(),
        vec![record(vec![
            ("seller", Value::str(seller.to_hex())),
            ("nft_address", Value::str(nft.to_hex())),
            ("token_id", token()),
            ("highest_bid", Value::Int(200)),
            ("bidder", Value::str(bidder.to_hex())),
        ])]
    );
    assert_eq!(
        owner_of(&harness),
        vec![record(vec![
            ("owner", Value::str(bidder.to_hex())),
            ("approved", Value::str("")),
        ])]
    );
    let err = harness
        .query(&auction, &msg("get_auction_item", vec![]))
        .unwrap_err();
    assert_eq!(err.to_string(), "no auction in progress");
}

#[test]
fn test_depth_limit() {
    let mut harness = Harness::new(ValidatedConfig {
        max_call_depth: NonZeroUsize::new(4).unwrap(),
        ..ValidatedConfig::default()
    });
    let relays: Vec<Address> = (0..5)
        .map(|i| {
            harness
                .deploy(Box::new(Relay), &format!("relay{i}"), None)
                .unwrap()
        })
        .collect();
    let hops = |relays: &[Address]| {
        relays
            .iter()
            .map(Address::to_hex)
            .collect::<Vec<_>>()
            .join(",")
    };

    let deepest = harness
        .query(
            &relays[0],
            &msg("forward", vec![Value::str(hops(&relays[1..4]))]),
        )
        .unwrap();
    assert_eq!(deepest, vec![Value::Int(3)]);

    let err = harness
        .query(
            &relays[0],
            &msg("forward", vec![Value::str(hops(&relays[1..5]))]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::StackDepthExceeded { max: 4 }));
}

#[test]
fn test_budget_exhaustion_is_sticky() {
    let mut harness = Harness::new(ValidatedConfig {
        compute_budget: NonZeroU64::new(2_000).unwrap(),
        ..ValidatedConfig::default()
    });
    let number = harness
        .deploy(
            Box::new(Number),
            "number",
            Some(msg("instantiate", vec![Value::Int(21)])),
        )
        .unwrap();
    let sender = create_account(1);

    // `burn` ignores failed emits; the invocation still fails.
    let err = harness
        .execute(&sender, &number, &msg("burn", vec![Value::Int(100)]), 0)
        .unwrap_err();
    assert!(matches!(err, Error::BudgetExhausted { limit: 2_000, .. }));

    // Each invocation gets a fresh budget.
    harness
        .execute(&sender, &number, &msg("set_value", vec![Value::Int(7)]), 0)
        .unwrap();
    assert_eq!(
        harness.query(&number, &msg("value", vec![])).unwrap(),
        vec![Value::Int(7)]
    );
}

#[test]
fn test_rejected_before_execution() {
    let mut harness = Harness::default();
    let (caller, callee) = ping_pong(&mut harness);
    let sender = create_account(1);

    let missing = Address::module(404, 404);
    let err = harness
        .execute(&sender, &missing, &msg("ping", vec![]), 0)
        .unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound(address) if address == missing));

    let err = harness
        .execute(&sender, &callee, &msg("nope", vec![]), 0)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The following functions are not implemented: nope"
    );

    let err = harness
        .execute(&sender, &caller, &msg("ping", vec![Value::str("100")]), 0)
        .unwrap_err();
    assert!(matches!(err, Error::InterfaceValidation { missing } if missing == ["ping"]));
    assert_eq!(harness.stored(&caller, b"pings"), None);
}

#[test]
fn test_execute_all_isolates_failures() {
    let mut harness = Harness::default();
    let (caller, _) = ping_pong(&mut harness);
    let sender = create_account(1);
    let tx = |entry_point: &str, args: Vec<Value>| Transaction {
        sender: sender.clone(),
        target: caller.clone(),
        message: msg(entry_point, args),
        attached_value: 0,
    };

    let receipts = harness
        .execute_all(vec![
            tx("ping", vec![Value::Int(100)]),
            tx("do_panic", vec![]),
            tx("ping", vec![Value::Int(1)]),
        ])
        .unwrap();
    assert_eq!(receipts.len(), 3);
    assert!(receipts[0].is_success());
    assert_eq!(receipts[0].logs.len(), 6);
    assert_eq!(receipts[1].error.as_deref(), Some(TRAP));
    assert!(receipts[1].logs.is_empty());
    assert!(receipts[2].is_success());

    assert_eq!(stored_int(&harness, &caller, b"pings"), Some(2));
    assert_eq!(harness.stored(&caller, b"before_panic"), None);
}
