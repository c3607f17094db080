//! Fuzz target for the account registry
//!
//! # Strategy
//!
//! - Small name and connection spaces so operations collide often
//! - Arbitrary list patterns, including broken character classes
//! - Delivery failures reported against stale connections
//!
//! # Invariants
//!
//! - The name and connection indexes always agree
//! - A connection is bound to at most one account and vice versa
//! - Queued message count only drops on `check_message` or deletion
//! - NEVER panic on any pattern

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_core::{ConnectionId, Registry, Route};

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Create { name: u8 },
    LogIn { conn: u8, name: u8 },
    Send { conn: u8, receiver: u8 },
    FailDelivery { receiver: u8, conn: u8 },
    Check { conn: u8 },
    Delete { conn: u8 },
    List { pattern: String },
    Quit { conn: u8 },
    Release { conn: u8 },
}

fn name(index: u8) -> &'static str {
    NAMES[usize::from(index) % NAMES.len()]
}

fn conn(index: u8) -> ConnectionId {
    ConnectionId(u64::from(index % 4))
}

fn total_queued(registry: &Registry<ConnectionId>) -> usize {
    NAMES.iter().filter_map(|n| registry.queued(n)).sum()
}

fuzz_target!(|ops: Vec<Op>| {
    let mut registry: Registry<ConnectionId> = Registry::new();

    for op in ops {
        let before = total_queued(&registry);
        let mut may_shrink = false;

        match op {
            Op::Create { name: n } => {
                let _ = registry.create_account(name(n));
            },
            Op::LogIn { conn: c, name: n } => {
                let _ = registry.log_in(conn(c), conn(c), name(n));
            },
            Op::Send { conn: c, receiver } => {
                if let Ok(Route::Deliver { peer, connection, .. }) =
                    registry.route(conn(c), name(receiver), "fuzz")
                {
                    assert_eq!(peer, connection, "peer handle follows the binding");
                    assert_eq!(registry.account_of(connection), Some(name(receiver)));
                }
            },
            Op::FailDelivery { receiver, conn: c } => {
                registry.delivery_failed(name(receiver), conn(c), "x:fuzz\n".to_string());
            },
            Op::Check { conn: c } => {
                may_shrink = true;
                let _ = registry.check_message(conn(c));
            },
            Op::Delete { conn: c } => {
                may_shrink = true;
                let _ = registry.delete_account(conn(c));
            },
            Op::List { pattern } => {
                if let Ok(names) = registry.list_account(&pattern) {
                    assert!(names.windows(2).all(|w| w[0] < w[1]), "sorted and unique");
                }
            },
            Op::Quit { conn: c } => {
                let _ = registry.quit(conn(c));
            },
            Op::Release { conn: c } => {
                let _ = registry.release(conn(c));
            },
        }

        assert!(registry.is_consistent(), "index diverged");
        if !may_shrink {
            assert!(total_queued(&registry) >= before, "messages lost");
        }
    }
});
