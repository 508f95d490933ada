use serial_test::serial;

use super::*;

#[test]
#[serial]
fn test_counters_accumulate_by_label() {
    let before = NODE_START_TOTAL.with_label_values(&["shard"]).get();
    NODE_START_TOTAL.with_label_values(&["shard"]).inc();
    assert_eq!(before + 1, NODE_START_TOTAL.with_label_values(&["shard"]).get());
}

#[test]
#[serial]
fn test_dispatch_counter_separates_ok_flag() {
    COMMAND_DISPATCH_TOTAL.with_label_values(&["ping", "true"]).inc();
    COMMAND_DISPATCH_TOTAL.with_label_values(&["ping", "false"]).inc();
    assert!(COMMAND_DISPATCH_TOTAL.with_label_values(&["ping", "true"]).get() >= 1);
    assert!(COMMAND_DISPATCH_TOTAL.with_label_values(&["ping", "false"]).get() >= 1);
}
