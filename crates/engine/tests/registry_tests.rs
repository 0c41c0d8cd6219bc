use std::collections::BTreeMap;

use tracing::info;
use wdb_common::DisplayFormat;
use wdb_engine::{
    CommandStatus, DisplayError, DisplayRegistry, SimExpr, SimulatedDebuggee, ALL_DISPLAYS,
    GRANULARITY,
};

fn add(registry: &mut DisplayRegistry<SimExpr>, debuggee: &SimulatedDebuggee, text: &str) -> usize {
    add_with(registry, debuggee, text, 1, DisplayFormat::Natural)
}

fn add_with(
    registry: &mut DisplayRegistry<SimExpr>,
    debuggee: &SimulatedDebuggee,
    text: &str,
    count: usize,
    format: DisplayFormat,
) -> usize {
    let expr = debuggee.parse(text).unwrap();
    registry.add(debuggee, &expr, count, format).unwrap()
}

fn list(registry: &DisplayRegistry<SimExpr>, debuggee: &SimulatedDebuggee) -> String {
    let mut out = String::new();
    registry.list(debuggee, &mut out).unwrap();
    out
}

fn print_all(registry: &mut DisplayRegistry<SimExpr>, debuggee: &SimulatedDebuggee) -> String {
    let mut out = String::new();
    registry.print_all(debuggee, &mut out).unwrap();
    out
}

fn delete(registry: &mut DisplayRegistry<SimExpr>, number: i64) -> CommandStatus {
    let mut out = String::new();
    registry.delete(&mut out, number).unwrap()
}

#[test]
fn test_deleted_slot_is_reused_by_next_add() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    assert_eq!(add(&mut registry, &debuggee, "counter"), 1);
    assert_eq!(add(&mut registry, &debuggee, "limit"), 2);
    assert_eq!(add(&mut registry, &debuggee, "flags"), 3);
    assert_eq!(delete(&mut registry, 2), CommandStatus::Applied);

    assert_eq!(add(&mut registry, &debuggee, "total"), 2);
    assert_eq!(registry.capacity(), GRANULARITY);
    assert_eq!(list(&registry, &debuggee), "1: counter\n2: total\n3: flags\n");
}

#[test]
fn test_scope_bound_display_follows_frames() {
    wdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    debuggee.call("compute").unwrap();
    add(&mut registry, &debuggee, "acc + 1");
    add(&mut registry, &debuggee, "counter");
    assert_eq!(list(&registry, &debuggee), "1: acc + 1 in compute\n2: counter\n");
    assert_eq!(print_all(&mut registry, &debuggee), "1: acc + 1 = 1\n2: counter = 3\n");

    debuggee.call("helper").unwrap();
    assert_eq!(list(&registry, &debuggee), "1: acc + 1 in compute (out of scope)\n2: counter\n");
    assert_eq!(print_all(&mut registry, &debuggee), "2: counter = 3\n");

    // Back in compute the display is live again and was never disabled
    debuggee.finish().unwrap();
    debuggee.set_variable("acc", 41).unwrap();
    assert_eq!(print_all(&mut registry, &debuggee), "1: acc + 1 = 42\n2: counter = 3\n");
}

#[test]
fn test_recursive_call_stays_in_scope() {
    wdb_common::logging::ensure_test_logging(None);
    let mut debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    debuggee.call("compute").unwrap();
    add(&mut registry, &debuggee, "i");
    debuggee.call("compute").unwrap();
    assert_eq!(list(&registry, &debuggee), "1: i in compute\n");
    assert_eq!(print_all(&mut registry, &debuggee), "1: i = 5\n");
}

#[test]
fn test_same_name_local_in_other_function_is_out_of_scope() {
    wdb_common::logging::ensure_test_logging(None);
    let mut debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    // `i` is a local of both main and compute
    add(&mut registry, &debuggee, "i");
    debuggee.call("compute").unwrap();
    assert_eq!(list(&registry, &debuggee), "1: i in main (out of scope)\n");
    assert!(print_all(&mut registry, &debuggee).is_empty());
}

#[test]
fn test_optimized_away_local_disables_only_its_display() {
    wdb_common::logging::ensure_test_logging(None);
    let mut debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    add(&mut registry, &debuggee, "argc");
    add(&mut registry, &debuggee, "counter");
    debuggee.forget_local("argc").unwrap();

    assert_eq!(
        print_all(&mut registry, &debuggee),
        "Unable to evaluate expression argc\nDisabling display 1 ...\n2: counter = 3\n"
    );
    assert_eq!(list(&registry, &debuggee), "1: argc in main (disabled)\n2: counter\n");
}

#[test]
fn test_no_frame_errors() {
    wdb_common::logging::ensure_test_logging(None);
    let mut debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();
    add(&mut registry, &debuggee, "counter");
    debuggee.finish().unwrap();

    let expr = debuggee.parse("counter + 1").unwrap();
    assert_eq!(registry.add(&debuggee, &expr, 1, DisplayFormat::Natural).unwrap(), 2);

    let mut out = String::new();
    assert!(matches!(registry.list(&debuggee, &mut out), Err(DisplayError::NoFrame)));
    assert!(matches!(registry.print_all(&debuggee, &mut out), Err(DisplayError::NoFrame)));
    assert!(matches!(
        registry.set_enabled(&debuggee, &mut out, 1, false),
        Err(DisplayError::NoFrame)
    ));
    assert!(out.is_empty());

    // Deleting needs no frame
    assert_eq!(registry.delete(&mut out, 1).unwrap(), CommandStatus::Applied);
}

#[test]
fn test_instruction_display_dumps_listing() {
    wdb_common::logging::ensure_test_logging(None);
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();

    add_with(&mut registry, &debuggee, "0x401000 + 3", 2, DisplayFormat::Instruction);
    add_with(&mut registry, &debuggee, "counter", 1, DisplayFormat::Hex);
    assert_eq!(
        print_all(&mut registry, &debuggee),
        "1: 4198400 + 3 = 0x00401003: sub    $0x10,%esp\n0x00401006: call   0x401040 <compute>\n\
         2: counter = 0x3\n"
    );
}

#[test]
fn test_enable_prints_and_disable_is_silent() {
    wdb_common::logging::ensure_test_logging(None);
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();
    add(&mut registry, &debuggee, "limit - counter");

    let mut out = String::new();
    assert_eq!(registry.set_enabled(&debuggee, &mut out, 1, false).unwrap(), CommandStatus::Applied);
    assert!(out.is_empty());
    assert!(print_all(&mut registry, &debuggee).is_empty());

    assert_eq!(registry.print_one(&debuggee, &mut out, 1).unwrap(), CommandStatus::Applied);
    assert_eq!(out, "1: limit - counter = (disabled)\n");

    let mut out = String::new();
    assert_eq!(registry.set_enabled(&debuggee, &mut out, 1, true).unwrap(), CommandStatus::Applied);
    assert_eq!(out, "1: limit - counter = 97\n");
}

#[test]
fn test_delete_all_releases_everything() {
    wdb_common::logging::ensure_test_logging(None);
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();
    for i in 0..40 {
        add(&mut registry, &debuggee, &format!("counter + {i}"));
    }
    assert_eq!(registry.capacity(), 5 * GRANULARITY);

    assert_eq!(delete(&mut registry, ALL_DISPLAYS), CommandStatus::Applied);
    assert!(registry.is_empty());
    assert_eq!(registry.high_water(), 0);
    assert_eq!(registry.capacity(), GRANULARITY);
    assert_eq!(add(&mut registry, &debuggee, "counter"), 1);
}

#[test]
fn test_tail_deletion_shrinks_capacity() {
    wdb_common::logging::ensure_test_logging(None);
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();
    for i in 0..(3 * GRANULARITY) {
        add(&mut registry, &debuggee, &format!("{i}"));
    }
    assert_eq!(registry.capacity(), 3 * GRANULARITY);

    // Middle deletions leave the high-water mark alone
    assert_eq!(delete(&mut registry, 2), CommandStatus::Applied);
    assert_eq!(registry.high_water(), 3 * GRANULARITY);

    let mut number = (3 * GRANULARITY) as i64;
    while registry.capacity() == 3 * GRANULARITY {
        assert_eq!(delete(&mut registry, number), CommandStatus::Applied);
        number -= 1;
    }
    assert_eq!(registry.high_water(), GRANULARITY);
    assert_eq!(registry.capacity(), GRANULARITY);
    assert_eq!(registry.capacity() % GRANULARITY, 0);
}

/// Display numbers of live displays never change across adds and deletes
#[test]
fn test_display_numbers_are_stable() {
    wdb_common::logging::ensure_test_logging(None);
    let debuggee = SimulatedDebuggee::default();
    let mut registry = DisplayRegistry::new();
    let mut expected: BTreeMap<usize, String> = BTreeMap::new();

    // Deterministic linear congruential sequence of operations
    let mut seed: u64 = 0x2545f491;
    for step in 0..500 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let roll = (seed >> 33) % 10;

        if roll < 6 || expected.is_empty() {
            let text = format!("counter + {step}");
            let number = add(&mut registry, &debuggee, &text);
            assert!(expected.insert(number, text).is_none(), "number {number} handed out twice");
        } else {
            let keys: Vec<usize> = expected.keys().copied().collect();
            let victim = keys[(seed as usize >> 7) % keys.len()];
            assert_eq!(delete(&mut registry, victim as i64), CommandStatus::Applied);
            expected.remove(&victim);
        }

        let actual: BTreeMap<usize, String> =
            registry.iter().map(|(number, record)| (number, record.expression().to_string())).collect();
        assert_eq!(actual, expected);
        assert_eq!(registry.capacity() % GRANULARITY, 0);
        assert!(registry.high_water() <= registry.capacity());
    }
}
