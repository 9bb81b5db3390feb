//! Black-box end-to-end tests for the six scenarios in spec §8.
//!
//! Each scenario runs to completion in its own subprocess
//! (`scenario_probe`, selected by argv[1]) rather than as a plain
//! `#[test]` in this binary. `SIGVTALRM` is process-directed and
//! `cargo test`'s default harness runs every `#[test]` on its own OS
//! thread; if the timer ever delivered to a thread that had never called
//! `vthreads::init`, the context-switch primitive would clobber that
//! thread's stack rather than switch between green threads. One
//! single-threaded process per scenario avoids the question entirely.
//! Each probe asserts its own invariants internally and panics (nonzero
//! exit) on failure, so these tests mostly check for a clean exit and a
//! sanity-check the printed summary line.

use std::process::{Command, Output};

fn run_scenario(name: &str) -> Output {
    let exe = env!("CARGO_BIN_EXE_scenario_probe");
    Command::new(exe)
        .arg(name)
        .output()
        .unwrap_or_else(|err| panic!("failed to launch scenario_probe {name}: {err}"))
}

fn assert_scenario_ok(name: &str, expect_substring: &str) {
    let output = run_scenario(name);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "scenario {name} failed (status {:?})\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status
    );
    assert!(
        stdout.contains(expect_substring),
        "scenario {name} stdout missing {expect_substring:?}:\n{stdout}"
    );
}

/// Scenario 1: round-robin fairness among four perpetually-ready
/// participants (main + 3 workers) — after 12 quanta every one of them
/// has run exactly 3 times.
#[test]
fn round_robin_fairness() {
    assert_scenario_ok("round_robin", "main=3 a=3 b=3 c=3 total=12");
}

/// "Laws" (spec §8): `block(t)` then `resume(t)` restores `t` to READY
/// without changing `quantums_run`, exercised with `t` blocking itself.
#[test]
fn self_block_then_resume_preserves_quantum_count() {
    assert_scenario_ok("self_block", "quantum_unchanged_while_blocked=true resumed=true");
}

/// Scenario 5: blocking a READY thread before it has ever run keeps its
/// quantum count at 0 and keeps it off the ready queue until resumed.
#[test]
fn blocking_a_ready_thread_before_its_first_run() {
    assert_scenario_ok("block_ready", "quantums_before_resume=0 b_ran=true");
}

/// Scenario 3: `sleep(n)` unschedules the caller for exactly `n` quanta.
#[test]
fn sleep_unschedules_for_exactly_n_quanta() {
    assert_scenario_ok("sleep", "quantum_before_sleep=1 quantum_after_sleep=2");
}

/// Scenario 6: an explicit block survives sleep expiry; only a
/// subsequent `resume` re-readies the thread.
#[test]
fn explicit_block_survives_sleep_expiry() {
    assert_scenario_ok("sleep_block_interaction", "a_done=true");
}

/// Scenario 4: terminating the current thread hands control to the next
/// ready thread, and releases its id for immediate reuse by `spawn`.
#[test]
fn terminate_self_hands_off_and_frees_its_id() {
    assert_scenario_ok("terminate_self", "reused_tid=1");
}

/// Boundary: spawning exactly `max_threads - 1` threads succeeds; the
/// next spawn fails with `OutOfIds`.
#[test]
fn spawning_beyond_capacity_fails_with_out_of_ids() {
    assert_scenario_ok("out_of_ids", "spawned=2 third_spawn_failed=true");
}
