/*
 * Scenario probe
 *
 * Runs one end-to-end scenario from spec §8 to completion and prints a
 * single result line on success. Each scenario is its own process
 * (selected by argv[1]) rather than a `#[test]` function in the same
 * binary: `SIGVTALRM` is process-directed, and `cargo test`'s default
 * harness runs each test on its own OS thread, so a stray delivery to a
 * thread that never called `vthreads::init` would have `swapcontext`
 * clobber that thread's stack instead of switching between green
 * threads. One scenario per single-threaded process sidesteps that
 * entirely. `tests/scenarios.rs` drives this binary as a subprocess and
 * checks its stdout and exit status.
 *
 * Busy-waits below poll `vthreads::get_total_quantums()`/
 * `get_quantums_of` rather than sleeping the host OS thread: the
 * preemption timer is `ITIMER_VIRTUAL`, which only advances while this
 * process is actually burning CPU, so a real `sleep` here would starve
 * the very timer the scenario depends on (the same reason
 * `roundrobin_demo` busy-waits instead of sleeping).
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use vthreads::{Config, Tid};

fn main() {
    let scenario = std::env::args().nth(1).unwrap_or_default();
    match scenario.as_str() {
        "round_robin" => round_robin(),
        "self_block" => self_block(),
        "block_ready" => block_ready(),
        "sleep" => sleep_scenario(),
        "sleep_block_interaction" => sleep_block_interaction(),
        "terminate_self" => terminate_self(),
        "out_of_ids" => out_of_ids(),
        other => {
            eprintln!("scenario_probe: unknown scenario {other:?}");
            std::process::exit(2);
        }
    }
}

fn init(quantum_usecs: u64) {
    let config = Config::new(quantum_usecs).expect("valid quantum");
    vthreads::init(config).expect("thread library failed to initialize");
}

/// A generous ceiling on how many quanta a scenario may take before the
/// probe gives up and fails loudly, rather than hanging a test run
/// forever if scheduling logic regresses.
const GIVE_UP_AFTER_QUANTA: u64 = 5_000;

fn wait_until(mut done: impl FnMut() -> bool, what: &str) {
    let deadline = vthreads::get_total_quantums() + GIVE_UP_AFTER_QUANTA;
    loop {
        if done() {
            return;
        }
        if vthreads::get_total_quantums() > deadline {
            eprintln!("scenario_probe: timed out waiting for {what}");
            std::process::exit(1);
        }
        std::hint::spin_loop();
    }
}

/// Scenario 1 (spec §8): round-robin fairness. Three workers plus main,
/// none of them ever blocking or sleeping, must receive quanta in strict
/// rotation. Every participant checks the global quantum count on *every*
/// dispatch, before doing anything else — since `dispatch_next` credits a
/// thread's quantum before resuming it, whichever thread is running the
/// instant the count reaches the target sees every counter already at its
/// final value, simultaneously.
fn round_robin() {
    init(20_000);

    fn worker() {
        loop {
            if vthreads::get_total_quantums() == 12 {
                let main_q = vthreads::get_quantums_of(Tid::MAIN).unwrap();
                let a = vthreads::get_quantums_of(Tid(1)).unwrap();
                let b = vthreads::get_quantums_of(Tid(2)).unwrap();
                let c = vthreads::get_quantums_of(Tid(3)).unwrap();
                println!("round_robin main={main_q} a={a} b={b} c={c} total=12");
                assert_eq!((main_q, a, b, c), (3, 3, 3, 3));
                std::process::exit(0);
            }
            if vthreads::get_total_quantums() > GIVE_UP_AFTER_QUANTA {
                eprintln!("scenario_probe: round_robin never reached total=12");
                std::process::exit(1);
            }
            std::hint::spin_loop();
        }
    }

    for _ in 0..3 {
        vthreads::spawn(worker).expect("spawn failed");
    }
    loop {
        std::hint::spin_loop();
    }
}

/// Scenario: block(self) then resume(other) (the "laws" section's
/// "`block(t)` followed by `resume(t)` restores `t` to READY without
/// changing `quantums_run`" — exercised here with `t` blocking itself,
/// the `block_self` code path rather than `block_ready`'s path).
fn self_block() {
    init(20_000);

    static A_RESUMED: AtomicBool = AtomicBool::new(false);
    static A_QUANTUM_AT_BLOCK: AtomicU64 = AtomicU64::new(0);

    fn worker_a() {
        let tid = vthreads::get_tid();
        A_QUANTUM_AT_BLOCK.store(vthreads::get_quantums_of(tid).unwrap(), Ordering::SeqCst);
        vthreads::block(tid).expect("a blocks itself");
        // Resumed later, exactly where this call left off.
        A_RESUMED.store(true, Ordering::SeqCst);
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    let a = vthreads::spawn(worker_a).expect("spawn a");

    wait_until(
        || A_QUANTUM_AT_BLOCK.load(Ordering::SeqCst) > 0,
        "a to self-block",
    );
    let q_at_block = A_QUANTUM_AT_BLOCK.load(Ordering::SeqCst);

    let start = vthreads::get_total_quantums();
    wait_until(
        || vthreads::get_total_quantums() >= start + 5,
        "5 quanta to pass while a is blocked",
    );
    assert_eq!(
        vthreads::get_quantums_of(a).unwrap(),
        q_at_block,
        "a must not have been scheduled while blocked"
    );
    assert!(!A_RESUMED.load(Ordering::SeqCst));

    vthreads::resume(a).expect("resume a");
    wait_until(|| A_RESUMED.load(Ordering::SeqCst), "a to resume and run");

    println!("self_block ok quantum_unchanged_while_blocked=true resumed=true");
    std::process::exit(0);
}

/// Scenario 5 (spec §8): block a READY thread before it has ever run.
/// Its `quantums_run` must stay 0 and it must not appear in the ready
/// queue until `resume`d.
fn block_ready() {
    init(20_000);

    static B_RAN: AtomicBool = AtomicBool::new(false);

    fn spinner() {
        loop {
            std::hint::spin_loop();
        }
    }

    fn worker_b() {
        B_RAN.store(true, Ordering::SeqCst);
        let tid = vthreads::get_tid();
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    // `spinner` occupies the ready queue ahead of b, and keeps running
    // forever so the scheduler always has someone else to dispatch while
    // b sits blocked.
    vthreads::spawn(spinner).expect("spawn spinner");
    let b = vthreads::spawn(worker_b).expect("spawn b");

    vthreads::block(b).expect("block b before it has ever run");
    assert_eq!(vthreads::get_quantums_of(b).unwrap(), 0);
    assert!(!B_RAN.load(Ordering::SeqCst));

    let start = vthreads::get_total_quantums();
    wait_until(
        || vthreads::get_total_quantums() >= start + 5,
        "5 quanta to pass with b blocked",
    );
    assert_eq!(
        vthreads::get_quantums_of(b).unwrap(),
        0,
        "b must still never have been scheduled"
    );
    assert!(!B_RAN.load(Ordering::SeqCst));

    vthreads::resume(b).expect("resume b");
    wait_until(|| B_RAN.load(Ordering::SeqCst), "b to run after resume");

    println!("block_ready ok quantums_before_resume=0 b_ran=true");
    std::process::exit(0);
}

/// Scenario 3 (spec §8): `sleep(n)` unschedules the caller for exactly
/// `n` quanta, measured in scheduling quanta rather than wall time.
fn sleep_scenario() {
    init(20_000);

    static A_DONE: AtomicBool = AtomicBool::new(false);
    static A_QUANTUM_BEFORE_SLEEP: AtomicU64 = AtomicU64::new(0);
    static A_QUANTUM_AFTER_SLEEP: AtomicU64 = AtomicU64::new(0);

    fn worker_a() {
        let tid = vthreads::get_tid();
        A_QUANTUM_BEFORE_SLEEP.store(vthreads::get_quantums_of(tid).unwrap(), Ordering::SeqCst);
        vthreads::sleep(3).expect("sleep");
        A_QUANTUM_AFTER_SLEEP.store(vthreads::get_quantums_of(tid).unwrap(), Ordering::SeqCst);
        A_DONE.store(true, Ordering::SeqCst);
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    let a = vthreads::spawn(worker_a).expect("spawn a");
    wait_until(|| A_DONE.load(Ordering::SeqCst), "a to wake and terminate");

    let before = A_QUANTUM_BEFORE_SLEEP.load(Ordering::SeqCst);
    let after = A_QUANTUM_AFTER_SLEEP.load(Ordering::SeqCst);
    // a was dispatched exactly twice: once to call sleep(3), once to wake
    // up and return from it. No quantum in between belonged to a.
    assert_eq!(before, 1);
    assert_eq!(after, 2);
    let _ = a;

    println!("sleep ok quantum_before_sleep={before} quantum_after_sleep={after}");
    std::process::exit(0);
}

/// Scenario 6 (spec §8): an explicit block survives sleep expiry. A
/// thread asleep *and* explicitly blocked stays BLOCKED once its sleep
/// countdown reaches zero; only a subsequent `resume` readies it.
fn sleep_block_interaction() {
    init(20_000);

    static A_DONE: AtomicBool = AtomicBool::new(false);

    fn worker_a() {
        vthreads::sleep(5).expect("sleep");
        A_DONE.store(true, Ordering::SeqCst);
        let tid = vthreads::get_tid();
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    let a = vthreads::spawn(worker_a).expect("spawn a");

    // Give a a chance to reach its sleep call, then block it explicitly
    // while it is asleep.
    let start = vthreads::get_total_quantums();
    wait_until(
        || vthreads::get_total_quantums() >= start + 1,
        "a to start sleeping",
    );
    vthreads::block(a).expect("block a while it is sleeping");

    // Let well more than 5 quanta pass: a's sleep countdown expires
    // internally, but the explicit block must keep it off the ready
    // queue regardless.
    let t0 = vthreads::get_total_quantums();
    wait_until(
        || vthreads::get_total_quantums() >= t0 + 10,
        "10 quanta to pass with a blocked past its sleep expiry",
    );
    assert!(
        !A_DONE.load(Ordering::SeqCst),
        "explicit block must survive sleep expiry"
    );

    vthreads::resume(a).expect("resume a");
    wait_until(|| A_DONE.load(Ordering::SeqCst), "a to run after resume");

    println!("sleep_block_interaction ok a_done=true");
    std::process::exit(0);
}

/// Boundary (spec §8): spawning exactly `max_threads - 1` user threads
/// succeeds; the next spawn fails with `OutOfIds`. Uses a shrunk
/// `max_threads` so the scenario doesn't need to actually spawn 63
/// threads to hit the cap.
fn out_of_ids() {
    let config = Config::new(20_000)
        .expect("valid quantum")
        .with_max_threads(3);
    vthreads::init(config).expect("thread library failed to initialize");

    let a = vthreads::spawn(|| loop {
        std::hint::spin_loop();
    })
    .expect("spawn 1 of 2 should succeed");
    let b = vthreads::spawn(|| loop {
        std::hint::spin_loop();
    })
    .expect("spawn 2 of 2 should succeed");
    assert_eq!(a, Tid(1));
    assert_eq!(b, Tid(2));

    let err = vthreads::spawn(|| {}).expect_err("third spawn must exhaust the id pool");
    assert!(
        matches!(err, vthreads::Error::OutOfIds(_)),
        "expected OutOfIds, got {err:?}"
    );

    println!("out_of_ids ok spawned=2 third_spawn_failed=true");
    std::process::exit(0);
}

/// Scenario 4 (spec §8): a thread terminating itself hands control to
/// the next ready thread, and its id returns to the pool for immediate
/// reuse by the next `spawn`.
fn terminate_self() {
    init(20_000);

    static B_RAN: AtomicBool = AtomicBool::new(false);

    fn worker_a() {
        let tid = vthreads::get_tid();
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    fn worker_b() {
        B_RAN.store(true, Ordering::SeqCst);
        let tid = vthreads::get_tid();
        let _ = vthreads::terminate(tid);
        unreachable!("terminate(self) returned");
    }

    let a = vthreads::spawn(worker_a).expect("spawn a");
    let b = vthreads::spawn(worker_b).expect("spawn b");
    assert_eq!(a, Tid(1));
    assert_eq!(b, Tid(2));

    wait_until(
        || vthreads::get_quantums_of(a).is_err() && vthreads::get_quantums_of(b).is_err(),
        "a and b to both self-terminate",
    );
    assert!(B_RAN.load(Ordering::SeqCst), "control must have reached b");

    let reused = vthreads::spawn(|| {}).expect("respawn after both terminated");
    println!("terminate_self ok b_ran=true reused_tid={reused}");
    assert_eq!(reused, Tid(1), "the smallest freed id must be reused first");
    std::process::exit(0);
}
