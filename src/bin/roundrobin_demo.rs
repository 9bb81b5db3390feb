/*
 * Round-robin demo
 *
 * A small standalone program exercising the thread library end to end:
 * spawns a handful of worker threads that each print their own tid and
 * sleep briefly, and lets the scheduler interleave them in FIFO order
 * until they all self-terminate.
 */

use vthreads::{Config, Tid};

fn worker_a() {
    run_worker("a", 4);
}

fn worker_b() {
    run_worker("b", 4);
}

fn worker_c() {
    run_worker("c", 4);
}

fn run_worker(name: &str, rounds: u32) {
    let tid = vthreads::get_tid();
    for round in 0..rounds {
        log::info!("worker {name} (tid {tid}): round {round}");
        if let Err(err) = vthreads::sleep(1) {
            log::error!("worker {name} (tid {tid}) failed to sleep: {err}");
            return;
        }
    }
    log::info!("worker {name} (tid {tid}) done, terminating");
    let _ = vthreads::terminate(tid);
}

fn main() {
    env_logger::init();

    let config = Config::new(50_000).expect("valid default quantum");
    vthreads::init(config).expect("thread library failed to initialize");

    let spawned: Vec<Tid> = [worker_a, worker_b, worker_c]
        .into_iter()
        .map(|entry| vthreads::spawn(entry).expect("spawn failed"))
        .collect();

    log::info!("main: spawned workers {spawned:?}, waiting for them to finish");

    // The main thread has no blocking join primitive available (there is
    // none in this library's surface), and no way to voluntarily yield to
    // it other than the preemption timer, so it must busy-spin here
    // rather than call a real blocking sleep: SIGVTALRM is driven by
    // ITIMER_VIRTUAL, which only counts CPU time actually spent in this
    // process, not wall-clock time spent blocked in a syscall.
    loop {
        let all_gone = spawned
            .iter()
            .all(|&tid| vthreads::get_quantums_of(tid).is_err());
        if all_gone {
            break;
        }
        std::hint::spin_loop();
    }

    log::info!("main: all workers finished after {} quanta", vthreads::get_total_quantums());
}
