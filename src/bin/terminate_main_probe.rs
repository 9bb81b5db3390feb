/*
 * Terminate-main probe
 *
 * Exercises the one documented behavior of `terminate` that a `cargo test`
 * binary cannot observe without killing the whole test run: terminating
 * tid 0 exits the hosting process (spec §4.4). `tests/terminate_main.rs`
 * runs this as a subprocess and checks its exit status.
 */

use vthreads::{Config, Tid};

fn main() {
    let config = Config::new(20_000).expect("valid quantum");
    vthreads::init(config).expect("thread library failed to initialize");

    let _ = vthreads::terminate(Tid::MAIN);
    unreachable!("thread library error: terminate(MAIN) returned instead of exiting the process");
}
