//! Black-box test for "terminating tid 0 exits the hosting process"
//! (spec §4.4). Runs `terminate_main_probe` as a subprocess, since this
//! behavior would otherwise take the whole test binary down with it.

use std::process::Command;

#[test]
fn terminating_main_exits_the_process_with_status_zero() {
    let exe = env!("CARGO_BIN_EXE_terminate_main_probe");
    let status = Command::new(exe)
        .status()
        .expect("failed to launch terminate_main_probe");
    assert!(
        status.success(),
        "terminate(MAIN) should exit the process with status 0, got {status:?}"
    );
}
