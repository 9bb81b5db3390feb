/*
 * Platform
 *
 * The host-runtime collaborators the scheduler engine depends on but does
 * not implement itself: installing a signal handler for the virtual-time
 * preemption signal, masking/unmasking that signal around critical
 * sections, and arming the periodic interval timer that drives it. This is
 * the userspace-signal analogue of the teacher kernel's
 * arch/x86_64/interrupts.rs + drivers/system/pic.rs pair — "mask the
 * single preemption source around critical sections, unmask outside them"
 * translated from IDT/PIC control to POSIX signal masking.
 */

use std::mem::MaybeUninit;

use crate::error::Error;

/// Build the signal set containing only `SIGVTALRM`, the preemption
/// signal, so masking this library's critical sections never touches any
/// other signal the host process cares about.
fn vtalrm_set() -> Result<libc::sigset_t, Error> {
    unsafe {
        let mut set: libc::sigset_t = MaybeUninit::zeroed().assume_init();
        if libc::sigemptyset(&mut set) != 0 {
            return Err(Error::System("sigemptyset failed".into()));
        }
        if libc::sigaddset(&mut set, libc::SIGVTALRM) != 0 {
            return Err(Error::System("sigaddset failed".into()));
        }
        Ok(set)
    }
}

/// Install `handler` as the disposition for `SIGVTALRM`. The handler runs
/// with `SIGVTALRM` itself blocked for its duration (`sa_mask`), so nested
/// deliveries queue rather than reenter.
pub fn install_handler(handler: extern "C" fn(libc::c_int)) -> Result<(), Error> {
    unsafe {
        let mask = vtalrm_set()?;
        let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
        action.sa_sigaction = handler as usize;
        action.sa_mask = mask;
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGVTALRM, &action, std::ptr::null_mut()) != 0 {
            return Err(Error::System("sigaction failed".into()));
        }
    }
    Ok(())
}

/// Block `SIGVTALRM` from delivery. Every scheduler mutator brackets its
/// critical section with this and [`unblock_signal`].
pub fn block_signal() {
    unsafe {
        let mask = vtalrm_set().expect("system error: failed to build signal mask");
        let ret = libc::sigprocmask(libc::SIG_BLOCK, &mask, std::ptr::null_mut());
        debug_assert_eq!(ret, 0, "sigprocmask(SIG_BLOCK) failed");
    }
}

/// Unblock `SIGVTALRM`, the counterpart to [`block_signal`].
pub fn unblock_signal() {
    unsafe {
        let mask = vtalrm_set().expect("system error: failed to build signal mask");
        let ret = libc::sigprocmask(libc::SIG_UNBLOCK, &mask, std::ptr::null_mut());
        debug_assert_eq!(ret, 0, "sigprocmask(SIG_UNBLOCK) failed");
    }
}

/// Arm (or rearm) the virtual-time interval timer to fire every
/// `quantum_usecs` microseconds, starting one quantum from now.
pub fn arm_timer(quantum_usecs: u64) -> Result<(), Error> {
    let interval = libc::timeval {
        tv_sec: (quantum_usecs / 1_000_000) as libc::time_t,
        tv_usec: (quantum_usecs % 1_000_000) as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: interval,
        it_value: interval,
    };
    unsafe {
        if libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) != 0 {
            return Err(Error::System("setitimer failed".into()));
        }
    }
    Ok(())
}
