/*
 * Context
 *
 * This is the sole locus of unsafe, platform-dependent code in the crate.
 * Everything else is written purely against the save/restore contract
 * described here; no other module reaches into libc directly.
 *
 * A Context is a snapshot of the machine state needed to resume a control
 * flow on its own stack: the registers swapcontext(3) saves and restores,
 * plus (for spawned threads) the stack buffer that state points into. The
 * save/restore contract is the classic asymmetric one: switching *into* a
 * context resumes it exactly where it last switched *out*, as if the
 * switch-out call had just returned.
 *
 * glibc's ucontext_t/swapcontext family gives us this directly, so unlike
 * the historical sigsetjmp/siglongjmp-based implementations of this kind of
 * library, no hand-mangled stack-pointer/program-counter trick is needed
 * here: swapcontext(3) already is a save-then-restore pair with exactly the
 * resume-at-call-site semantics this module exists to provide.
 */

use core::mem::MaybeUninit;

use crate::thread::{Tid, STACK_SIZE};

/// The entry point a freshly bootstrapped context should run when first
/// dispatched. Set by the scheduler immediately before the first switch
/// into a newly spawned thread's context, and consumed once by
/// `trampoline`.
///
/// A single slot suffices because exactly one control flow ever executes at
/// a time: nothing can run between the scheduler setting this and the
/// trampoline reading it.
static PENDING_ENTRY: spin::Mutex<Option<(Tid, fn())>> = spin::Mutex::new(None);

/// A saved machine context and, for threads the library spawned itself, the
/// stack buffer that context's stack pointer lives on.
pub struct Context {
    raw: Box<libc::ucontext_t>,
    stack: Option<Box<[u8]>>,
}

impl Context {
    /// A context representing the calling control flow as it exists right
    /// now. Used for the implicit main thread, which runs on the host
    /// process's own stack rather than one this library allocates.
    ///
    /// The returned context is not yet a valid snapshot — it becomes one
    /// the first time it is passed as the `from` side of [`switch`], which
    /// fills it in via `swapcontext`.
    pub fn for_caller() -> Self {
        Self {
            raw: Box::new(unsafe { MaybeUninit::zeroed().assume_init() }),
            stack: None,
        }
    }

    /// Initialize a context so that the first switch into it enters
    /// `trampoline` on a fresh stack rooted at `STACK_SIZE` bytes. The
    /// thread's actual entry point is recorded in [`PENDING_ENTRY`] by the
    /// scheduler just before that first switch; see `bootstrap` below for
    /// why the entry point itself is not baked in here.
    pub fn bootstrapped(_tid: Tid) -> Self {
        let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
        let mut raw = Box::new(unsafe { MaybeUninit::<libc::ucontext_t>::zeroed().assume_init() });

        unsafe {
            if libc::getcontext(raw.as_mut()) != 0 {
                panic!("system error: getcontext failed while bootstrapping a thread");
            }
        }

        raw.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
        raw.uc_stack.ss_size = stack.len();
        raw.uc_stack.ss_flags = 0;
        raw.uc_link = core::ptr::null_mut();

        unsafe {
            libc::makecontext(raw.as_mut(), trampoline, 0);
        }

        Self {
            raw,
            stack: Some(stack),
        }
    }

    /// Record `entry` as the function the next context bootstrapped for
    /// `tid` should run once it is first dispatched.
    pub fn arm_entry(tid: Tid, entry: fn()) {
        *PENDING_ENTRY.lock() = Some((tid, entry));
    }

    /// Switch the running control flow from `from` to `to`. Returns once
    /// some later switch resumes `from` again — i.e. this call returns in
    /// the *outgoing* thread, not the incoming one.
    ///
    /// # Safety
    /// `from` and `to` must both be contexts previously produced by
    /// `for_caller` or `bootstrapped`, and `to` must not currently be the
    /// target of any other in-flight switch.
    pub unsafe fn switch(from: &mut Context, to: &Context) {
        if libc::swapcontext(from.raw.as_mut(), to.raw.as_ref()) != 0 {
            panic!("system error: swapcontext failed during a context switch");
        }
    }

    /// One-way jump into `to`, discarding the calling control flow entirely.
    /// Used by a self-terminating thread: there is no outgoing context worth
    /// saving, since the stack it would be saved onto is about to be reaped.
    ///
    /// # Safety
    /// `to` must be a context previously produced by `for_caller` or
    /// `bootstrapped`, and the caller must not rely on any destructor or
    /// cleanup after this call — it never returns.
    pub unsafe fn jump_into(to: &Context) -> ! {
        libc::setcontext(to.raw.as_ref());
        panic!("system error: setcontext returned");
    }
}

/// The first function ever run on a freshly bootstrapped thread's stack.
///
/// Consumes the entry point the scheduler staged in [`PENDING_ENTRY`],
/// calls it, and then terminates the thread if it returns — a spawned
/// entry point is not expected to return, but falling off the end of it
/// must not resume into undefined stack state.
extern "C" fn trampoline() {
    // This is the first-ever resumption of this thread, so nothing has yet
    // undone the SIGVTALRM mask baked into its context at bootstrap time
    // (getcontext ran inside spawn's masked critical section). Every other
    // resume path unblocks on its way out; this one must too.
    crate::platform::unblock_signal();

    let staged = PENDING_ENTRY.lock().take();
    if let Some((tid, entry)) = staged {
        entry();
        crate::scheduler::terminate(tid).ok();
    }
    unreachable!("thread library error: trampoline resumed with no staged entry point");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrapped_context_owns_a_full_size_stack() {
        let ctx = Context::bootstrapped(Tid(1));
        assert_eq!(ctx.stack.as_ref().unwrap().len(), STACK_SIZE);
        assert_eq!(ctx.raw.uc_stack.ss_size, STACK_SIZE);
    }

    #[test]
    fn for_caller_owns_no_stack() {
        let ctx = Context::for_caller();
        assert!(ctx.stack.is_none());
    }

    #[test]
    fn arm_entry_stages_exactly_what_was_armed() {
        fn marker() {}
        Context::arm_entry(Tid(7), marker);
        let staged = PENDING_ENTRY.lock().take();
        assert!(matches!(staged, Some((Tid(7), f)) if f == marker));
    }
}
