//! Host-memory exception handling.
//!
//! A process-wide registry maps arena code ranges to their fastmem site
//! tables. The POSIX signal handler turns a fault at a registered site into
//! a fake call: the return address is pushed onto the faulting context's
//! stack and control is redirected to the site's far-code thunk, which
//! performs the access through the memory callbacks and returns to the
//! instruction after the faulting load. Faults anywhere else chain to the
//! previously installed handler.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Where the signal handler redirects a faulting fastmem access.
#[derive(Clone, Copy, Debug)]
pub struct FakeCall {
    pub call_rip: u64,
    pub ret_rip: u64,
}

/// A spinlock usable from signal context.
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: core::cell::UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(value: T) -> SpinLock<T> {
        SpinLock { locked: AtomicBool::new(false), value: core::cell::UnsafeCell::new(value) }
    }

    pub fn lock(&self) -> SpinGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        SpinGuard { lock: self }
    }
}

pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> core::ops::Deref for SpinGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> core::ops::DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Shared fastmem site table: faulting host PC to its fake call.
#[derive(Clone, Default)]
pub struct FastmemSites(Arc<SpinLock<FxHashMap<u64, FakeCall>>>);

impl Default for SpinLock<FxHashMap<u64, FakeCall>> {
    fn default() -> Self {
        SpinLock::new(FxHashMap::default())
    }
}

impl FastmemSites {
    pub fn lock(&self) -> SpinGuard<'_, FxHashMap<u64, FakeCall>> {
        self.0.lock()
    }
}

struct CodeRange {
    begin: u64,
    end: u64,
    sites: FastmemSites,
}

static REGISTRY: SpinLock<Vec<CodeRange>> = SpinLock {
    locked: AtomicBool::new(false),
    value: core::cell::UnsafeCell::new(Vec::new()),
};

/// Register an arena's code range. Double registration of an overlapping
/// range replaces the previous entry.
pub fn register_code_range(begin: u64, end: u64, sites: FastmemSites) {
    install_handler_once();
    let mut registry = REGISTRY.lock();
    registry.retain(|range| range.begin != begin);
    registry.push(CodeRange { begin, end, sites });
}

pub fn unregister_code_range(begin: u64) {
    let mut registry = REGISTRY.lock();
    registry.retain(|range| range.begin != begin);
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use core::ffi::c_void;
        use std::sync::Once;

        static INSTALL: Once = Once::new();
        static mut OLD_SEGV: libc::sigaction = unsafe { core::mem::zeroed() };
        #[cfg(target_os = "macos")]
        static mut OLD_BUS: libc::sigaction = unsafe { core::mem::zeroed() };

        fn install_handler_once() {
            INSTALL.call_once(|| unsafe {
                // A dedicated stack large enough to survive faults taken
                // with little room left on the thread stack.
                let stack_size = usize::max(libc::SIGSTKSZ, 2 * 1024 * 1024);
                let stack = libc::malloc(stack_size);
                assert!(!stack.is_null(), "failed to allocate the signal stack");
                let altstack = libc::stack_t {
                    ss_sp: stack,
                    ss_flags: 0,
                    ss_size: stack_size,
                };
                let ret = libc::sigaltstack(&altstack, core::ptr::null_mut());
                assert_eq!(ret, 0, "sigaltstack failed");

                let mut sa: libc::sigaction = core::mem::zeroed();
                sa.sa_sigaction = handler as usize;
                sa.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK | libc::SA_RESTART;
                libc::sigemptyset(&mut sa.sa_mask);
                libc::sigaction(libc::SIGSEGV, &sa, core::ptr::addr_of_mut!(OLD_SEGV));
                #[cfg(target_os = "macos")]
                libc::sigaction(libc::SIGBUS, &sa, core::ptr::addr_of_mut!(OLD_BUS));
            });
        }

        unsafe fn context_rip(context: *mut c_void) -> *mut i64 {
            cfg_if::cfg_if! {
                if #[cfg(target_os = "linux")] {
                    let uc = context.cast::<libc::ucontext_t>();
                    &mut (*uc).uc_mcontext.gregs[libc::REG_RIP as usize] as *mut i64
                } else if #[cfg(target_os = "macos")] {
                    let uc = context.cast::<libc::ucontext_t>();
                    &mut (*(*uc).uc_mcontext).__ss.__rip as *mut u64 as *mut i64
                } else {
                    compile_error!("unsupported platform for the exception handler")
                }
            }
        }

        unsafe fn context_rsp(context: *mut c_void) -> *mut i64 {
            cfg_if::cfg_if! {
                if #[cfg(target_os = "linux")] {
                    let uc = context.cast::<libc::ucontext_t>();
                    &mut (*uc).uc_mcontext.gregs[libc::REG_RSP as usize] as *mut i64
                } else if #[cfg(target_os = "macos")] {
                    let uc = context.cast::<libc::ucontext_t>();
                    &mut (*(*uc).uc_mcontext).__ss.__rsp as *mut u64 as *mut i64
                } else {
                    compile_error!("unsupported platform for the exception handler")
                }
            }
        }

        extern "C" fn handler(sig: i32, info: *mut libc::siginfo_t, context: *mut c_void) {
            unsafe {
                let rip_slot = context_rip(context);
                let rip = *rip_slot as u64;

                let fake_call = {
                    let registry = REGISTRY.lock();
                    registry
                        .iter()
                        .find(|range| range.begin <= rip && rip < range.end)
                        .and_then(|range| range.sites.lock().get(&rip).copied())
                };

                if let Some(fake_call) = fake_call {
                    // Rewrite the context as if the faulting instruction had
                    // been a call to the thunk.
                    let rsp_slot = context_rsp(context);
                    let rsp = (*rsp_slot as u64).wrapping_sub(8);
                    (rsp as *mut u64).write(fake_call.ret_rip);
                    *rsp_slot = rsp as i64;
                    *rip_slot = fake_call.call_rip as i64;
                    return;
                }

                // Not ours: hand the fault to whoever was installed before.
                chain_to_previous(sig, info, context);
            }
        }

        unsafe fn chain_to_previous(sig: i32, info: *mut libc::siginfo_t, context: *mut c_void) {
            let old = {
                cfg_if::cfg_if! {
                    if #[cfg(target_os = "macos")] {
                        if sig == libc::SIGBUS {
                            core::ptr::addr_of!(OLD_BUS).read()
                        } else {
                            core::ptr::addr_of!(OLD_SEGV).read()
                        }
                    } else {
                        let _ = sig;
                        core::ptr::addr_of!(OLD_SEGV).read()
                    }
                }
            };

            if old.sa_flags & libc::SA_SIGINFO != 0 {
                let previous: extern "C" fn(i32, *mut libc::siginfo_t, *mut c_void) =
                    core::mem::transmute(old.sa_sigaction);
                previous(sig, info, context);
                return;
            }
            if old.sa_sigaction == libc::SIG_DFL {
                // Restore the default action; the fault re-raises on return.
                libc::signal(sig, libc::SIG_DFL);
                return;
            }
            if old.sa_sigaction == libc::SIG_IGN {
                return;
            }
            let previous: extern "C" fn(i32) = core::mem::transmute(old.sa_sigaction);
            previous(sig);
        }
    } else {
        fn install_handler_once() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_insert_and_remove() {
        let sites = FastmemSites::default();
        sites.lock().insert(0x1234, FakeCall { call_rip: 1, ret_rip: 2 });
        register_code_range(0x1000, 0x2000, sites.clone());

        {
            let registry = REGISTRY.lock();
            let range = registry.iter().find(|r| r.begin == 0x1000).unwrap();
            assert!(range.sites.lock().contains_key(&0x1234));
        }

        unregister_code_range(0x1000);
        let registry = REGISTRY.lock();
        assert!(!registry.iter().any(|r| r.begin == 0x1000));
    }

    #[test]
    fn spinlock_guards_mutation() {
        let lock = SpinLock::new(0u32);
        *lock.lock() += 1;
        *lock.lock() += 1;
        assert_eq!(*lock.lock(), 2);
    }
}
