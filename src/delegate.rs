//! Task callbacks: an invocable paired with a liveness probe.
//!
//! The scheduler never stores references into caller-owned state. A callback
//! either owns everything it needs ([`TaskDelegate::from_fn`]) or is bound to
//! a weakly referenced target ([`TaskDelegate::from_weak`]). The liveness
//! probe lets the scheduler detect that a bound target has been destroyed
//! without the owner remembering to remove the task; such stale tasks are
//! auto-removed during the tick walk.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// An invocable callback with an associated liveness check.
pub struct TaskDelegate {
    callback: Box<dyn FnMut()>,
    liveness: Liveness,
}

enum Liveness {
    /// The callback owns its state and stays alive for the lifetime of the task.
    Static,
    /// The callback is bound to a target that may be destroyed by its owner.
    Probed(Box<dyn Fn() -> bool>),
}

impl TaskDelegate {
    /// Delegate from a self-contained closure. Always alive.
    pub fn from_fn(callback: impl FnMut() + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            liveness: Liveness::Static,
        }
    }

    /// Delegate from a closure with an explicit liveness probe.
    ///
    /// Useful when the owner tracks target validity itself, e.g. via a flag
    /// it clears before tearing the target down.
    pub fn from_fn_with_liveness(
        callback: impl FnMut() + 'static,
        probe: impl Fn() -> bool + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
            liveness: Liveness::Probed(Box::new(probe)),
        }
    }

    /// Delegate bound to a shared target through a weak reference.
    ///
    /// The delegate reports dead once the last strong reference to `target`
    /// is dropped. Invoking a dead delegate is a no-op, though the scheduler
    /// evicts the task before ever doing so.
    pub fn from_weak<T: 'static>(
        target: &Rc<RefCell<T>>,
        mut method: impl FnMut(&mut T) + 'static,
    ) -> Self {
        let weak = Rc::downgrade(target);
        let probe = weak.clone();
        Self {
            callback: Box::new(move || {
                if let Some(target) = weak.upgrade() {
                    method(&mut target.borrow_mut());
                }
            }),
            liveness: Liveness::Probed(Box::new(move || probe.strong_count() > 0)),
        }
    }

    pub(crate) fn invoke(&mut self) {
        (self.callback)();
    }

    /// Whether the callback target still exists.
    pub fn is_alive(&self) -> bool {
        match &self.liveness {
            Liveness::Static => true,
            Liveness::Probed(probe) => probe(),
        }
    }
}

impl fmt::Debug for TaskDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDelegate")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
