use super::core::TaskCore;
use crate::policy::Policy;

use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

struct VTableFor<T, P>(std::marker::PhantomData<(T, P)>);

impl<T: Send + 'static, P: Policy> VTableFor<T, P> {
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        clone_raw::<T, P>,
        wake_raw::<T, P>,
        wake_by_ref_raw::<T, P>,
        drop_raw::<T, P>,
    );
}

/// Creates a [`Waker`] that reschedules `task` through its policy.
///
/// The pointer inside the raw waker comes from `Arc::into_raw` and every
/// vtable entry keeps the reference count balanced.
pub(crate) fn make_waker<T: Send + 'static, P: Policy>(task: Arc<TaskCore<T, P>>) -> Waker {
    // Safety: the vtable functions below uphold the `RawWaker` contract for
    // a pointer obtained from `Arc::into_raw`.
    unsafe {
        Waker::from_raw(RawWaker::new(
            Arc::into_raw(task) as *const (),
            &VTableFor::<T, P>::VTABLE,
        ))
    }
}

unsafe fn clone_raw<T: Send + 'static, P: Policy>(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<TaskCore<T, P>>::from_raw(ptr as *const TaskCore<T, P>) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTableFor::<T, P>::VTABLE)
}

unsafe fn wake_raw<T: Send + 'static, P: Policy>(ptr: *const ()) {
    let arc = unsafe { Arc::<TaskCore<T, P>>::from_raw(ptr as *const TaskCore<T, P>) };
    arc.wake();
}

unsafe fn wake_by_ref_raw<T: Send + 'static, P: Policy>(ptr: *const ()) {
    let arc = unsafe { Arc::<TaskCore<T, P>>::from_raw(ptr as *const TaskCore<T, P>) };
    arc.clone().wake();
    mem::forget(arc);
}

unsafe fn drop_raw<T: Send + 'static, P: Policy>(ptr: *const ()) {
    drop(unsafe { Arc::<TaskCore<T, P>>::from_raw(ptr as *const TaskCore<T, P>) });
}
