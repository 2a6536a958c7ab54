//! Opaque handles: boxed engine objects handed to the caller as raw pointers
//! and reclaimed by the matching `destroy*` call.

use crate::error::FfiError;
use helios::core::context::Context;
use std::ptr::NonNull;

/// A plugin model bound to the context it was created with. The context must
/// outlive the handle.
pub struct PluginHandle<M> {
    context: NonNull<Context>,
    model: M,
}

impl<M> PluginHandle<M> {
    pub(crate) fn create(context: *mut Context, model: M) -> Result<*mut Self, FfiError> {
        let context = NonNull::new(context).ok_or_else(|| FfiError::null("Context"))?;
        Ok(into_handle(Self { context, model }))
    }

    pub(crate) fn model(&mut self) -> &mut M {
        &mut self.model
    }

    pub(crate) fn model_ref(&self) -> &M {
        &self.model
    }

    pub(crate) fn split(&mut self) -> (&mut M, &mut Context) {
        (&mut self.model, unsafe { self.context.as_mut() })
    }

    pub(crate) fn context(&self) -> &Context {
        unsafe { self.context.as_ref() }
    }
}

pub(crate) fn into_handle<T>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}

/// Reclaims a handle produced by [`into_handle`]. Null is a no-op.
pub(crate) fn destroy<T>(handle: *mut T) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

pub(crate) fn handle_ref<'a, T>(handle: *const T, what: &str) -> Result<&'a T, FfiError> {
    unsafe { handle.as_ref() }.ok_or_else(|| FfiError::invalid(format!("{what} handle is null")))
}

pub(crate) fn handle_mut<'a, T>(handle: *mut T, what: &str) -> Result<&'a mut T, FfiError> {
    unsafe { handle.as_mut() }.ok_or_else(|| FfiError::invalid(format!("{what} handle is null")))
}

pub(crate) fn context_ref<'a>(context: *const Context) -> Result<&'a Context, FfiError> {
    handle_ref(context, "Context")
}

pub(crate) fn context_mut<'a>(context: *mut Context) -> Result<&'a mut Context, FfiError> {
    handle_mut(context, "Context")
}
