//! Script runtime seam
//!
//! The server never interprets scripts itself. It calls through
//! [`ScriptRuntime`] with a callback handle, the acting NPC and positional
//! arguments. [`NativeRuntime`] backs callbacks with Rust closures.

use crate::callbacks::{CallbackRef, CallbackRegistry};
use crate::error::{Result, ScriptError};
use crate::value::ScriptValue;
use ots_core::CreatureId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can run script callbacks
pub trait ScriptRuntime: Send {
    /// Invoke `callback` on behalf of `npc`
    ///
    /// # Returns
    /// The callback's return value, if it produced one
    fn call(
        &mut self,
        callback: CallbackRef,
        npc: CreatureId,
        args: &[ScriptValue],
    ) -> Result<Option<ScriptValue>>;

    /// Release a callback handle
    fn release(&mut self, callback: CallbackRef);
}

/// Runtime shared by every NPC bound to it
pub type SharedRuntime = Arc<Mutex<dyn ScriptRuntime>>;

pub type NativeCallback =
    Box<dyn FnMut(CreatureId, &[ScriptValue]) -> Result<Option<ScriptValue>> + Send>;

/// Runtime whose callbacks are Rust closures
#[derive(Default)]
pub struct NativeRuntime {
    callbacks: CallbackRegistry<NativeCallback>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, callback: F) -> CallbackRef
    where
        F: FnMut(CreatureId, &[ScriptValue]) -> Result<Option<ScriptValue>> + Send + 'static,
    {
        self.callbacks.register(Box::new(callback))
    }

    pub fn live_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    pub fn into_shared(self) -> SharedRuntime {
        Arc::new(Mutex::new(self))
    }
}

impl ScriptRuntime for NativeRuntime {
    fn call(
        &mut self,
        callback: CallbackRef,
        npc: CreatureId,
        args: &[ScriptValue],
    ) -> Result<Option<ScriptValue>> {
        let function = self
            .callbacks
            .get_mut(callback)
            .ok_or(ScriptError::CallbackNotFound(callback.get()))?;
        function(npc, args)
    }

    fn release(&mut self, callback: CallbackRef) {
        self.callbacks.release(callback);
    }
}
