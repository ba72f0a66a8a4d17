//! Built-in demonstration provider.
//!
//! Tracks a minimal Linux kernel state model from an LTTng-style event
//! stream: which thread runs on each CPU, each thread's scheduling
//! status, and the system call a thread is currently in. Useful as a
//! smoke provider for the CLI and as the reference for writing real
//! providers.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::event::{Event, FieldValue, TraceSet};
use crate::provider::config::ProviderConfig;
use crate::provider::host::{Registrar, StateProvider};
use crate::state::CurrentState;

/// State subtree keys used by the provider.
const THREADS: &str = "threads";
const CPUS: &str = "cpus";
const STATUS: &str = "status";
const SYSCALL: &str = "syscall";
const CURRENT_THREAD: &str = "current-thread";

/// Linux scheduling and system call state provider.
pub struct LinuxSchedProvider {
    events_seen: Rc<Cell<u64>>,
    instance: Option<String>,
}

impl LinuxSchedProvider {
    /// Builds the provider from its configuration.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            events_seen: Rc::new(Cell::new(0)),
            instance: config.instance().map(str::to_owned),
        }
    }

    /// Returns how many events the provider's callbacks have handled.
    #[must_use]
    pub fn events_seen(&self) -> u64 {
        self.events_seen.get()
    }
}

fn on_sched_switch(state: &mut CurrentState<'_>, event: &Event) -> bool {
    let prev = event.field("prev_tid").and_then(FieldValue::as_int);
    let next = event.field("next_tid").and_then(FieldValue::as_int);

    if let Some(prev_tid) = prev {
        let ok = state
            .root_mut()
            .child_str(THREADS)
            .child_int(prev_tid)
            .child_str(STATUS)
            .set_str("wait")
            .is_ok();
        if !ok {
            return false;
        }
    }

    if let Some(next_tid) = next {
        let ok = state
            .root_mut()
            .child_str(THREADS)
            .child_int(next_tid)
            .child_str(STATUS)
            .set_str("run")
            .is_ok();
        if !ok {
            return false;
        }

        if let Some(cpu) = event.field("cpu_id").and_then(FieldValue::as_int) {
            return state
                .root_mut()
                .child_str(CPUS)
                .child_int(cpu)
                .child_str(CURRENT_THREAD)
                .set(crate::state::Value::I64(next_tid))
                .is_ok();
        }
    }

    true
}

impl StateProvider for LinuxSchedProvider {
    fn on_init(
        &mut self,
        _state: &mut CurrentState<'_>,
        _trace_set: &TraceSet,
        registrar: &mut Registrar<'_>,
    ) {
        let seen = Rc::clone(&self.events_seen);
        registrar.register("lttng-kernel", "sched_switch", move |state, event| {
            seen.set(seen.get() + 1);
            on_sched_switch(state, event)
        });

        // syscall exit first: the entry pattern would otherwise claim it
        let seen = Rc::clone(&self.events_seen);
        let _ = registrar.register_regex("^lttng-kernel$", "^exit_syscall$", move |state, event| {
            seen.set(seen.get() + 1);
            let Some(tid) = event.field("tid").and_then(FieldValue::as_int) else {
                return true;
            };
            state
                .root_mut()
                .child_str(THREADS)
                .child_int(tid)
                .child_str(SYSCALL)
                .set_null()
                .is_ok()
        });

        let seen = Rc::clone(&self.events_seen);
        let _ = registrar.register_regex("^lttng-kernel$", "^sys_", move |state, event| {
            seen.set(seen.get() + 1);
            let Some(tid) = event.field("tid").and_then(FieldValue::as_int) else {
                return true;
            };
            state
                .root_mut()
                .child_str(THREADS)
                .child_int(tid)
                .child_str(SYSCALL)
                .set_str(&event.name)
                .is_ok()
        });
    }

    fn on_fini(&mut self, state: &mut CurrentState<'_>) {
        debug!(
            instance = self.instance.as_deref().unwrap_or("-"),
            events = self.events_seen.get(),
            live_nodes = state.node_count(),
            "linux provider done"
        );
    }
}
