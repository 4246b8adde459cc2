//! Deferred dispatch from stack events to script callbacks
//!
//! `DispatchBridge::notify` may be called from any thread, including the
//! stack's own event context. It never calls into script code: it resolves
//! the subscriber and pushes a `PendingDispatch` onto a bounded queue. The
//! single cooperative script task owns the `CooperativeRunner` and is the
//! only place callbacks run.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::error::BridgeError;
use crate::registry::CallbackRegistry;
use crate::script::{CallbackRef, ScriptValue};

/// Event-specific data delivered with a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A state name such as `"poweredOn"`.
    State(String),
    /// A stack result code; 0 is success.
    ResultCode(i32),
}

impl EventPayload {
    /// Convert to the single argument the callback receives.
    pub fn to_script_value(&self) -> ScriptValue {
        match self {
            EventPayload::State(name) => ScriptValue::String(name.clone()),
            // the engine takes an unsigned argument; negative codes wrap
            EventPayload::ResultCode(code) => ScriptValue::UInt32(*code as u32),
        }
    }
}

/// Outcome of a successful `notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued,
    /// Nobody subscribed; the event was dropped.
    NoSubscriber,
}

/// One callback invocation waiting for the script task.
pub struct PendingDispatch {
    event_type: String,
    handler: CallbackRef,
    payload: EventPayload,
}

impl PendingDispatch {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    fn invoke(self) {
        let arg = self.payload.to_script_value();
        // return values are released with the dispatch
        if let Err(e) = self.handler.call(arg) {
            log::warn!("Callback for '{}' raised {}", self.event_type, e);
        }
    }
}

/// Create a connected bridge/runner pair sharing `registry`.
///
/// `queue_capacity` must be at least 1.
pub fn dispatch_channel(
    registry: Arc<CallbackRegistry>,
    queue_capacity: usize,
) -> Result<(DispatchBridge, CooperativeRunner), BridgeError> {
    if queue_capacity == 0 {
        return Err(BridgeError::InvalidArgument(
            "dispatch queue capacity must be at least 1".into(),
        ));
    }
    let (tx, rx) = mpsc::channel(queue_capacity);
    Ok((DispatchBridge { registry, tx }, CooperativeRunner { rx }))
}

/// Producer side: turns event notifications into queued dispatches.
#[derive(Clone)]
pub struct DispatchBridge {
    registry: Arc<CallbackRegistry>,
    tx: mpsc::Sender<PendingDispatch>,
}

impl DispatchBridge {
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Schedule the callback subscribed to `event_type`, if any.
    ///
    /// Never blocks. A full or closed queue is reported as an allocation
    /// failure; a missing subscriber is not an error.
    pub fn notify(
        &self,
        event_type: &str,
        payload: EventPayload,
    ) -> Result<Dispatch, BridgeError> {
        let entry = match self.registry.lookup_by_prefix(event_type) {
            Some(entry) => entry,
            None => {
                log::debug!("No subscriber for '{}', dropping {:?}", event_type, payload);
                return Ok(Dispatch::NoSubscriber);
            }
        };

        let pending = PendingDispatch {
            event_type: entry.event_type().to_string(),
            handler: Arc::clone(entry.handler()),
            payload,
        };

        self.tx.try_send(pending).map_err(|e| match e {
            TrySendError::Full(p) => {
                log::warn!("Dispatch queue full, lost '{}'", p.event_type);
                BridgeError::Allocation("dispatch queue full".into())
            }
            TrySendError::Closed(_) => BridgeError::Allocation("dispatch queue closed".into()),
        })?;

        log::trace!("Queued dispatch for '{}'", entry.event_type());
        Ok(Dispatch::Queued)
    }
}

/// Consumer side, owned by the cooperative script task.
pub struct CooperativeRunner {
    rx: mpsc::Receiver<PendingDispatch>,
}

impl CooperativeRunner {
    /// Run the next queued callback. Returns false when nothing was queued.
    pub fn run_one(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(pending) => {
                pending.invoke();
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Run queued callbacks until the queue is empty.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.run_one() {
            count += 1;
        }
        count
    }

    /// Run callbacks as they arrive until every bridge handle is dropped.
    ///
    /// Drive this from a current-thread runtime or a `LocalSet` so all
    /// callbacks share one thread.
    pub async fn run(mut self) {
        while let Some(pending) = self.rx.recv().await {
            pending.invoke();
        }
        log::debug!("Dispatch queue closed, runner exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use crate::script::FnCallback;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<(String, ScriptValue)>>>;

    fn recorder(name: &str, log: &Log) -> CallbackRef {
        let name = name.to_string();
        let log = Arc::clone(log);
        FnCallback::new(move |arg| {
            log.lock().unwrap().push((name.clone(), arg));
            Ok(ScriptValue::Undefined)
        })
    }

    fn setup(capacity: usize) -> (DispatchBridge, CooperativeRunner) {
        let registry = Arc::new(CallbackRegistry::new(8, 19));
        dispatch_channel(registry, capacity).unwrap()
    }

    #[test]
    fn test_zero_capacity_queue_is_rejected() {
        let registry = Arc::new(CallbackRegistry::new(8, 19));
        assert!(matches!(
            dispatch_channel(Arc::clone(&registry), 0),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(dispatch_channel(registry, 1).is_ok());
    }

    #[test]
    fn test_each_event_invokes_its_handler_once() {
        let (bridge, mut runner) = setup(8);
        let log: Log = Arc::default();
        for name in ["alpha", "bravo", "charlie"] {
            bridge.registry().register(name, recorder(name, &log)).unwrap();
        }

        bridge.notify("alpha", EventPayload::ResultCode(1)).unwrap();
        bridge.notify("bravo", EventPayload::ResultCode(2)).unwrap();
        bridge
            .notify("charlie", EventPayload::State("on".into()))
            .unwrap();

        // Nothing runs until the script task drains the queue.
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(runner.drain(), 3);

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                ("alpha".to_string(), ScriptValue::UInt32(1)),
                ("bravo".to_string(), ScriptValue::UInt32(2)),
                ("charlie".to_string(), ScriptValue::String("on".into())),
            ]
        );
    }

    #[test]
    fn test_unregistered_event_is_dropped() {
        let (bridge, mut runner) = setup(8);
        let outcome = bridge
            .notify("stateChange", EventPayload::State("poweredOn".into()))
            .unwrap();
        assert_eq!(outcome, Dispatch::NoSubscriber);
        assert_eq!(runner.drain(), 0);
    }

    #[test]
    fn test_full_queue_is_allocation_error() {
        let (bridge, mut runner) = setup(1);
        let log: Log = Arc::default();
        bridge.registry().register("e", recorder("e", &log)).unwrap();

        bridge.notify("e", EventPayload::ResultCode(0)).unwrap();
        let result = bridge.notify("e", EventPayload::ResultCode(1));
        assert!(matches!(result, Err(BridgeError::Allocation(_))));

        assert_eq!(runner.drain(), 1);
        assert_eq!(log.lock().unwrap()[0].1, ScriptValue::UInt32(0));
    }

    #[test]
    fn test_closed_queue_is_allocation_error() {
        let (bridge, runner) = setup(4);
        let log: Log = Arc::default();
        bridge.registry().register("e", recorder("e", &log)).unwrap();
        drop(runner);
        assert!(matches!(
            bridge.notify("e", EventPayload::ResultCode(0)),
            Err(BridgeError::Allocation(_))
        ));
    }

    #[test]
    fn test_callback_error_does_not_stop_runner() {
        let (bridge, mut runner) = setup(4);
        let log: Log = Arc::default();
        bridge
            .registry()
            .register("bad", FnCallback::new(|_| Err(ScriptError::error("nope"))))
            .unwrap();
        bridge.registry().register("good", recorder("good", &log)).unwrap();

        bridge.notify("bad", EventPayload::ResultCode(0)).unwrap();
        bridge.notify("good", EventPayload::ResultCode(0)).unwrap();
        assert_eq!(runner.drain(), 2);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_callbacks_run_on_the_draining_thread() {
        let (bridge, mut runner) = setup(4);
        let seen = Arc::new(Mutex::new(None));
        let seen_cb = Arc::clone(&seen);
        bridge
            .registry()
            .register(
                "tick",
                FnCallback::new(move |_| {
                    *seen_cb.lock().unwrap() = Some(std::thread::current().id());
                    Ok(ScriptValue::Undefined)
                }),
            )
            .unwrap();

        let producer = bridge.clone();
        let notifier_id = std::thread::spawn(move || {
            producer.notify("tick", EventPayload::ResultCode(0)).unwrap();
            std::thread::current().id()
        })
        .join()
        .unwrap();

        assert!(seen.lock().unwrap().is_none());
        assert_eq!(runner.drain(), 1);
        let ran_on = seen.lock().unwrap().unwrap();
        assert_eq!(ran_on, std::thread::current().id());
        assert_ne!(ran_on, notifier_id);
    }

    #[test]
    fn test_negative_result_code_wraps() {
        assert_eq!(
            EventPayload::ResultCode(-5).to_script_value(),
            ScriptValue::UInt32(u32::MAX - 4)
        );
    }

    #[tokio::test]
    async fn test_run_exits_when_bridges_dropped() {
        let (bridge, runner) = setup(4);
        let log: Log = Arc::default();
        bridge.registry().register("e", recorder("e", &log)).unwrap();
        bridge.notify("e", EventPayload::ResultCode(7)).unwrap();
        drop(bridge);

        runner.run().await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
