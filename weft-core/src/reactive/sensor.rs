//! Sensor Implementation
//!
//! A Sensor is a source whose value is produced by an external callback —
//! a subscription, a timer, a device — activated only while the graph is
//! actually watching it.
//!
//! # Ref-counted activation
//!
//! The sensor counts watchers (sinks holding an edge to it), not a
//! boolean. The start callback runs only on the 0 -> 1 transition and the
//! stop callback (returned by start) only on the 1 -> 0 transition, so any
//! number of concurrent watchers share one activation. Watchers disappear
//! when a sink is disposed or when its latest run stopped reading the
//! sensor (edge trimming).
//!
//! # The setter
//!
//! The start callback receives a [`SensorSetter`]. Values pushed through
//! it pass the node's equality check exactly like a state write; pushes
//! while the sensor is inactive are dropped, and reads before activation
//! return the supplied default. [`Sensor::volatile`] opts out of the
//! equality check for sources whose identity never changes but whose
//! observable content does.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::graph::node::{Node, NodeId, NodeKind, SensorHooks};
use crate::reactive::{downcast, erase, erase_equals, runtime};

/// A lazily activated external source.
///
/// # Example
///
/// ```rust,ignore
/// let ticks = Sensor::new(0_u64, |setter| {
///     let timer = Timer::every(Duration::from_secs(1), move |n| setter.set(n));
///     move || timer.stop()
/// });
/// ```
pub struct Sensor<T: 'static> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

/// Setter handed to a sensor's start callback.
pub struct SensorSetter<T: 'static> {
    id: NodeId,
    _marker: PhantomData<fn(T)>,
}

impl<T: Clone + PartialEq + 'static> Sensor<T> {
    /// Create a sensor. `start` runs on the first watcher and returns the
    /// stop hook that runs when the last watcher is gone.
    pub fn new<S>(default: T, start: impl Fn(SensorSetter<T>) -> S + 'static) -> Self
    where
        S: FnOnce() + 'static,
    {
        Self::with_equals(default, start, |a, b| a == b)
    }

    /// Create a sensor whose pushes always count as changes, bypassing the
    /// equality check. Useful for mutable-object sources whose identity
    /// never changes.
    pub fn volatile<S>(default: T, start: impl Fn(SensorSetter<T>) -> S + 'static) -> Self
    where
        S: FnOnce() + 'static,
    {
        Self::with_equals(default, start, |_, _| false)
    }
}

impl<T: Clone + 'static> Sensor<T> {
    /// Create a sensor with a custom equality function for pushed values.
    pub fn with_equals<S>(
        default: T,
        start: impl Fn(SensorSetter<T>) -> S + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self
    where
        S: FnOnce() + 'static,
    {
        let mut node = Node::new(NodeKind::Sensor);
        node.value = Some(erase(default));
        node.equals = Some(erase_equals(equals));
        node.sensor = Some(SensorHooks {
            start: Rc::new(move |id| {
                let setter = SensorSetter {
                    id,
                    _marker: PhantomData,
                };
                Box::new(start(setter))
            }),
            stop: None,
            active: false,
        });
        Self {
            id: runtime::create_node(node, None),
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value. Inside a tracked computation this makes the
    /// caller a watcher, activating the sensor if it is the first.
    pub fn get(&self) -> T {
        match runtime::read(self.id) {
            Ok(value) => downcast(value),
            Err(_) => panic!("sensor read after its owner was disposed"),
        }
    }

    /// Get the current value without becoming a watcher.
    pub fn get_untracked(&self) -> T {
        match runtime::peek(self.id) {
            Ok(value) => downcast(value),
            Err(_) => panic!("sensor read after its owner was disposed"),
        }
    }
}

impl<T: Clone + 'static> SensorSetter<T> {
    /// Push a value produced by the external resource. Applies the node's
    /// equality check like a state write; dropped while the sensor is
    /// inactive.
    pub fn set(&self, value: T) {
        let active = runtime::with(|rt| {
            rt.store
                .get(self.id)
                .and_then(|n| n.sensor.as_ref())
                .is_some_and(|hooks| hooks.active)
        });
        if !active {
            return;
        }
        let _ = runtime::write(self.id, erase(value));
    }
}

impl<T: 'static> Clone for Sensor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Sensor<T> {}

impl<T: 'static> Clone for SensorSetter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for SensorSetter<T> {}
