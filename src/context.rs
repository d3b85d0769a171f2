//! The simulation `Context`: clock, plan queue, and module data
//!
//! The `Context` owns the simulated clock and a queue of plans - callbacks
//! scheduled to execute at a future simulated time. Execution is
//! single-threaded, cooperative, and non-preemptive: `execute` runs one
//! callback at a time to completion, so module data is mutated only from
//! within scheduled callbacks and never concurrently. Callbacks scheduled
//! for the same time execute in the order they were scheduled (FIFO).
//!
//! Modules store their data in the `Context` through data plugins defined
//! with [`define_data_plugin!`], keyed by type, so that the module and
//! other modules can access it.

use std::{
    any::{Any, TypeId},
    collections::{HashMap, VecDeque},
};

use crate::log::trace;
use crate::plan::{PlanId, Queue};

pub trait DataPlugin: Any {
    type DataContainer: 'static;

    fn create_data_container() -> Self::DataContainer;
}

#[macro_export]
macro_rules! define_data_plugin {
    ($vis:vis $plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        $vis struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context);

pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::new(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedule a callback to execute at the given simulated time
    ///
    /// Returns a `PlanId` that can be used to cancel the plan before it
    /// fires.
    ///
    /// # Panics
    ///
    /// Panics if the time is NaN, infinite, or in the simulated past;
    /// scheduling backwards in time is an invariant violation, not a
    /// recoverable condition.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Invalid plan time"
        );
        self.plan_queue.add_plan(time, Box::new(callback))
    }

    /// Schedule a callback to execute at `start` and every `interval` after
    /// that until shutdown
    ///
    /// This is the explicit registration point for recurring events such as
    /// daily tallies; the chain re-arms itself after each execution.
    ///
    /// # Panics
    ///
    /// Panics if the interval is not strictly positive, or if `start` is
    /// invalid (see [`Context::add_plan`]).
    pub fn add_periodic_plan(
        &mut self,
        start: f64,
        interval: f64,
        callback: impl FnMut(&mut Context) + 'static,
    ) {
        assert!(
            interval.is_finite() && interval > 0.0,
            "Invalid periodic plan interval"
        );
        schedule_periodic(self, start, interval, Box::new(callback));
    }

    /// Cancel a previously scheduled plan
    ///
    /// # Panics
    ///
    /// Panics if the plan was already cancelled or has already executed.
    pub fn cancel_plan(&mut self, id: PlanId) {
        self.plan_queue.cancel_plan(id);
    }

    /// Queue a callback to execute at the current time, before the next
    /// plan
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    fn add_plugin<T: DataPlugin>(&mut self) {
        self.data_plugins
            .insert(TypeId::of::<T>(), Box::new(T::create_data_container()));
    }

    /// Get a mutable reference to a plugin's data container, creating it if
    /// it does not exist yet
    pub fn get_data_container_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        let type_id = &TypeId::of::<T>();
        if !self.data_plugins.contains_key(type_id) {
            self.add_plugin::<T>();
        }
        self.data_plugins
            .get_mut(type_id)
            .unwrap()
            .downcast_mut::<T::DataContainer>()
            .unwrap()
    }

    /// Get a reference to a plugin's data container if it has been created
    pub fn get_data_container<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Request that `execute` stop before running any further callbacks
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Run the simulation until the plan queue drains or `shutdown` is
    /// called
    pub fn execute(&mut self) {
        // Start plan loop
        loop {
            if self.shutdown_requested {
                break;
            }

            // If there is a callback, run it.
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            // There aren't any callbacks, so look at the first plan.
            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                (plan.data)(self);
            } else {
                // OK, there aren't any plans, so we're done.
                break;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_periodic(
    context: &mut Context,
    time: f64,
    interval: f64,
    mut callback: Box<dyn FnMut(&mut Context)>,
) {
    context.add_plan(time, move |context| {
        callback(context);
        if !context.shutdown_requested {
            let next = context.current_time + interval;
            schedule_periodic(context, next, interval, callback);
        }
    });
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::plan::PlanId;

    define_data_plugin!(ComponentA, Vec<u32>, vec![]);

    fn add_plan(context: &mut Context, time: f64, value: u32) -> PlanId {
        context.add_plan(time, move |context| {
            context.get_data_container_mut(ComponentA).push(value);
        })
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn negative_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, -1.0, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn infinite_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::INFINITY, 0);
    }

    #[test]
    #[should_panic(expected = "Invalid plan time")]
    fn nan_plan_time() {
        let mut context = Context::new();
        add_plan(&mut context, f64::NAN, 0);
    }

    #[test]
    fn empty_context() {
        let mut context = Context::new();
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
    }

    #[test]
    fn timed_plan_only() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1]);
    }

    #[test]
    fn callback_only() {
        let mut context = Context::new();
        context.queue_callback(|context| {
            context.get_data_container_mut(ComponentA).push(1);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 0.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1]);
    }

    #[test]
    fn callback_before_timed_plan() {
        let mut context = Context::new();
        context.queue_callback(|context| {
            context.get_data_container_mut(ComponentA).push(1);
        });
        add_plan(&mut context, 1.0, 2);
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1, 2]);
    }

    #[test]
    fn callback_adds_callback_and_timed_plan() {
        let mut context = Context::new();
        context.queue_callback(|context| {
            context.get_data_container_mut(ComponentA).push(1);
            add_plan(context, 1.0, 2);
            context.queue_callback(|context| {
                context.get_data_container_mut(ComponentA).push(4);
            });
            context.get_data_container_mut(ComponentA).push(3);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1, 3, 4, 2]);
    }

    #[test]
    fn cancel_plan() {
        let mut context = Context::new();
        let to_cancel = add_plan(&mut context, 2.0, 1);
        context.add_plan(1.0, move |context| {
            context.cancel_plan(to_cancel);
        });
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), Vec::<u32>::new());
    }

    #[test]
    fn plans_at_same_time_fire_in_order() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        add_plan(&mut context, 1.0, 2);
        context.execute();
        assert_eq!(context.get_current_time(), 1.0);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1, 2]);
    }

    #[test]
    fn periodic_plan_until_shutdown() {
        let mut context = Context::new();
        context.add_periodic_plan(1.0, 1.0, |context| {
            let time = context.get_current_time();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            context.get_data_container_mut(ComponentA).push(time as u32);
        });
        context.add_plan(3.5, Context::shutdown);
        context.execute();
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1, 2, 3]);
    }

    #[test]
    fn shutdown_stops_pending_plans() {
        let mut context = Context::new();
        add_plan(&mut context, 1.0, 1);
        context.add_plan(1.5, Context::shutdown);
        add_plan(&mut context, 2.0, 2);
        context.execute();
        assert_eq!(context.get_current_time(), 1.5);
        assert_eq!(*context.get_data_container_mut(ComponentA), vec![1]);
    }
}
