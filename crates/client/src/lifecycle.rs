//! Ordered startup and teardown hooks.
//!
//! Initializers and reloaders run in registration order. Finalizers and
//! shutdown handlers run in reverse, so a module registered later (which
//! may depend on earlier ones) is torn down first. Initializers,
//! finalizers and shutdown handlers run at most once; reloaders stay
//! registered.

use tracing::debug;

type Hook = Box<dyn FnMut() + Send>;

struct Registered {
    name: String,
    hook: Hook,
}

#[derive(Default)]
pub struct LifecycleRegistry {
    initializers: Vec<Registered>,
    reloaders: Vec<Registered>,
    finalizers: Vec<Registered>,
    shutdown_handlers: Vec<Registered>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_initializer(&mut self, name: &str, hook: impl FnMut() + Send + 'static) {
        self.initializers.push(Registered::new(name, hook));
    }

    pub fn register_reloader(&mut self, name: &str, hook: impl FnMut() + Send + 'static) {
        self.reloaders.push(Registered::new(name, hook));
    }

    pub fn register_finalizer(&mut self, name: &str, hook: impl FnMut() + Send + 'static) {
        self.finalizers.push(Registered::new(name, hook));
    }

    pub fn register_shutdown_handler(&mut self, name: &str, hook: impl FnMut() + Send + 'static) {
        self.shutdown_handlers.push(Registered::new(name, hook));
    }

    pub fn run_initializers(&mut self) {
        for mut entry in std::mem::take(&mut self.initializers) {
            debug!(name = %entry.name, "Running initializer");
            (entry.hook)();
        }
    }

    pub fn run_reloaders(&mut self) {
        for entry in self.reloaders.iter_mut() {
            debug!(name = %entry.name, "Running reloader");
            (entry.hook)();
        }
    }

    pub fn run_finalizers(&mut self) {
        for mut entry in std::mem::take(&mut self.finalizers).into_iter().rev() {
            debug!(name = %entry.name, "Running finalizer");
            (entry.hook)();
        }
    }

    pub fn run_shutdown_handlers(&mut self) {
        for mut entry in std::mem::take(&mut self.shutdown_handlers).into_iter().rev() {
            debug!(name = %entry.name, "Running shutdown handler");
            (entry.hook)();
        }
    }
}

impl Registered {
    fn new(name: &str, hook: impl FnMut() + Send + 'static) -> Self {
        Self {
            name: name.to_string(),
            hook: Box::new(hook),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnMut() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &str| -> Box<dyn FnMut() + Send> {
            let log = log_clone.clone();
            let label = label.to_string();
            Box::new(move || log.lock().unwrap().push(label.clone()))
        };
        (log, make)
    }

    #[test]
    fn test_initializers_run_in_order_once() {
        let (log, make) = recorder();
        let mut registry = LifecycleRegistry::new();
        registry.register_initializer("a", make("a"));
        registry.register_initializer("b", make("b"));

        registry.run_initializers();
        registry.run_initializers();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_finalizers_and_shutdown_run_in_reverse() {
        let (log, make) = recorder();
        let mut registry = LifecycleRegistry::new();
        registry.register_finalizer("first", make("fin-first"));
        registry.register_finalizer("second", make("fin-second"));
        registry.register_shutdown_handler("first", make("sd-first"));
        registry.register_shutdown_handler("second", make("sd-second"));

        registry.run_shutdown_handlers();
        registry.run_finalizers();
        registry.run_finalizers();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["sd-second", "sd-first", "fin-second", "fin-first"]
        );
    }

    #[test]
    fn test_reloaders_stay_registered() {
        let (log, make) = recorder();
        let mut registry = LifecycleRegistry::new();
        registry.register_reloader("config", make("reload"));

        registry.run_reloaders();
        registry.run_reloaders();

        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
