//! Named runtime counters attached to operators.
//!
//! Counters are atomics and may be updated from any thread. Counters that
//! are only ever added to (or raised with `update_max`) are monotonic
//! non-decreasing, which holds even when an operator drives its children in
//! parallel and they update shared counters concurrently.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterUnit {
    Unit,
    Bytes,
    TimeNs,
}

#[derive(Debug)]
pub struct Counter {
    unit: CounterUnit,
    value: AtomicI64,
}

impl Counter {
    pub fn new(unit: CounterUnit) -> Self {
        Counter {
            unit,
            value: AtomicI64::new(0),
        }
    }

    pub fn unit(&self) -> CounterUnit {
        self.unit
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Raise the counter to `value` if it's greater than the current value.
    pub fn update_max(&self, value: i64) {
        self.value.fetch_max(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Adds the elapsed time in nanoseconds to a counter when dropped.
#[derive(Debug)]
pub struct ScopedTimer<'a> {
    counter: &'a Counter,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(counter: &'a Counter) -> Self {
        ScopedTimer {
            counter,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_nanos();
        self.counter.add(i64::try_from(elapsed).unwrap_or(i64::MAX));
    }
}

/// A named set of counters, with child profiles.
#[derive(Debug)]
pub struct RuntimeProfile {
    name: String,
    counters: Mutex<Vec<(String, Arc<Counter>)>>,
    info_strings: Mutex<Vec<(String, String)>>,
    children: Mutex<Vec<Arc<RuntimeProfile>>>,
}

impl RuntimeProfile {
    pub fn new(name: impl Into<String>) -> Self {
        RuntimeProfile {
            name: name.into(),
            counters: Mutex::new(Vec::new()),
            info_strings: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a counter, returning the existing counter if one with the
    /// same name was already registered.
    pub fn add_counter(&self, name: &str, unit: CounterUnit) -> Arc<Counter> {
        let mut counters = self.counters.lock();
        if let Some((_, counter)) = counters.iter().find(|(n, _)| n == name) {
            return counter.clone();
        }
        let counter = Arc::new(Counter::new(unit));
        counters.push((name.to_string(), counter.clone()));
        counter
    }

    pub fn get_counter(&self, name: &str) -> Option<Arc<Counter>> {
        let counters = self.counters.lock();
        counters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
    }

    pub fn add_info_string(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut infos = self.info_strings.lock();
        match infos.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => infos.push((key, value)),
        }
    }

    /// Attach a child profile. Attaching the same profile twice is a no-op.
    pub fn add_child(&self, child: Arc<RuntimeProfile>) {
        let mut children = self.children.lock();
        if children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            return;
        }
        children.push(child);
    }

    pub fn children(&self) -> Vec<Arc<RuntimeProfile>> {
        self.children.lock().clone()
    }

    /// Take a point-in-time copy of this profile and all children.
    pub fn snapshot(&self) -> ProfileSnapshot {
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(name, counter)| CounterSnapshot {
                name: name.clone(),
                unit: counter.unit(),
                value: counter.value(),
            })
            .collect();

        ProfileSnapshot {
            name: self.name.clone(),
            counters,
            info_strings: self.info_strings.lock().clone(),
            children: self.children().iter().map(|c| c.snapshot()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub name: String,
    pub unit: CounterUnit,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub name: String,
    pub counters: Vec<CounterSnapshot>,
    pub info_strings: Vec<(String, String)>,
    pub children: Vec<ProfileSnapshot>,
}

impl ProfileSnapshot {
    pub fn counter_value(&self, name: &str) -> Option<i64> {
        self.counters
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}:", "", self.name, indent = indent * 2)?;
        for (key, value) in &self.info_strings {
            writeln!(f, "{:indent$}  {key}: {value}", "", indent = indent * 2)?;
        }
        for counter in &self.counters {
            let value = match counter.unit {
                CounterUnit::Unit => counter.value.to_string(),
                CounterUnit::Bytes => format!("{} B", counter.value),
                CounterUnit::TimeNs => format!("{} ns", counter.value),
            };
            writeln!(f, "{:indent$}  - {}: {value}", "", counter.name, indent = indent * 2)?;
        }
        for child in &self.children {
            child.fmt_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ProfileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn add_counter_idempotent() {
        let profile = RuntimeProfile::new("node");
        let c1 = profile.add_counter("RowsReturned", CounterUnit::Unit);
        let c2 = profile.add_counter("RowsReturned", CounterUnit::Unit);
        c1.add(3);
        assert_eq!(3, c2.value());
        assert_eq!(1, profile.snapshot().counters.len());
    }

    #[test]
    fn concurrent_increments() {
        let profile = RuntimeProfile::new("node");
        let counter = profile.add_counter("RowsReturned", CounterUnit::Unit);

        thread::scope(|s| {
            for _ in 0..4 {
                let counter = counter.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        counter.add(1);
                    }
                });
            }
        });

        assert_eq!(4000, counter.value());
    }

    #[test]
    fn update_max_only_raises() {
        let counter = Counter::new(CounterUnit::Bytes);
        counter.update_max(10);
        counter.update_max(4);
        assert_eq!(10, counter.value());
    }

    #[test]
    fn snapshot_includes_children() {
        let parent = RuntimeProfile::new("parent");
        let child = Arc::new(RuntimeProfile::new("child"));
        child.add_counter("RowsReturned", CounterUnit::Unit).add(7);
        parent.add_child(child.clone());
        parent.add_child(child);
        parent.add_info_string("Codegen", "enabled");

        let snapshot = parent.snapshot();
        assert_eq!(1, snapshot.children.len());
        assert_eq!(Some(7), snapshot.children[0].counter_value("RowsReturned"));

        let out = snapshot.to_string();
        assert_eq!(
            "parent:\n  Codegen: enabled\n  child:\n    - RowsReturned: 7\n",
            out
        );
    }
}
