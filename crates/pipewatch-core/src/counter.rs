use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic event counter shared between pipeline workers.
///
/// Workers bump it on the data path; readers only ever `load`.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, by: u64) {
        self.0.fetch_add(by, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::new();
        assert_eq!(c.value(), 0);
        c.increment(3);
        c.increment(2);
        assert_eq!(c.value(), 5);
    }
}
