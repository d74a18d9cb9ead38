//! Shared queue of trace slots (§4.6). One pump instance is reused across
//! every phase of every wave; `init` reseeds it, `next_trace` is the only
//! thing workers call in their drain loop.

use std::sync::Mutex;

#[derive(Default)]
pub struct WorkPump {
    /// `(next, end)`, mutated under a single lock (§5).
    bounds: Mutex<(usize, usize)>,
}

impl WorkPump {
    pub fn new() -> WorkPump {
        WorkPump {
            bounds: Mutex::new((0, 0)),
        }
    }

    /// Seeds the pump with the half-open range `[start, start + count)`
    /// over the global trace-slot array.
    pub fn init(&self, start: usize, count: usize) {
        let mut bounds = self.bounds.lock().unwrap();
        *bounds = (start, start + count);
    }

    /// Atomically takes the next slot index, or `None` once the range is
    /// exhausted.
    pub fn next_trace(&self) -> Option<usize> {
        let mut bounds = self.bounds.lock().unwrap();
        let (next, end) = *bounds;
        if next < end {
            bounds.0 = next + 1;
            Some(next)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn hands_out_each_slot_exactly_once() {
        let pump = Arc::new(WorkPump::new());
        pump.init(10, 5);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pump = Arc::clone(&pump);
            handles.push(thread::spawn(move || {
                let mut taken = Vec::new();
                while let Some(slot) = pump.next_trace() {
                    taken.push(slot);
                }
                taken
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        assert_eq!(all.len(), 5);
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(unique, (10..15).collect());
    }

    #[test]
    fn empty_range_yields_nothing() {
        let pump = WorkPump::new();
        pump.init(0, 0);
        assert!(pump.next_trace().is_none());
    }
}
