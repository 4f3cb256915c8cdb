// PairVM Garbage Collector
// Stop-the-world mark-and-sweep over the heap list
//
// A collection:
// 1. Takes the roots: every operand stack slot and every valid memory slot
// 2. Marks everything reachable from them using an explicit work-list, so
//    long reference chains never grow the native call stack
// 3. Sweeps the heap list once, unlinking and releasing unmarked objects and
//    clearing the mark on survivors
// 4. Sets the next trigger point to `live * growth + floor`

use std::time::{Duration, Instant};

use tracing::debug;

use super::heap::Heap;
use super::object::HeapObject;
use super::stack::{MemoryBank, OperandStack};
use super::value::{ObjRef, Value};

/// Collector counters, reported but never consulted by the collector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcStats {
    /// Number of collections run
    pub collections: u64,
    /// Objects ever allocated
    pub objects_allocated: u64,
    /// Objects reclaimed by sweeps
    pub objects_freed: u64,
    /// Object record bytes ever allocated
    pub bytes_allocated: u64,
    /// Highest live object count seen
    pub peak_live: usize,
    pub total_gc_time: Duration,
    pub max_pause: Duration,
    /// Shortest pause, once a collection has run
    pub min_pause: Option<Duration>,
}

impl GcStats {
    pub(crate) fn record_allocation(&mut self, live: usize) {
        self.objects_allocated += 1;
        self.bytes_allocated += std::mem::size_of::<HeapObject>() as u64;
        self.peak_live = self.peak_live.max(live);
    }

    fn record_collection(&mut self, report: &CollectionReport) {
        self.collections += 1;
        self.objects_freed += report.freed as u64;
        self.total_gc_time += report.pause;
        self.max_pause = self.max_pause.max(report.pause);
        self.min_pause = Some(match self.min_pause {
            Some(min) => min.min(report.pause),
            None => report.pause,
        });
    }

    pub fn average_pause(&self) -> Duration {
        if self.collections == 0 {
            Duration::ZERO
        } else {
            self.total_gc_time / self.collections as u32
        }
    }
}

/// Outcome of one collection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    /// Root values enumerated (integers included)
    pub roots: usize,
    pub marked: usize,
    pub freed: usize,
    pub live_after: usize,
    pub threshold_after: usize,
    pub pause: Duration,
}

/// Every operand stack slot from the bottom to the stack pointer, then every
/// valid memory slot.
pub fn enumerate_roots(stack: &OperandStack, memory: &MemoryBank) -> Vec<Value> {
    let mut roots = Vec::with_capacity(stack.len());
    roots.extend_from_slice(stack.as_slice());
    roots.extend(memory.valid_values());
    roots
}

impl Heap {
    /// Run a full collection against `roots`
    pub fn collect(&mut self, roots: &[Value]) -> CollectionReport {
        let start = Instant::now();

        let marked = self.mark(roots);
        let freed = self.sweep();

        self.threshold = self
            .live
            .saturating_mul(self.threshold_growth)
            .saturating_add(self.threshold_floor);

        let report = CollectionReport {
            roots: roots.len(),
            marked,
            freed,
            live_after: self.live,
            threshold_after: self.threshold,
            pause: start.elapsed(),
        };
        self.stats.record_collection(&report);

        debug!(
            roots = report.roots,
            marked = report.marked,
            freed = report.freed,
            live = report.live_after,
            threshold = report.threshold_after,
            pause_us = report.pause.as_micros() as u64,
            "collection"
        );
        report
    }

    /// Mark phase. Returns the number of objects newly marked.
    fn mark(&mut self, roots: &[Value]) -> usize {
        let mut worklist: Vec<ObjRef> = roots.iter().filter_map(Value::as_obj).collect();
        let mut marked = 0;

        while let Some(handle) = worklist.pop() {
            let Some(object) = self.get_mut(handle) else {
                continue;
            };
            // Already visited: this is what terminates cycles
            if object.marked {
                continue;
            }
            object.marked = true;
            marked += 1;
            worklist.extend(object.kind.references());
        }

        marked
    }

    /// Sweep phase. One pass over the heap list; returns the number freed.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut previous: Option<ObjRef> = None;
        let mut cursor = self.head;

        while let Some(handle) = cursor {
            let Some(object) = self.get_mut(handle) else {
                break;
            };
            let next = object.next;

            if object.marked {
                object.marked = false;
                previous = Some(handle);
            } else {
                match previous {
                    None => self.head = next,
                    Some(prev) => {
                        if let Some(prev_object) = self.get_mut(prev) {
                            prev_object.next = next;
                        }
                    }
                }
                self.release(handle);
                freed += 1;
            }

            cursor = next;
        }

        freed
    }
}

/// One-line summary printed when GC stats are enabled
pub fn format_collection(stats: &GcStats, report: &CollectionReport) -> String {
    format!(
        "[GC] collection #{}: freed={}, live={}, threshold={}, pause={:?}",
        stats.collections, report.freed, report.live_after, report.threshold_after, report.pause
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::ObjectKind;

    fn obj(handle: ObjRef) -> Value {
        Value::Obj(handle)
    }

    fn list_len(heap: &Heap) -> usize {
        heap.iter().count()
    }

    #[test]
    fn test_rooted_pair_survives() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(10), Value::Int(20)).unwrap();
        assert_eq!(heap.live_count(), 1);

        let report = heap.collect(&[obj(a)]);
        assert_eq!(report.freed, 0);
        assert_eq!(heap.live_count(), 1);
        assert_eq!(heap.pair(a), Some((Value::Int(10), Value::Int(20))));
    }

    #[test]
    fn test_unrooted_pair_is_freed() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(10), Value::Int(20)).unwrap();

        let report = heap.collect(&[]);
        assert_eq!(report.freed, 1);
        assert_eq!(heap.live_count(), 0);
        assert!(!heap.contains(a));
        assert_eq!(list_len(&heap), 0);
    }

    #[test]
    fn test_transitive_reachability() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(10), Value::Int(20)).unwrap();
        let b = heap.allocate_pair(obj(a), Value::Int(30)).unwrap();

        heap.collect(&[obj(b)]);
        assert_eq!(heap.live_count(), 2);
        assert!(heap.contains(a));
        assert!(heap.contains(b));
    }

    #[test]
    fn test_live_cycle_survives_and_dead_cycle_is_freed() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(10), Value::Int(0)).unwrap();
        let b = heap.allocate_pair(obj(a), Value::Int(20)).unwrap();
        if let Some(HeapObject {
            kind: ObjectKind::Pair { right, .. },
            ..
        }) = heap.get_mut(a)
        {
            *right = obj(b);
        }

        let c = heap.allocate_pair(Value::Int(0), Value::Int(0)).unwrap();
        let d = heap.allocate_pair(obj(c), Value::Int(0)).unwrap();
        if let Some(HeapObject {
            kind: ObjectKind::Pair { right, .. },
            ..
        }) = heap.get_mut(c)
        {
            *right = obj(d);
        }

        let report = heap.collect(&[obj(a)]);
        assert_eq!(report.freed, 2);
        assert_eq!(heap.live_count(), 2);
        assert!(heap.contains(a) && heap.contains(b));
        assert!(!heap.contains(c) && !heap.contains(d));
        assert_eq!(heap.pair(a), Some((Value::Int(10), obj(b))));
    }

    #[test]
    fn test_self_reference() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(1), Value::Int(0)).unwrap();
        if let Some(object) = heap.get_mut(a) {
            object.kind = ObjectKind::Pair {
                left: obj(a),
                right: obj(a),
            };
        }
        heap.collect(&[obj(a)]);
        assert_eq!(heap.live_count(), 1);
        heap.collect(&[]);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_closure_edges_are_traced() {
        let mut heap = Heap::default();
        let f = heap.allocate_function(100, 1).unwrap();
        let env = heap.allocate_pair(Value::Int(1), Value::Int(2)).unwrap();
        let closure = heap.allocate_closure(Some(f), Some(env)).unwrap();
        let stray = heap.allocate_function(7, 0).unwrap();
        let empty = heap.allocate_closure(None, None).unwrap();

        heap.collect(&[obj(closure), obj(empty)]);
        assert_eq!(heap.live_count(), 4);
        assert!(heap.contains(f) && heap.contains(env));
        assert!(!heap.contains(stray));
    }

    #[test]
    fn test_second_collection_is_idempotent() {
        let mut heap = Heap::default();
        let a = heap.allocate_pair(Value::Int(1), Value::Int(2)).unwrap();
        heap.allocate_pair(obj(a), Value::Int(3)).unwrap();
        heap.allocate_pair(Value::Int(4), Value::Int(5)).unwrap();

        let roots = [obj(a)];
        let first = heap.collect(&roots);
        let second = heap.collect(&roots);
        assert_eq!(first.live_after, 1);
        assert_eq!(second.live_after, 1);
        assert_eq!(second.freed, 0);
        assert!(heap.iter().all(|(_, object)| !object.is_marked()));
    }

    #[test]
    fn test_sweep_unlinks_head_middle_and_tail() {
        let mut heap = Heap::default();
        let handles: Vec<ObjRef> = (0..6)
            .map(|i| heap.allocate_pair(Value::Int(i), Value::Int(i)).unwrap())
            .collect();
        // list order is 5,4,3,2,1,0; keep 4, 2 and 1
        let roots = [obj(handles[4]), obj(handles[2]), obj(handles[1])];
        heap.collect(&roots);

        let order: Vec<ObjRef> = heap.iter().map(|(h, _)| h).collect();
        assert_eq!(order, vec![handles[4], handles[2], handles[1]]);
        assert_eq!(heap.live_count(), list_len(&heap));
    }

    #[test]
    fn test_deep_chain_survives() {
        let mut heap = Heap::default();
        let mut head = Value::Int(0);
        for i in 0..100_000 {
            head = obj(heap.allocate_pair(Value::Int(i), head).unwrap());
        }
        heap.allocate_pair(Value::Int(-1), Value::Int(-1)).unwrap();

        let report = heap.collect(&[head]);
        assert_eq!(report.marked, 100_000);
        assert_eq!(report.freed, 1);
        assert_eq!(heap.live_count(), 100_000);
    }

    #[test]
    fn test_threshold_tracks_live_set() {
        let mut heap = Heap::default();
        assert_eq!(heap.threshold(), 100);
        let keep: Vec<Value> = (0..30)
            .map(|i| obj(heap.allocate_pair(Value::Int(i), Value::Int(i)).unwrap()))
            .collect();
        for i in 0..70 {
            heap.allocate_pair(Value::Int(i), Value::Int(i)).unwrap();
        }
        assert!(heap.should_collect());

        let report = heap.collect(&keep);
        assert_eq!(report.freed, 70);
        assert_eq!(report.threshold_after, 30 * 2 + 100);
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut heap = Heap::default();
        heap.allocate_pair(Value::Int(1), Value::Int(1)).unwrap();
        heap.allocate_pair(Value::Int(1), Value::Int(1)).unwrap();
        heap.collect(&[]);
        heap.collect(&[]);

        let stats = heap.stats();
        assert_eq!(stats.collections, 2);
        assert_eq!(stats.objects_allocated, 2);
        assert_eq!(stats.objects_freed, 2);
        assert_eq!(stats.peak_live, 2);
        assert!(stats.min_pause.is_some());
        assert!(stats.max_pause >= stats.min_pause.unwrap_or_default());
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut heap = Heap::default();
        for i in 0..10 {
            heap.allocate_pair(Value::Int(i), Value::Int(i)).unwrap();
        }
        heap.collect(&[]);
        for i in 0..10 {
            heap.allocate_pair(Value::Int(i), Value::Int(i)).unwrap();
        }
        assert!(heap.iter().all(|(h, _)| h.index() < 10));
        assert_eq!(heap.live_count(), 10);
        assert_eq!(list_len(&heap), 10);
    }
}
