// PairVM Heap
// Arena of generation-checked slots threaded by an intrusive list
//
// Every live object sits in exactly one slot and on exactly one list, the
// list anchored at `head`. Values only ever hold `ObjRef` handles, so the
// heap is the sole owner of object storage. Slots freed by the sweep go on a
// free list and are reused by later allocations with a bumped generation.

use tracing::trace;

use crate::config::VmConfig;
use crate::error::{FatalError, VmResult};

use super::gc::GcStats;
use super::object::{HeapObject, ObjectKind};
use super::value::{ObjRef, Value};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    object: Option<HeapObject>,
}

/// The collected heap
#[derive(Debug, Clone)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) head: Option<ObjRef>,
    pub(crate) live: usize,
    pub(crate) threshold: usize,
    pub(crate) threshold_floor: usize,
    pub(crate) threshold_growth: usize,
    max_objects: Option<usize>,
    pub(crate) stats: GcStats,
}

impl Heap {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            live: 0,
            threshold: config.initial_threshold,
            threshold_floor: config.threshold_floor,
            threshold_growth: config.threshold_growth,
            max_objects: config.max_objects,
            stats: GcStats::default(),
        }
    }

    pub fn allocate_pair(&mut self, left: Value, right: Value) -> VmResult<ObjRef> {
        self.allocate(ObjectKind::Pair { left, right })
    }

    pub fn allocate_function(&mut self, entry: i64, arity: i64) -> VmResult<ObjRef> {
        self.allocate(ObjectKind::Function { entry, arity })
    }

    pub fn allocate_closure(
        &mut self,
        function: Option<ObjRef>,
        environment: Option<ObjRef>,
    ) -> VmResult<ObjRef> {
        self.allocate(ObjectKind::Closure {
            function,
            environment,
        })
    }

    /// Construct an object unmarked, link it at the head of the heap list and
    /// count it as live.
    fn allocate(&mut self, kind: ObjectKind) -> VmResult<ObjRef> {
        let out_of_memory = FatalError::OutOfMemory { live: self.live };
        if self.max_objects.map_or(false, |max| self.live >= max) {
            return Err(out_of_memory);
        }

        let object = HeapObject::new(kind, self.head);
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                ObjRef::new(index, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| out_of_memory.clone())?;
                self.slots.try_reserve(1).map_err(|_| out_of_memory)?;
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjRef::new(index, 0)
            }
        };

        self.head = Some(handle);
        self.live += 1;
        self.stats.record_allocation(self.live);
        trace!(handle = %handle, kind = kind.type_name(), live = self.live, "allocate");
        Ok(handle)
    }

    /// Unlinked slot storage goes back on the free list.
    pub(crate) fn release(&mut self, handle: ObjRef) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            if slot.generation == handle.generation && slot.object.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                self.live -= 1;
            }
        }
    }

    /// Resolve a handle. Stale handles resolve to nothing.
    pub fn get(&self, handle: ObjRef) -> Option<&HeapObject> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, handle: ObjRef) -> Option<&mut HeapObject> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn contains(&self, handle: ObjRef) -> bool {
        self.get(handle).is_some()
    }

    pub fn pair(&self, handle: ObjRef) -> Option<(Value, Value)> {
        match self.get(handle)?.kind {
            ObjectKind::Pair { left, right } => Some((left, right)),
            _ => None,
        }
    }

    /// Walk the heap list from its head
    pub fn iter(&self) -> HeapIter<'_> {
        HeapIter {
            heap: self,
            cursor: self.head,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn should_collect(&self) -> bool {
        self.live >= self.threshold
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(&VmConfig::default())
    }
}

pub struct HeapIter<'a> {
    heap: &'a Heap,
    cursor: Option<ObjRef>,
}

impl<'a> Iterator for HeapIter<'a> {
    type Item = (ObjRef, &'a HeapObject);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let object = self.heap.get(handle)?;
        self.cursor = object.next;
        Some((handle, object))
    }
}
