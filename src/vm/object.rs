// PairVM Heap Objects

use smallvec::SmallVec;

use super::value::{ObjRef, Value};

/// Payload of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Pair { left: Value, right: Value },
    Function { entry: i64, arity: i64 },
    Closure {
        function: Option<ObjRef>,
        environment: Option<ObjRef>,
    },
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Pair { .. } => "pair",
            ObjectKind::Function { .. } => "function",
            ObjectKind::Closure { .. } => "closure",
        }
    }

    /// Outgoing edges of this object
    pub fn references(&self) -> SmallVec<[ObjRef; 2]> {
        let mut refs = SmallVec::new();
        match self {
            ObjectKind::Pair { left, right } => {
                refs.extend(left.as_obj());
                refs.extend(right.as_obj());
            }
            ObjectKind::Function { .. } => {}
            ObjectKind::Closure {
                function,
                environment,
            } => {
                refs.extend(*function);
                refs.extend(*environment);
            }
        }
        refs
    }
}

/// A record in the heap list. `marked` is only set while a collection runs.
#[derive(Debug, Clone)]
pub struct HeapObject {
    pub(crate) marked: bool,
    pub(crate) next: Option<ObjRef>,
    pub kind: ObjectKind,
}

impl HeapObject {
    pub(crate) fn new(kind: ObjectKind, next: Option<ObjRef>) -> Self {
        Self {
            marked: false,
            next,
            kind,
        }
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_references_skip_ints() {
        let r = ObjRef::new(1, 0);
        let kind = ObjectKind::Pair {
            left: Value::Int(5),
            right: Value::Obj(r),
        };
        assert_eq!(kind.references().as_slice(), &[r]);
    }

    #[test]
    fn test_function_has_no_references() {
        let kind = ObjectKind::Function { entry: 12, arity: 2 };
        assert!(kind.references().is_empty());
    }

    #[test]
    fn test_closure_references_skip_null() {
        let f = ObjRef::new(0, 0);
        let kind = ObjectKind::Closure {
            function: Some(f),
            environment: None,
        };
        assert_eq!(kind.references().as_slice(), &[f]);
        assert_eq!(kind.type_name(), "closure");
    }
}
