//! Call frame for function invocations.

use core_types::ObjRef;

/// One activation record on the frame stack.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    /// The closure being executed
    pub closure: ObjRef,
    /// The closure's function, cached to avoid a hop per fetch
    pub function: ObjRef,
    /// Offset of the next byte to execute in the function's chunk
    pub ip: usize,
    /// Base of this frame's window on the value stack; slot 0 holds the
    /// callee (or the receiver, for methods)
    pub slots: usize,
}

impl CallFrame {
    /// Create a frame starting at the beginning of the closure's code.
    pub fn new(closure: ObjRef, function: ObjRef, slots: usize) -> Self {
        CallFrame { closure, function, ip: 0, slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_frame_new() {
        let frame = CallFrame::new(ObjRef::new(1), ObjRef::new(2), 5);
        assert_eq!(frame.closure, ObjRef::new(1));
        assert_eq!(frame.function, ObjRef::new(2));
        assert_eq!(frame.ip, 0);
        assert_eq!(frame.slots, 5);
    }
}
