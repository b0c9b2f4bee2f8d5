//! Nestable binding environment, shared by the type checker (`Scope<Type>`)
//! and the evaluator (`Scope<Value>`).

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};

use crate::ast::{Expression, Identifier};

#[derive(Debug, Clone)]
struct Frame<T> {
    bindings: HashMap<Identifier, T>,
    /// Expressions proven non-empty by an `isSet` condition in this frame.
    non_null: HashSet<Expression>,
}

impl<T> Frame<T> {
    fn new() -> Self {
        Frame {
            bindings: HashMap::new(),
            non_null: HashSet::new(),
        }
    }
}

/// A stack of binding frames. The outermost (root) frame is never popped.
#[derive(Debug, Clone)]
pub struct Scope<T> {
    frames: Vec<Frame<T>>,
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "unbalanced pop of the root frame");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of open frames, including the root frame.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a frame that is popped when the returned guard is dropped.
    pub fn frame(&mut self) -> FrameGuard<'_, T> {
        self.push_frame();
        FrameGuard { scope: self }
    }

    /// Runs `f` inside a fresh frame. The frame is popped on every exit
    /// path, including early returns through `?`.
    pub fn in_scope<R>(&mut self, f: impl FnOnce(&mut Scope<T>) -> R) -> R {
        let mut guard = self.frame();
        f(&mut *guard)
    }

    /// Binds `id` in the innermost frame.
    pub fn insert(&mut self, id: impl Into<Identifier>, value: T) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(id.into(), value);
        }
    }

    /// Nearest binding of `id`, searching innermost to outermost.
    pub fn resolve(&self, id: &str) -> Option<&T> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(id))
    }

    pub fn set_non_null(&mut self, expression: Expression) {
        if let Some(frame) = self.frames.last_mut() {
            frame.non_null.insert(expression);
        }
    }

    pub fn is_non_null(&self, expression: &Expression) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|frame| frame.non_null.contains(expression))
    }
}

/// Keeps a frame open for its lifetime.
pub struct FrameGuard<'a, T> {
    scope: &'a mut Scope<T>,
}

impl<T> Deref for FrameGuard<'_, T> {
    type Target = Scope<T>;

    fn deref(&self) -> &Scope<T> {
        self.scope
    }
}

impl<T> DerefMut for FrameGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Scope<T> {
        self.scope
    }
}

impl<T> Drop for FrameGuard<'_, T> {
    fn drop(&mut self) {
        self.scope.pop_frame();
    }
}
