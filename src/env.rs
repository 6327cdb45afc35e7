//! Scoped environment: a stack of per-pass frames.
//!
//! Every transformation pass walks the AST with a stack of scope frames and
//! resolves names by searching the stack innermost-first.  The frame type is
//! pass-specific (a naming counter, a statement output list, a rename map, a
//! variable set) while the push/pop/search mechanics live here.
//!
//! Frames are owned by the traversal that created them and never outlive it:
//! [`ScopedEnv::scoped`] pushes a frame, runs a closure, and pops the frame
//! on every exit path out of the closure (normal return or early `?`
//! return), handing the popped frame back so passes can harvest what it
//! collected.

use crate::error::CompileError;

pub struct ScopedEnv<F> {
    frames: Vec<F>,
}

impl<F> ScopedEnv<F> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// An environment with a pre-installed root frame that is never popped.
    pub fn with_root(root: F) -> Self {
        Self { frames: vec![root] }
    }

    pub fn top(&self) -> Option<&F> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut F> {
        self.frames.last_mut()
    }

    /// The innermost frame, or an internal error if the stack is empty.
    /// Passes only consult the environment inside a scope, so an empty
    /// stack means the pass itself is broken.
    pub fn expect_top_mut(&mut self) -> Result<&mut F, CompileError> {
        self.frames
            .last_mut()
            .ok_or_else(|| CompileError::internal("scope stack is empty"))
    }

    /// All live frames, outermost first.
    pub fn frames(&self) -> &[F] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [F] {
        &mut self.frames
    }

    /// Innermost frame satisfying `pred`.
    pub fn find(&self, mut pred: impl FnMut(&F) -> bool) -> Option<&F> {
        self.frames.iter().rev().find(|f| pred(f))
    }

    /// Index (into [`Self::frames`]) of the innermost frame satisfying
    /// `pred` — the "defining scope" lookup of name resolution.
    pub fn find_index(&self, mut pred: impl FnMut(&F) -> bool) -> Option<usize> {
        self.frames.iter().rposition(|f| pred(f))
    }

    pub fn push(&mut self, frame: F) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<F> {
        self.frames.pop()
    }

    /// Scoped acquisition: push `frame`, run `f`, pop.  Returns the popped
    /// frame together with the closure's result so callers can write back
    /// anything the frame accumulated.
    pub fn scoped<R>(&mut self, frame: F, f: impl FnOnce(&mut Self) -> R) -> (F, R) {
        self.push(frame);
        let out = f(self);
        let frame = self
            .pop()
            .expect("the frame pushed above is still on the stack");
        (frame, out)
    }
}

impl<F> Default for ScopedEnv<F> {
    fn default() -> Self {
        Self::new()
    }
}
