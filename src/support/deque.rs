//! Circular-buffer double-ended queue used as a worklist by BK-tree traversal,
//! the query evaluator's AST walker, and the destroy-time sweep.

const GROWTH_STEP: usize = 16;

/// A ring-buffer deque that grows by a fixed step instead of doubling.
pub struct Deque<T> {
    buf: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Deque<T> {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            head: 0,
            len: 0,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = round_up(cap);
        let mut buf = Vec::with_capacity(cap);
        buf.resize_with(cap, || None);
        Self { buf, head: 0, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn slot(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity()
    }

    fn grow(&mut self) {
        let old_cap = self.capacity();
        let new_cap = old_cap + GROWTH_STEP;
        let mut new_buf = Vec::with_capacity(new_cap);
        for i in 0..self.len {
            let slot = self.slot(i);
            new_buf.push(self.buf[slot].take());
        }
        new_buf.resize_with(new_cap, || None);
        self.buf = new_buf;
        self.head = 0;
    }

    /// Append to the back.
    pub fn push_back(&mut self, value: T) {
        if self.len == self.capacity() {
            self.grow();
        }
        let idx = self.slot(self.len);
        self.buf[idx] = Some(value);
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.buf[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        value
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = self.slot(self.len - 1);
        let value = self.buf[idx].take();
        self.len -= 1;
        value
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn round_up(cap: usize) -> usize {
    if cap == 0 {
        return GROWTH_STEP;
    }
    ((cap + GROWTH_STEP - 1) / GROWTH_STEP) * GROWTH_STEP
}
