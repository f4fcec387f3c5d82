use std::collections::BTreeSet;

use crate::model::SampleId;
use crate::progress::first_pending;

/// Position within the prepared pair list, owned by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    pub fn at(position: usize, len: usize) -> Option<Self> {
        (position < len).then_some(Self { position, len })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn next(&mut self) -> bool {
        if self.position + 1 < self.len {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.position > 0 {
            self.position -= 1;
            true
        } else {
            false
        }
    }

    pub fn jump(&mut self, position: usize) -> bool {
        if position < self.len {
            self.position = position;
            true
        } else {
            false
        }
    }

    /// Moves to the first pending sample; `false` means everything is done.
    pub fn jump_to_first_pending(
        &mut self,
        order: &[SampleId],
        completed: &BTreeSet<SampleId>,
    ) -> bool {
        match first_pending(order, completed) {
            Some(position) => self.jump(position),
            None => false,
        }
    }
}
