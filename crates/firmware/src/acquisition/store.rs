//! Double-buffered result store.
//!
//! The engine decodes into the back frame and then swaps, so a reader that
//! takes the store's lock only ever sees a frame from one completed sweep.
//! Before the first publish there is no front frame.

use super::frame::ResultFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    A,
    B,
}

impl Slot {
    const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Front/back pair of [`ResultFrame`]s.
#[derive(Debug, Default)]
pub struct ResultStore {
    a: ResultFrame,
    b: ResultFrame,
    front: Option<Slot>,
}

impl ResultStore {
    /// Empty store with no published frame.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: Slot) -> &ResultFrame {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    fn back_slot(&self) -> Slot {
        self.front.map_or(Slot::A, Slot::other)
    }

    /// Frame being filled. Cleared on every call.
    pub fn back_mut(&mut self) -> &mut ResultFrame {
        let back = match self.back_slot() {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        };
        back.clear();
        back
    }

    /// Publish the back frame.
    pub fn swap(&mut self) {
        self.front = Some(self.back_slot());
    }

    /// Most recently published frame.
    pub fn front(&self) -> Option<&ResultFrame> {
        self.front.map(|s| self.slot(s))
    }

    /// `true` once at least one frame was published.
    pub fn is_ready(&self) -> bool {
        self.front.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_front() {
        let store = ResultStore::new();
        assert!(!store.is_ready());
        assert!(store.front().is_none());
    }

    #[test]
    fn swap_publishes_back_and_keeps_front_stable_while_filling() {
        let mut store = ResultStore::new();
        store.back_mut().sweep = 1;
        store.swap();
        assert_eq!(store.front().unwrap().sweep, 1);

        // Filling the next frame must not touch the published one.
        store.back_mut().sweep = 2;
        assert_eq!(store.front().unwrap().sweep, 1);
        store.swap();
        assert_eq!(store.front().unwrap().sweep, 2);

        // Third frame reuses the first slot.
        store.back_mut().sweep = 3;
        assert_eq!(store.front().unwrap().sweep, 2);
        store.swap();
        assert_eq!(store.front().unwrap().sweep, 3);
    }
}
