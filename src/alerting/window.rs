use std::collections::VecDeque;

use crate::tracker::Label;

/// Fixed-capacity FIFO of the most recent per-frame dominant labels.
#[derive(Debug, Clone)]
pub struct StabilizationWindow {
    labels: VecDeque<Label>,
    capacity: usize,
}

impl StabilizationWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a label, evicting the oldest once over capacity.
    pub fn push(&mut self, label: Label) {
        self.labels.push_back(label);
        while self.labels.len() > self.capacity {
            self.labels.pop_front();
        }
    }

    /// The shared label when the window is full and unanimous, otherwise
    /// [`Label::None`].
    pub fn stable(&self) -> Label {
        if self.labels.len() < self.capacity {
            return Label::None;
        }
        match self.labels.front() {
            Some(first) if self.labels.iter().all(|l| l == first) => first.clone(),
            _ => Label::None,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_stable_until_full() {
        let mut window = StabilizationWindow::new(4);
        for _ in 0..3 {
            window.push(Label::Red);
            assert_eq!(window.stable(), Label::None);
        }
        window.push(Label::Red);
        assert_eq!(window.stable(), Label::Red);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut window = StabilizationWindow::new(4);
        for label in [Label::Green, Label::Red, Label::Red, Label::Red, Label::Red] {
            window.push(label);
        }
        assert_eq!(window.len(), 4);
        assert_eq!(window.capacity(), 4);
        assert_eq!(window.labels().next(), Some(&Label::Red));
        assert_eq!(window.stable(), Label::Red);
    }

    #[test]
    fn test_unanimous_none_is_not_stable() {
        let mut window = StabilizationWindow::new(4);
        for _ in 0..4 {
            window.push(Label::None);
        }
        assert_eq!(window.stable(), Label::None);
        window.clear();
        assert!(window.is_empty());
    }
}
