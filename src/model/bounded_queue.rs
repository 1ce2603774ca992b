use std::collections::VecDeque;

/// FIFO with a hard capacity: pushing onto a full queue evicts the oldest item and hands it back.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the evicted item, if any. With capacity 0 the pushed item itself comes back.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_without_eviction() {
        let mut q = BoundedQueue::new(3);
        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), None);
        assert_eq!(q.len(), 3);
        assert_eq!(q.oldest(), Some(&1));
        assert_eq!(q.newest(), Some(&3));
    }

    #[test]
    fn test_evicts_in_fifo_order() {
        let mut q = BoundedQueue::new(100);
        let evicted: Vec<u32> = (1..=105).filter_map(|i| q.push(i)).collect();
        assert_eq!(evicted, vec![1, 2, 3, 4, 5]);
        assert_eq!(q.len(), 100);
        assert_eq!(q.iter().copied().next(), Some(6));
        assert_eq!(q.newest(), Some(&105));
    }

    #[test]
    fn test_zero_capacity_returns_item() {
        let mut q = BoundedQueue::new(0);
        assert_eq!(q.push("ball"), Some("ball"));
        assert!(q.is_empty());
    }
}
