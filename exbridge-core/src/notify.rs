//! FIFO notification channel between the bridge and its host.
//!
//! Cloning a channel yields another handle onto the same queue, so the broker
//! or feed can publish while the host drains with `poll()`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct NotificationChannel<T> {
    queue: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for NotificationChannel<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> Default for NotificationChannel<T> {
    fn default() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T> NotificationChannel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn publish(&self, event: T) {
        self.queue().push_back(event);
    }

    /// Oldest pending event, if any.
    pub fn poll(&self) -> Option<T> {
        self.queue().pop_front()
    }

    /// Remove and return every pending event in publication order.
    pub fn drain(&self) -> Vec<T> {
        self.queue().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let ch = NotificationChannel::new();
        ch.publish(1);
        ch.publish(2);
        ch.publish(3);
        assert_eq!(ch.poll(), Some(1));
        assert_eq!(ch.drain(), vec![2, 3]);
        assert_eq!(ch.poll(), None);
    }

    #[test]
    fn clones_share_the_queue() {
        let producer = NotificationChannel::new();
        let consumer = producer.clone();
        producer.publish("live");
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.poll(), Some("live"));
        assert!(producer.is_empty());
    }
}
