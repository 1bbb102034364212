//! Bounded lock-free parameter channel
//!
//! One control thread pushes, the audio thread drains once per block.
//! Backed by an `rtrb` single-producer/single-consumer ring: the producer
//! publishes its write index with `Release` after the slot is written and the
//! consumer reads it with `Acquire` before touching the slot (and vice versa
//! for the read index), so neither side ever waits on the other.
//!
//! A channel of capacity `N` (a power of two) queues at most `N - 1`
//! messages, the same occupancy limit as a classic head/tail ring that keeps
//! one slot free to tell "full" from "empty".

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::error::ConfigError;

/// Producer half. Owned by the control context; not `Clone`.
pub struct ParameterSender<M> {
    producer: Producer<M>,
}

/// Consumer half. Owned by the real-time context.
pub struct ParameterReceiver<M> {
    consumer: Consumer<M>,
}

/// Create a channel with `capacity` slots, `capacity - 1` of them usable.
///
/// `capacity` must be a power of two and at least 2.
pub fn channel<M: Send + 'static>(
    capacity: usize,
) -> Result<(ParameterSender<M>, ParameterReceiver<M>), ConfigError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(ConfigError::InvalidCapacity(capacity));
    }

    let (producer, consumer) = RingBuffer::new(capacity - 1);
    Ok((ParameterSender { producer }, ParameterReceiver { consumer }))
}

impl<M: Send + 'static> ParameterSender<M> {
    /// Queue `msg` without blocking.
    ///
    /// A full channel leaves the queue untouched and returns `Err(msg)` so the
    /// caller can drop, retry later, or coalesce it with a newer value.
    #[inline]
    pub fn try_send(&mut self, msg: M) -> Result<(), M> {
        self.producer.push(msg).map_err(|PushError::Full(m)| m)
    }

    /// Total slots, including the one that is never filled
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity() + 1
    }

    /// Messages that can still be queued right now
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// The audio side has been dropped; nothing will read further messages.
    pub fn is_disconnected(&self) -> bool {
        self.producer.is_abandoned()
    }
}

impl<M: Send + 'static> ParameterReceiver<M> {
    /// Pop and hand every queued message to `apply`, oldest first.
    ///
    /// Only messages already visible when the call starts are taken, so the
    /// loop is bounded by the channel capacity even while the producer keeps
    /// pushing. Returns how many messages were applied.
    pub fn drain_all(&mut self, mut apply: impl FnMut(M)) -> usize {
        let queued = self.consumer.slots();
        let mut applied = 0;
        for _ in 0..queued {
            match self.consumer.pop() {
                Ok(msg) => {
                    apply(msg);
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        applied
    }

    /// Draining iterator over the messages present at call time - no allocation.
    pub fn drain(&mut self) -> impl Iterator<Item = M> + '_ {
        let queued = self.consumer.slots();
        let consumer = &mut self.consumer;
        core::iter::from_fn(move || consumer.pop().ok()).take(queued)
    }

    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn rejects_bad_capacities() {
        assert!(matches!(
            channel::<u32>(0),
            Err(ConfigError::InvalidCapacity(0))
        ));
        assert!(matches!(
            channel::<u32>(1),
            Err(ConfigError::InvalidCapacity(1))
        ));
        assert!(matches!(
            channel::<u32>(12),
            Err(ConfigError::InvalidCapacity(12))
        ));
        assert!(channel::<u32>(2).is_ok());
    }

    #[test]
    fn full_at_capacity_minus_one_and_reclaimed_after_drain() {
        let (mut tx, mut rx) = channel::<u32>(8).unwrap();
        assert_eq!(tx.capacity(), 8);
        assert_eq!(rx.capacity(), 8);

        for i in 0..7 {
            assert!(tx.try_send(i).is_ok(), "send {i} should fit");
        }
        assert!(tx.is_full());
        assert_eq!(tx.try_send(99), Err(99));
        assert_eq!(rx.len(), 7);

        let mut seen = Vec::new();
        assert_eq!(rx.drain_all(|m| seen.push(m)), 7);
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
        assert!(rx.is_empty());

        assert_eq!(tx.free_slots(), 7);
        assert!(tx.try_send(7).is_ok());
    }

    #[test]
    fn drain_iterator_stops_at_snapshot() {
        let (mut tx, mut rx) = channel::<u32>(4).unwrap();
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();

        let mut drain = rx.drain();
        assert_eq!(drain.next(), Some(1));
        // pushed after the snapshot: left for the next block
        tx.try_send(3).unwrap();
        assert_eq!(drain.next(), Some(2));
        assert_eq!(drain.next(), None);
        drop(drain);

        assert_eq!(rx.drain().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn preserves_order_across_threads() {
        let (mut tx, mut rx) = channel::<u32>(16).unwrap();

        let producer = thread::spawn(move || {
            let mut next = 0;
            while next < 1000 {
                if tx.try_send(next).is_ok() {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut expected = 0;
        while expected < 1000 {
            rx.drain_all(|m| {
                assert_eq!(m, expected);
                expected += 1;
            });
            thread::yield_now();
        }
        producer.join().unwrap();
    }

    #[test]
    fn reports_disconnect() {
        let (tx, rx) = channel::<u32>(4).unwrap();
        assert!(!tx.is_disconnected());
        drop(rx);
        assert!(tx.is_disconnected());
    }
}
