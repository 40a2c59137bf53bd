use super::*;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One queue of each kind with the same capacity
fn both_kinds<T: Send + 'static>(capacity: usize) -> Vec<(QueueKind, Arc<dyn BoundedQueue<T>>)> {
    init_logger();
    [QueueKind::Blocking, QueueKind::Busy]
        .into_iter()
        .map(|kind| (kind, make_queue(kind, capacity).unwrap()))
        .collect()
}

//
// 1. Construction
//
#[test]
fn test_zero_capacity_is_rejected() {
    assert_eq!(
        BlockingQueue::<u32>::new(0).unwrap_err(),
        QueueError::InvalidCapacity(0)
    );
    assert_eq!(
        BusyQueue::<u32>::new(0).unwrap_err(),
        QueueError::InvalidCapacity(0)
    );
    assert!(make_queue::<u32>(QueueKind::Busy, 0).is_err());
}

//
// 2. FIFO
//
#[test]
fn test_fifo_order() {
    for (kind, queue) in both_kinds::<u32>(8) {
        for i in 0..8 {
            queue.put(i).unwrap();
        }
        assert_eq!(queue.size(), 8, "{kind:?}");
        assert!(queue.is_full());
        let taken: Vec<u32> = (0..8).map(|_| queue.take().unwrap()).collect();
        assert_eq!(taken, (0..8).collect::<Vec<_>>(), "{kind:?}");
        assert!(queue.is_empty());
    }
}

#[test]
fn test_offer_and_poll_do_not_block() {
    for (kind, queue) in both_kinds::<&'static str>(2) {
        assert_eq!(queue.poll(), None, "{kind:?}");
        assert_eq!(queue.offer("a"), Ok(()));
        assert_eq!(queue.offer("b"), Ok(()));
        assert_eq!(queue.offer("c"), Err("c"), "{kind:?}");
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.poll(), Some("a"));
        assert_eq!(queue.offer("c"), Ok(()));
        assert_eq!(queue.drain(), vec!["b", "c"]);
        assert_eq!(queue.capacity(), 2);
    }
}

//
// 3. Blocking behaviour
//
#[test]
fn test_put_blocks_while_full() {
    for (kind, queue) in both_kinds::<u32>(1) {
        queue.put(1).unwrap();

        let inserted = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let inserted = inserted.clone();
            thread::spawn(move || {
                queue.put(2).unwrap();
                inserted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!inserted.load(Ordering::SeqCst), "{kind:?} put did not block");
        assert_eq!(queue.size(), 1);

        assert_eq!(queue.take().unwrap(), 1);
        producer.join().unwrap();
        assert!(inserted.load(Ordering::SeqCst));
        assert_eq!(queue.take().unwrap(), 2);
    }
}

#[test]
fn test_take_blocks_while_empty() {
    for (kind, queue) in both_kinds::<u32>(4) {
        let (tx, rx) = mpsc::channel();
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                tx.send(queue.take().unwrap()).unwrap();
            })
        };

        assert!(
            rx.recv_timeout(Duration::from_millis(50)).is_err(),
            "{kind:?} take returned from an empty queue"
        );
        queue.put(42).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        consumer.join().unwrap();
    }
}

//
// 4. Interruption
//
#[test]
fn test_interrupted_take_leaves_queue_intact() {
    for (kind, queue) in both_kinds::<u32>(2) {
        let interrupt = Interrupt::new();
        let consumer = {
            let queue = queue.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || queue.take_interruptibly(&interrupt))
        };

        thread::sleep(Duration::from_millis(20));
        interrupt.raise();
        assert_eq!(consumer.join().unwrap(), Err(QueueError::Interrupted), "{kind:?}");

        // still fully usable afterwards
        interrupt.clear();
        queue.put(7).unwrap();
        assert_eq!(queue.take_interruptibly(&interrupt), Ok(7));
        assert!(queue.is_empty());
    }
}

#[test]
fn test_interrupted_put_does_not_insert() {
    for (kind, queue) in both_kinds::<u32>(1) {
        queue.put(1).unwrap();
        let interrupt = Interrupt::new();
        let producer = {
            let queue = queue.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || queue.put_interruptibly(2, &interrupt))
        };

        thread::sleep(Duration::from_millis(20));
        interrupt.raise();
        assert_eq!(producer.join().unwrap(), Err(QueueError::Interrupted), "{kind:?}");
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.drain(), vec![1]);
    }
}

//
// 5. Close
//
#[test]
fn test_close_wakes_waiters_and_keeps_buffered_elements() {
    for (kind, queue) in both_kinds::<u32>(2) {
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(waiter.join().unwrap(), Err(QueueError::Closed), "{kind:?}");
        assert!(queue.is_closed());

        assert_eq!(queue.put(1), Err(QueueError::Closed));
        assert_eq!(queue.offer(1), Err(1));
    }

    let queue = BlockingQueue::new(2).unwrap();
    queue.put(5).unwrap();
    queue.close();
    assert_eq!(queue.take(), Ok(5));
    assert_eq!(queue.take(), Err(QueueError::Closed));
}

//
// 6. Producer/consumer
//
fn producer_consumer_in_order(queue: Arc<dyn BoundedQueue<u32>>, items: u32) {
    init_logger();
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for i in 0..items {
                queue.put(i).unwrap();
            }
        })
    };

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let mut expected = 0;
            for _ in 0..items {
                let value = queue.take().unwrap();
                assert_eq!(value, expected, "gap or repeat in consumed sequence");
                expected += 1;
            }
            expected
        })
    };

    producer.join().unwrap();
    assert_eq!(consumer.join().unwrap(), items);
    assert_eq!(queue.size(), 0);
}

#[test]
fn test_producer_consumer_blocking() {
    producer_consumer_in_order(make_queue(QueueKind::Blocking, 10).unwrap(), 100_000);
}

#[test]
fn test_producer_consumer_busy() {
    producer_consumer_in_order(make_queue(QueueKind::Busy, 10).unwrap(), 100_000);
}

#[test]
fn test_many_producers_many_consumers_lose_nothing() {
    const PRODUCERS: u32 = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: u32 = 5_000;
    const CAPACITY: usize = 8;

    for (kind, queue) in both_kinds::<u32>(CAPACITY) {
        let remaining = Arc::new(AtomicUsize::new((PRODUCERS * PER_PRODUCER) as usize));
        let overfilled = Arc::new(AtomicBool::new(false));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.put(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = queue.clone();
                let remaining = remaining.clone();
                let overfilled = overfilled.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while remaining
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        if queue.size() > CAPACITY {
                            overfilled.store(true, Ordering::SeqCst);
                        }
                        seen.push(queue.take().unwrap());
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        let mut all: Vec<u32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();

        assert_eq!(all, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>(), "{kind:?}");
        assert!(!overfilled.load(Ordering::SeqCst), "{kind:?} exceeded its capacity");
        assert!(queue.is_empty());
    }
}

#[test]
fn test_poll_timeout_expires_on_empty_queue() {
    for (kind, queue) in both_kinds::<u32>(1) {
        assert_eq!(queue.poll_timeout(Duration::from_millis(10)), None, "{kind:?}");
        queue.put(3).unwrap();
        assert_eq!(queue.poll_timeout(Duration::from_millis(10)), Some(3));
    }
}

#[test]
fn test_poll_timeout_with_unbounded_duration() {
    for (kind, queue) in both_kinds::<u32>(1) {
        queue.put(1).unwrap();
        assert_eq!(queue.poll_timeout(Duration::MAX), Some(1), "{kind:?}");

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.poll_timeout(Duration::MAX))
        };
        thread::sleep(Duration::from_millis(20));
        queue.put(2).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(2), "{kind:?}");

        queue.close();
        assert_eq!(queue.poll_timeout(Duration::MAX), None, "{kind:?}");
    }
}
