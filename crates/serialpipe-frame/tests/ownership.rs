use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serialpipe_frame::{Frame, FrameError, FrameKind, FrameQueue, OnFull, Pushed};

/// Payload owner that counts how many of its kind are alive.
struct Tracked {
    bytes: Vec<u8>,
    live: Arc<AtomicUsize>,
}

impl Tracked {
    fn frame(seq: u32, live: &Arc<AtomicUsize>) -> Frame {
        live.fetch_add(1, Ordering::SeqCst);
        let owner = Tracked {
            bytes: seq.to_le_bytes().to_vec(),
            live: Arc::clone(live),
        };
        Frame::from_bytes(Bytes::from_owner(owner), FrameKind::Binary)
    }
}

impl AsRef<[u8]> for Tracked {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn seq_of(frame: &Frame) -> u32 {
    u32::from_le_bytes(frame.as_bytes().try_into().expect("payload is a u32"))
}

#[test]
fn rejected_push_releases_frame_before_return() {
    let live = Arc::new(AtomicUsize::new(0));
    let queue = FrameQueue::new(1, OnFull::Fail).expect("queue should be created");

    queue
        .push(Tracked::frame(0, &live), None)
        .expect("first push should fit");
    assert_eq!(live.load(Ordering::SeqCst), 1);

    let err = queue
        .push(Tracked::frame(1, &live), Some(Duration::ZERO))
        .expect_err("second push should be rejected");
    assert!(matches!(err, FrameError::QueueFull));
    assert_eq!(live.load(Ordering::SeqCst), 1, "rejected frame must be dropped");

    drop(queue.pop(None));
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn evicted_frames_are_released() {
    let live = Arc::new(AtomicUsize::new(0));
    let queue = FrameQueue::new(4, OnFull::DropOldest).expect("queue should be created");

    for seq in 0..10 {
        queue
            .push(Tracked::frame(seq, &live), Some(Duration::ZERO))
            .expect("drop-oldest push always succeeds");
        assert!(queue.len() <= queue.capacity());
    }

    assert_eq!(live.load(Ordering::SeqCst), 4);
    assert_eq!(queue.evicted(), 6);

    let remaining: Vec<u32> = std::iter::from_fn(|| queue.pop(Some(Duration::ZERO)))
        .map(|frame| seq_of(&frame))
        .collect();
    assert_eq!(remaining, [6, 7, 8, 9]);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn each_eviction_removes_exactly_the_oldest() {
    let live = Arc::new(AtomicUsize::new(0));
    let queue = FrameQueue::new(3, OnFull::DropOldest).expect("queue should be created");

    for seq in 0..3 {
        queue.push(Tracked::frame(seq, &live), None).unwrap();
    }
    for seq in 3..8 {
        let pushed = queue
            .push(Tracked::frame(seq, &live), Some(Duration::ZERO))
            .unwrap();
        assert_eq!(pushed, Pushed::Evicted(1));

        let snapshot: Vec<u32> = std::iter::from_fn(|| queue.pop(Some(Duration::ZERO)))
            .map(|frame| seq_of(&frame))
            .collect();
        assert_eq!(snapshot, [seq - 2, seq - 1, seq]);
        for kept in snapshot {
            queue.push(Tracked::frame(kept, &live), None).unwrap();
        }
    }
}

#[test]
fn concurrent_push_pop_never_loses_or_duplicates() {
    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 250;
    const TOTAL: usize = (PRODUCERS * PER_PRODUCER) as usize;

    let live = Arc::new(AtomicUsize::new(0));
    let queue = FrameQueue::new(8, OnFull::Block).expect("queue should be created");
    let seen = Arc::new(Mutex::new(Vec::with_capacity(TOTAL)));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            let live = Arc::clone(&live);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let seq = p * PER_PRODUCER + i;
                    queue
                        .push(Tracked::frame(seq, &live), None)
                        .expect("blocking push should succeed");
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = queue.clone();
            let seen = Arc::clone(&seen);
            thread::spawn(move || loop {
                if seen.lock().unwrap().len() >= TOTAL {
                    break;
                }
                if let Some(frame) = queue.pop(Some(Duration::from_millis(5))) {
                    seen.lock().unwrap().push(seq_of(&frame));
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().expect("producer should finish");
    }
    for handle in consumers {
        handle.join().expect("consumer should finish");
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), TOTAL);
    let unique: HashSet<u32> = seen.iter().copied().collect();
    assert_eq!(unique.len(), TOTAL, "no frame may be delivered twice");
    assert!(queue.is_empty());
    assert_eq!(live.load(Ordering::SeqCst), 0, "every frame must be released");
}
