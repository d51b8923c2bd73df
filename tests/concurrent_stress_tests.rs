//! Concurrent stress tests for high-contention scenarios
//! Capture threads, consumer threads and idle sweeps running against shared pools

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    },
    thread,
    time::Duration,
};

use framepool::{
    allocators::{AlignedBufferAllocator, Allocator},
    FrameHandle, FrameHeader, FrameType, PoolRegistry, RawFrame,
};

#[cfg(test)]
mod concurrent_stress_tests {
    use super::*;

    /// Test: capture threads hand frames to consumers while a sweeper trims idle memory
    #[test]
    fn stress_capture_consume_sweep() {
        let allocator = Arc::new(AlignedBufferAllocator::new());
        let registry = Arc::new(PoolRegistry::new(allocator.clone()));
        registry.set_max_total_memory(4);

        let classes = [(FrameType::Depth, 256 * 1024), (FrameType::Color, 384 * 1024)];
        let producers_per_class = 2;
        let frames_per_producer = 200;
        let barrier = Arc::new(Barrier::new(classes.len() * producers_per_class + 1));
        let captured = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::channel::<FrameHandle<RawFrame>>();

        // Consumer: checks each frame's bytes, holds a few, then releases
        let consumer = thread::spawn(move || {
            let mut held = Vec::new();
            let mut seen = 0usize;
            for frame in rx {
                let number = frame.header().frame_number;
                assert_eq!(&frame.data()[..8], &number.to_le_bytes());
                held.push(frame);
                if held.len() > 3 {
                    held.remove(0);
                }
                seen += 1;
            }
            seen
        });

        // Sweeper: trims idle slots while frames are in flight
        let sweeper = {
            let registry = registry.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut sweeps = 0;
                while !done.load(Ordering::Acquire) {
                    registry.free_idle_memory();
                    sweeps += 1;
                    thread::sleep(Duration::from_micros(200));
                }
                sweeps
            })
        };

        let mut producers = Vec::new();
        for (class, &(frame_type, payload)) in classes.iter().enumerate() {
            for p in 0..producers_per_class {
                let registry = registry.clone();
                let barrier = barrier.clone();
                let captured = captured.clone();
                let dropped = dropped.clone();
                let tx = tx.clone();
                producers.push(thread::spawn(move || {
                    let factory = registry.get_or_create::<RawFrame>(frame_type, payload).unwrap();
                    barrier.wait();
                    for i in 0..frames_per_producer {
                        let number = ((class * producers_per_class + p) * 10_000 + i) as u64;
                        let header = FrameHeader::new(frame_type, number, number);
                        match factory.acquire_frame(header).unwrap() {
                            Some(mut frame) => {
                                FrameHandle::get_mut(&mut frame)
                                    .unwrap()
                                    .payload_mut()
                                    .write(0, &number.to_le_bytes())
                                    .unwrap();
                                captured.fetch_add(1, Ordering::Relaxed);
                                tx.send(frame).unwrap();
                            }
                            None => {
                                dropped.fetch_add(1, Ordering::Relaxed);
                                thread::yield_now();
                            }
                        }
                    }
                }));
            }
        }
        drop(tx);

        barrier.wait();
        for producer in producers {
            producer.join().unwrap();
        }
        let seen = consumer.join().unwrap();
        done.store(true, Ordering::Release);
        let sweeps = sweeper.join().unwrap();

        let total = classes.len() * producers_per_class * frames_per_producer;
        assert_eq!(captured.load(Ordering::Relaxed) + dropped.load(Ordering::Relaxed), total);
        assert_eq!(seen, captured.load(Ordering::Relaxed));
        assert!(sweeps > 0);

        for snapshot in registry.stats_snapshot() {
            assert_eq!(snapshot.leased_slots, 0);
            assert_eq!(
                snapshot.stats.total_acquisitions,
                (producers_per_class * frames_per_producer) as u64
            );
        }

        registry.free_idle_memory();
        assert_eq!(allocator.used_size(), 0);
    }

    /// Test: many threads cloning and dropping handles to the same frames
    #[test]
    fn stress_shared_handle_refcounts() {
        let allocator = Arc::new(AlignedBufferAllocator::new());
        let registry = PoolRegistry::new(allocator.clone());
        let factory = registry.get_or_create::<RawFrame>(FrameType::Motion, 64).unwrap();

        let frames: Vec<_> = (0..16)
            .map(|n| {
                factory
                    .acquire_frame(FrameHeader::new(FrameType::Motion, n, 0))
                    .unwrap()
                    .unwrap()
            })
            .collect();
        let frames = Arc::new(frames);

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let frames = frames.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..500 {
                        let copies: Vec<_> = frames.iter().map(|f| f.clone()).collect();
                        for (n, copy) in copies.iter().enumerate() {
                            assert_eq!(copy.header().frame_number, n as u64);
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert!(frames.iter().all(|f| FrameHandle::ref_count(f) == 1));
        assert_eq!(factory.pool().leased_count(), 16);

        drop(frames);
        assert_eq!(factory.pool().idle_count(), 16);
        assert_eq!(factory.outstanding_frames(), 0);
        assert_eq!(registry.free_idle_memory(), 16 * factory.pool().frame_total_size());
        assert_eq!(allocator.used_size(), 0);
    }
}
