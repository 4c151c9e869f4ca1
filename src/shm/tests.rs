//! Unit and property tests for the shared-memory buffer pool

use super::*;
use crate::backend::{HeadlessBackend, HeadlessControl, HeadlessOptions};
use proptest::prelude::*;

fn session() -> (Session<HeadlessBackend>, HeadlessControl) {
    let (backend, control) = HeadlessBackend::new(HeadlessOptions::default());
    (Session::with_backend(backend).unwrap(), control)
}

#[test]
fn sizes_follow_fixed_format() {
    let (stride, slot_len, total) = pool_size(800, 600, 2).unwrap();
    assert_eq!(stride, 3200);
    assert_eq!(slot_len, 3200 * 600);
    assert_eq!(total, 2 * 3200 * 600);
}

#[test]
fn oversized_pools_are_rejected() {
    assert!(matches!(
        pool_size(u32::MAX, 2, 1),
        Err(PaneError::InvalidGeometry { .. })
    ));
    assert!(pool_size(30_000, 30_000, 2).is_err());
    assert!(pool_size(16, 16, 0).is_err());
    assert!(pool_size(16, 16, MAX_SLOTS + 1).is_err());
}

#[test]
fn slots_tile_the_mapping() {
    let (mut session, control) = session();
    let pool = BufferPool::create(&mut session, 10, 4, 3).unwrap();

    assert_eq!(pool.len(), 3);
    assert_eq!(pool.size_bytes(), 3 * 160);
    for (i, expected_offset) in [0usize, 160, 320].iter().enumerate() {
        let slot = pool.slot(i).unwrap();
        assert_eq!(slot.offset, *expected_offset);
        assert_eq!(slot.len, 160);
        assert!(!slot.busy);
    }
    assert_eq!(control.live_buffers(), 3);
    pool.destroy(session.backend_mut());
    assert_eq!(control.live_buffers(), 0);
    assert_eq!(control.live_pools(), 0);
}

#[test]
fn active_slot_is_width_times_height_pixels() {
    let (mut session, _control) = session();
    let mut pool = BufferPool::create(&mut session, 7, 5, 2).unwrap();
    assert_eq!(pool.active_slot().unwrap().len(), 35);
    pool.destroy(session.backend_mut());
}

#[test]
fn writes_land_in_the_active_slot_only() {
    let (mut session, _control) = session();
    let mut pool = BufferPool::create(&mut session, 4, 4, 2).unwrap();
    pool.active_slot().unwrap().fill(0xFFAB_CDEF);
    pool.advance();
    pool.active_slot().unwrap().fill(0xFF00_0000);

    assert!(pool.slot_pixels(0).unwrap().iter().all(|p| *p == 0xFFAB_CDEF));
    assert!(pool.slot_pixels(1).unwrap().iter().all(|p| *p == 0xFF00_0000));
    pool.destroy(session.backend_mut());
}

#[test]
fn busy_active_slot_is_unavailable() {
    let (mut session, _control) = session();
    let mut pool = BufferPool::create(&mut session, 4, 4, 2).unwrap();
    pool.mark_busy(0);
    assert!(matches!(
        pool.active_slot(),
        Err(PaneError::BufferUnavailable { slot: 0 })
    ));
    pool.mark_free(0);
    assert!(pool.active_slot().is_ok());
    pool.destroy(session.backend_mut());
}

#[test]
fn single_slot_advance_is_a_no_op() {
    let (mut session, _control) = session();
    let mut pool = BufferPool::create(&mut session, 4, 4, 1).unwrap();
    assert_eq!(pool.advance(), 0);
    assert_eq!(pool.advance(), 0);
    pool.destroy(session.backend_mut());
}

#[test]
fn release_maps_buffer_to_slot() {
    let (mut session, _control) = session();
    let pool = BufferPool::create(&mut session, 4, 4, 3).unwrap();
    let buffer = pool.slot(2).unwrap().buffer;
    assert_eq!(pool.slot_for_buffer(buffer), Some(2));
    assert_eq!(pool.slot_for_buffer(BufferId(u32::MAX)), None);
    pool.destroy(session.backend_mut());
}

#[test]
fn missing_shm_capability_allocates_nothing() {
    let (backend, control) = HeadlessBackend::new(HeadlessOptions::default().without_global("wl_shm"));
    let mut session = Session::with_backend(backend).unwrap();
    assert!(matches!(
        BufferPool::create(&mut session, 4, 4, 2),
        Err(PaneError::MissingCapability(Capability::SharedMemory))
    ));
    assert_eq!(control.pools_created(), 0);
}

#[derive(Debug, Clone)]
enum Op {
    Present,
    Release(usize),
    Advance,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Present),
        3 => (0usize..MAX_SLOTS).prop_map(Op::Release),
        1 => Just(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn active_slot_never_hands_out_busy_memory(
        slot_count in 1usize..=MAX_SLOTS,
        ops in proptest::collection::vec(op(), 1..64),
    ) {
        let (mut session, _control) = session();
        let mut pool = BufferPool::create(&mut session, 8, 8, slot_count).unwrap();

        for op in ops {
            match op {
                Op::Present => {
                    if pool.active_slot().is_ok() {
                        let slot = pool.active_index();
                        pool.mark_busy(slot);
                        pool.advance();
                    }
                }
                Op::Release(slot) => pool.mark_free(slot % slot_count),
                Op::Advance => {
                    pool.advance();
                }
            }

            prop_assert!(pool.active_index() < slot_count);
            let busy = pool.active_is_busy();
            prop_assert_eq!(pool.active_slot().is_err(), busy);
        }
        pool.destroy(session.backend_mut());
    }
}
