// Multi-threaded behavior of both containers.
//
// - Disjoint writers: final state is each thread's last write per key.
// - No torn reads: a loaded value is always one that was stored whole.
// - Compound atomicity: one load_or_store winner per key; CAS increments
//   are never lost.
// - Lock classification: on RwMap readers share, writers exclude (against
//   both a range and a plain load); on SyncMap everything excludes.
use cmap::{ConcurrentMap, LockMode, LockedMap, RwMap, Strategy, SyncMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Duration;

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 200;

// Every lane of a stored value carries the same number.
type Wide = [u64; 4];

fn wide(n: u64) -> Wide {
    [n; 4]
}

fn disjoint_writers<M>(m: &M)
where
    M: ConcurrentMap<Wide> + Sync,
{
    std::thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                for round in 0..3u64 {
                    for j in 0..KEYS_PER_THREAD {
                        let key = format!("t{t}-k{j}");
                        let n = (t * KEYS_PER_THREAD + j) as u64 * 10 + round;
                        m.store(key.as_str(), wide(n));
                        let got = m.load(&key).expect("own key present");
                        assert_eq!(*got, wide(n), "own write must be visible");
                        if j % 3 == 0 && round == 2 {
                            m.delete(&key);
                        }
                    }
                }
            });
        }
    });

    for t in 0..THREADS {
        for j in 0..KEYS_PER_THREAD {
            let key = format!("t{t}-k{j}");
            let got = m.load(&key);
            if j % 3 == 0 {
                assert!(got.is_none(), "{key} was deleted last");
            } else {
                let n = (t * KEYS_PER_THREAD + j) as u64 * 10 + 2;
                assert_eq!(got.as_deref(), Some(&wide(n)), "{key} keeps last write");
            }
        }
    }
}

// Test: disjoint writers on both strategies.
#[test]
fn disjoint_writers_keep_last_write() {
    disjoint_writers(&SyncMap::<Wide>::new());
    disjoint_writers(&RwMap::<Wide>::new());
}

fn readers_never_see_torn_values<L: Strategy>(m: &LockedMap<Wide, L>)
where
    LockedMap<Wide, L>: Sync,
{
    m.store("hot", wide(0));
    std::thread::scope(|s| {
        s.spawn(|| {
            for n in 1..=2_000 {
                m.store("hot", wide(n));
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..2_000 {
                    let v = m.load("hot").expect("never deleted");
                    assert!(v.iter().all(|&x| x == v[0]), "torn value: {v:?}");
                }
            });
        }
        s.spawn(|| {
            for _ in 0..200 {
                m.range(|_, v| {
                    assert!(v.iter().all(|&x| x == v[0]));
                    true
                });
            }
        });
    });
    assert_eq!(m.load("hot").as_deref(), Some(&wide(2_000)));
}

// Test: one writer, many readers on a single hot key.
#[test]
fn no_torn_reads() {
    readers_never_see_torn_values(&SyncMap::<Wide>::new());
    readers_never_see_torn_values(&RwMap::<Wide>::new());
}

fn single_load_or_store_winner<M>(m: &M)
where
    M: ConcurrentMap<usize> + Sync,
{
    let winners = AtomicUsize::new(0);
    let start = Barrier::new(THREADS);
    std::thread::scope(|s| {
        for t in 0..THREADS {
            let (winners, start) = (&winners, &start);
            s.spawn(move || {
                start.wait();
                let actual = m.load_or_store("shared", t);
                if !actual.loaded() {
                    winners.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(**actual.value(), t);
                }
                let seen = m.load("shared").expect("stored by someone");
                assert_eq!(seen, *actual.value(), "everyone sees the winner's value");
            });
        }
    });
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

// Test: racing load_or_store calls on one key.
#[test]
fn load_or_store_has_one_winner() {
    single_load_or_store_winner(&SyncMap::<usize>::new());
    single_load_or_store_winner(&RwMap::<usize>::new());
}

fn cas_counter<L: Strategy>(m: &LockedMap<u64, L>)
where
    LockedMap<u64, L>: Sync,
{
    const INCREMENTS: u64 = 500;
    m.store("counter", 0);
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..INCREMENTS {
                    loop {
                        let cur = *m.load("counter").expect("present");
                        if m.compare_and_swap("counter", &cur, cur + 1) {
                            break;
                        }
                    }
                }
            });
        }
    });
    assert_eq!(m.load("counter").as_deref(), Some(&(THREADS as u64 * INCREMENTS)));
}

// Test: read-modify-write through compare_and_swap loses no increments.
#[test]
fn compare_and_swap_counter() {
    cas_counter(&SyncMap::<u64>::new());
    cas_counter(&RwMap::<u64>::new());
}

// Test: reader/writer classification on RwMap.
// Verifies: while a range holds the shared lock on another thread, a load
// proceeds and a store times out; once the range ends the store succeeds.
#[test]
fn rw_map_readers_share_writers_exclude() {
    let m: RwMap<i32> = RwMap::new();
    m.store("a", 1);
    let in_range = Barrier::new(2);
    let release = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            m.range(|_, _| {
                in_range.wait();
                release.wait();
                false
            });
        });

        in_range.wait();
        let loaded = m
            .try_load_for("a", Duration::from_secs(5))
            .expect("concurrent reader must be admitted");
        assert_eq!(loaded.as_deref(), Some(&1));

        let err = m
            .try_store_for("b", 2, Duration::from_millis(20))
            .expect_err("writer must wait for the range");
        assert_eq!(err.mode, LockMode::Write);
        release.wait();
    });

    m.try_store_for("b", 2, Duration::from_secs(5)).unwrap();
    assert_eq!(m.load("b").as_deref(), Some(&2));
}

// Test: a held load blocks a store on RwMap.
// Verifies: while another thread is inside try_read_for (the read path a
// load takes), a second load is admitted and a store times out; the store
// succeeds once the reader leaves.
#[test]
fn rw_map_store_waits_for_overlapping_load() {
    let m: RwMap<i32> = RwMap::new();
    m.store("a", 1);
    let reading = Barrier::new(2);
    let release = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            let seen = m
                .try_read_for(Duration::from_secs(5), |t| {
                    let v = t.load("a").map(|v| **v);
                    reading.wait();
                    release.wait();
                    v
                })
                .expect("uncontended read");
            assert_eq!(seen, Some(1));
        });

        reading.wait();
        let loaded = m
            .try_load_for("a", Duration::from_secs(5))
            .expect("second reader must be admitted");
        assert_eq!(loaded.as_deref(), Some(&1));

        let err = m
            .try_store_for("a", 2, Duration::from_millis(20))
            .expect_err("store must wait for the reader");
        assert_eq!(err.mode, LockMode::Write);
        release.wait();
    });

    m.try_store_for("a", 2, Duration::from_secs(5)).unwrap();
    assert_eq!(m.load("a").as_deref(), Some(&2));
}

// Test: exclusive classification on SyncMap.
// Verifies: while a range holds the mutex, even a load times out.
#[test]
fn sync_map_serializes_readers() {
    let m: SyncMap<i32> = SyncMap::new();
    m.store("a", 1);
    let in_range = Barrier::new(2);
    let release = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            m.range(|_, _| {
                in_range.wait();
                release.wait();
                false
            });
        });

        in_range.wait();
        let err = m
            .try_load_for("a", Duration::from_millis(20))
            .expect_err("load must wait for the range");
        assert_eq!(err.mode, LockMode::Read);
        release.wait();
    });

    assert_eq!(m.load("a").as_deref(), Some(&1));
}

// Test: two readers on RwMap overlap in time.
// Verifies: a second range can start and finish while the first is paused
// inside its visitor.
#[test]
fn rw_map_concurrent_ranges_overlap() {
    let m: RwMap<i32> = (0..4).map(|i| (format!("k{i}"), i)).collect();
    let paused = Barrier::new(2);
    let resume = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            m.range(|_, _| {
                paused.wait();
                resume.wait();
                false
            });
        });
        paused.wait();
        let mut visited = 0;
        m.range(|_, _| {
            visited += 1;
            true
        });
        assert_eq!(visited, 4);
        resume.wait();
    });
}
