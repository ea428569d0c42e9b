use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::{Arc, Mutex};

use loom::thread::spawn;

use crate::{AtomicRcptr, AtomicWeakRcptr, Rcptr, Rcref, WeakRcptr};

struct A(AtomicBool, Arc<AtomicUsize>);
impl Drop for A {
    fn drop(&mut self) {
        assert!(!self.0.swap(true, Relaxed));
        self.1.fetch_add(1, Relaxed);
    }
}

static SERIALIZER: Mutex<()> = Mutex::new(());

#[test]
fn release_release() {
    let _guard = SERIALIZER.lock().unwrap();
    loom::model(|| {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let rcref = Rcref::new(A(AtomicBool::new(false), drop_count.clone()));
        let rcref_clone = rcref.clone();

        let thread = spawn(move || Rcref::release(rcref_clone));
        let released = Rcref::release(rcref);
        let released_clone = thread.join().unwrap();

        assert!(released ^ released_clone);
        assert_eq!(drop_count.load(Relaxed), 1);
    });
}

#[test]
fn upgrade_release() {
    let _guard = SERIALIZER.lock().unwrap();
    loom::model(|| {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let rcref = Rcref::new(A(AtomicBool::new(false), drop_count.clone()));
        let weak = Rcref::downgrade(&rcref);

        let thread = spawn(move || {
            let upgraded = weak.upgrade();
            if let Some(a) = Rcptr::get(&upgraded) {
                assert!(!a.0.load(Relaxed));
            }
        });

        drop(rcref);
        assert!(thread.join().is_ok());
        assert_eq!(drop_count.load(Relaxed), 1);
    });
}

#[test]
fn atomic_rcptr_exchange_load() {
    let _guard = SERIALIZER.lock().unwrap();
    loom::model(|| {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let atomic = Arc::new(AtomicRcptr::new(A(
            AtomicBool::new(false),
            drop_count.clone(),
        )));
        let atomic_clone = atomic.clone();

        let thread = spawn(move || {
            let loaded = atomic_clone.load();
            assert!(!Rcptr::get(&loaded).is_some_and(|a| a.0.load(Relaxed)));
        });

        let old = atomic.exchange(Rcptr::null());
        drop(old);
        assert!(thread.join().is_ok());
        assert_eq!(drop_count.load(Relaxed), 1);
        assert!(atomic.is_null());
    });
}

#[test]
fn load_while_writer_stalls() {
    let _guard = SERIALIZER.lock().unwrap();
    loom::model(|| {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let atomic = Arc::new(AtomicRcptr::new(A(
            AtomicBool::new(false),
            drop_count.clone(),
        )));
        let atomic_clone = atomic.clone();
        let drop_count_clone = drop_count.clone();

        let writer = spawn(move || {
            let new = Rcptr::new(A(AtomicBool::new(false), drop_count_clone));
            let current = atomic_clone.load();
            if let Err(new) = atomic_clone.compare_exchange(&current, new) {
                drop(atomic_clone.exchange(new));
            }
        });

        // The reader never yields: if a load had to wait for the writer to resume, some
        // interleaving would spin forever and exhaust the model.
        let first = atomic.load();
        let second = atomic.load();
        assert!(!Rcptr::get(&first).is_some_and(|a| a.0.load(Relaxed)));
        assert!(!Rcptr::get(&second).is_some_and(|a| a.0.load(Relaxed)));
        assert!(!Rcptr::is_empty(&first));
        assert!(!Rcptr::is_empty(&second));
        drop((first, second));

        assert!(writer.join().is_ok());
        assert_eq!(drop_count.load(Relaxed), 1);
        drop(atomic);
        assert_eq!(drop_count.load(Relaxed), 2);
    });
}

#[test]
fn weak_load_store_release() {
    let _guard = SERIALIZER.lock().unwrap();
    loom::model(|| {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let rcref = Rcref::new(A(AtomicBool::new(false), drop_count.clone()));
        let atomic = Arc::new(AtomicWeakRcptr::from(Rcref::downgrade(&rcref)));
        let atomic_clone = atomic.clone();

        // The last references are dropped while the reader may be looking into the cell.
        let writer = spawn(move || {
            atomic_clone.store(WeakRcptr::new());
            drop(rcref);
        });

        let upgraded = atomic.upgrade();
        if let Some(a) = Rcptr::get(&upgraded) {
            assert!(!a.0.load(Relaxed));
        }
        let weak = atomic.load();
        drop(upgraded);

        assert!(writer.join().is_ok());
        assert_eq!(drop_count.load(Relaxed), 1);
        assert!(weak.is_expired());
        assert!(atomic.is_null());
    });
}
