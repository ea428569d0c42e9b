#![cfg(test)]

use rcd::{AsAny, AtomicRcptr, AtomicWeakRcptr, Rcptr, Rcref};
use std::sync::atomic::AtomicIsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::mpsc::channel;
use std::thread;

struct R(&'static AtomicIsize);
impl Drop for R {
    fn drop(&mut self) {
        self.0.fetch_add(1, Relaxed);
    }
}

trait Widget: AsAny + Send + Sync {
    fn label(&self) -> &str;
}

struct Button {
    label: String,
    _r: R,
}
impl Widget for Button {
    fn label(&self) -> &str {
        &self.label
    }
}

#[test]
fn single_threaded() {
    static DROP_CNT: AtomicIsize = AtomicIsize::new(0);

    let r = Rcref::new(R(&DROP_CNT));

    // `weak` does not keep `r` alive.
    let weak = Rcref::downgrade(&r);
    assert_eq!(Rcptr::strong_count(&weak.upgrade()), 2);

    let r_clone = r.clone();
    drop(r);
    assert_eq!(DROP_CNT.load(Relaxed), 0);

    // The value is dropped as soon as the last strong reference is released.
    assert!(Rcref::release(r_clone));
    assert_eq!(DROP_CNT.load(Relaxed), 1);
    assert!(Rcptr::is_empty(&weak.upgrade()));
}

#[test]
fn multi_threaded() {
    static DROP_CNT: AtomicIsize = AtomicIsize::new(0);

    let button = Rcref::new(Button {
        label: String::from("OK"),
        _r: R(&DROP_CNT),
    });
    let widget: Rcref<dyn Widget> = Rcref::map(&button, |b| b as &dyn Widget);
    let focused: AtomicRcptr<dyn Widget> = AtomicRcptr::from(widget.clone());
    let hovered: AtomicWeakRcptr<dyn Widget> = AtomicWeakRcptr::from(Rcref::downgrade(&widget));
    drop(button);

    thread::scope(|s| {
        s.spawn(|| {
            // `AtomicRcptr` hands out strong references to any thread.
            let current = focused.load();
            if let Some(widget) = Rcptr::get(&current) {
                assert_eq!(widget.label(), "OK");
            }

            // `AtomicRcptr` provides an atomic compare-and-swap method.
            assert!(focused.compare_and_set(&current, Rcptr::null()) || focused.is_null());
        });
        s.spawn(|| {
            // A weak reference can be upgraded as long as a strong reference exists.
            let upgraded = hovered.upgrade();
            assert!(Rcptr::get(&upgraded).is_some_and(|w| w.label() == "OK"));

            // The concrete type can be recovered from a trait object.
            let button = Rcptr::downcast::<Button>(&upgraded);
            assert!(button == upgraded);
        });
    });

    assert!(focused.is_null());
    assert_eq!(DROP_CNT.load(Relaxed), 0);
    drop(widget);
    assert_eq!(DROP_CNT.load(Relaxed), 1);
    assert!(Rcptr::is_empty(&hovered.upgrade()));
}

#[test]
fn deferred_teardown() {
    static DROP_CNT: AtomicIsize = AtomicIsize::new(0);

    // The owner thread tears down values released by any thread.
    let (sender, receiver) = channel::<R>();
    let owner = thread::spawn(move || {
        let mut torn_down = 0;
        while let Ok(r) = receiver.recv() {
            drop(r);
            torn_down += 1;
        }
        torn_down
    });

    let resources = (0..4)
        .map(|_| {
            let sender = sender.clone();
            Rcref::with_disposer(R(&DROP_CNT), move |r: R| {
                let _result = sender.send(r);
            })
        })
        .collect::<Vec<_>>();
    drop(sender);

    thread::scope(|s| {
        for r in resources {
            s.spawn(move || drop(r));
        }
    });

    assert_eq!(owner.join().unwrap(), 4);
    assert_eq!(DROP_CNT.load(Relaxed), 4);
}
