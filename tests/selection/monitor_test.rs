/*!
 * Monitor Tests
 * Ownership-change notifications, firing order and polling
 */

use super::common::{wait_until, Desk};
use clipsel::{Board, CancelToken, ClipboardError, Snapshot};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_monitor_sees_other_process_copy() {
    let desk = Desk::new();
    let (tx, rx) = flume::unbounded();
    let _monitor = desk
        .reader
        .subscribe(move |snapshot: &Snapshot| {
            tx.send(snapshot.clone())?;
            Ok(())
        })
        .unwrap();

    desk.owner
        .copy(Snapshot::builder().bytes("image/png", vec![1, 2, 3]).build())
        .unwrap();

    let snapshot = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(snapshot.board(), Board::Default);
    assert_eq!(snapshot.mimes().collect::<Vec<_>>(), vec!["image/png"]);
    assert!(snapshot.options()[0].is_deferred());

    // Options stay fetchable from the callback's snapshot
    assert_eq!(
        snapshot.get_format("image/png", &CancelToken::new()).unwrap(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_own_copy_does_not_fire() {
    let desk = Desk::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let _monitor = desk
        .owner
        .subscribe(move |_: &Snapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    desk.owner.copy_text("mine").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_callbacks_run_in_order_and_short_circuit() {
    let desk = Desk::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let monitor = desk.reader.monitor().unwrap();

    for (name, fail) in [("a", false), ("b", true), ("c", false)] {
        let calls = Arc::clone(&calls);
        monitor.subscribe(move |_: &Snapshot| {
            calls.lock().push(name);
            if fail {
                anyhow::bail!("callback {name} failed");
            }
            Ok(())
        });
    }

    let snapshot = Snapshot::text("x");
    assert!(monitor.fire(&snapshot).is_err());
    assert_eq!(*calls.lock(), vec!["a", "b"]);

    // The failure is not sticky
    assert!(monitor.fire(&snapshot).is_err());
    assert_eq!(*calls.lock(), vec!["a", "b", "a", "b"]);

    // Same through a real ownership change
    calls.lock().clear();
    desk.owner.copy_text("change").unwrap();
    assert!(wait_until(Duration::from_secs(2), || calls.lock().len() == 2));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*calls.lock(), vec!["a", "b"]);
}

#[test]
fn test_unsubscribe() {
    let desk = Desk::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let monitor = desk
        .reader
        .subscribe(move |_: &Snapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    let engine = desk.reader.engine().unwrap();
    assert_eq!(engine.monitor_count(), 1);

    desk.reader.unsubscribe(&monitor).unwrap();
    assert_eq!(engine.monitor_count(), 0);
    assert_eq!(desk.reader.unsubscribe(&monitor), Err(ClipboardError::NotFound));
    assert_eq!(monitor.close(), Err(ClipboardError::NotFound));

    desk.owner.copy_text("unheard").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_poll_refreshes_current_owner() {
    let desk = Desk::new();
    desk.owner.copy_text("already there").unwrap();

    let (tx, rx) = flume::unbounded();
    let monitor = desk
        .reader
        .subscribe(move |snapshot: &Snapshot| {
            tx.send(snapshot.board())?;
            Ok(())
        })
        .unwrap();

    monitor.poll().unwrap();
    // Only the clipboard board has an owner; the others are refused quietly
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Board::Default);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    let engine = desk.reader.engine().unwrap();
    assert!(wait_until(Duration::from_secs(2), || Board::ALL
        .iter()
        .all(|b| engine.pending_refreshes(*b) == 0)));
}

#[test]
fn test_poll_coalesces() {
    let desk = Desk::new();

    // Owner that never answers keeps the first poll pending
    let hung = desk.display.connect().unwrap();
    let window = clipsel::transport::Transport::create_window(&hung, "hung").unwrap();
    let clipboard = clipsel::transport::Transport::intern_atom(&hung, "CLIPBOARD").unwrap();
    clipsel::transport::Transport::set_selection_owner(&hung, window, clipboard).unwrap();

    let monitor = desk.reader.monitor().unwrap();
    let engine = desk.reader.engine().unwrap();
    monitor.poll().unwrap();
    let outstanding = engine.pending_refreshes(Board::Default);
    assert_eq!(outstanding, 1);

    for _ in 0..10 {
        monitor.poll().unwrap();
    }
    assert_eq!(engine.pending_refreshes(Board::Default), 1);
}

#[test]
fn test_refresh_replies_do_not_reach_fetches() {
    let desk = Desk::new();
    let _monitor = desk.reader.subscribe(|_: &Snapshot| Ok(())).unwrap();
    let engine = desk.reader.engine().unwrap();

    // Refreshes on unowned boards are refused with None replies
    engine.poll().unwrap();
    assert!(wait_until(Duration::from_secs(2), || Board::ALL
        .iter()
        .all(|b| engine.pending_refreshes(*b) == 0)));

    desk.owner.copy_text("after poll").unwrap();
    assert_eq!(desk.reader.paste_text(Board::Default).unwrap(), "after poll");
}
