/*!
 * Fetch Tests
 * Pasting from other owners: round trips, deadlines and chunked reads
 */

use super::common::{next_request, Desk};
use clipsel::core::types::NONE;
use clipsel::transport::{encode_atoms, SelectionNotify, Transport};
use clipsel::{Board, CancelToken, ClipboardConfig, ClipboardError, DataKind, Snapshot};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

fn timeout() -> CancelToken {
    CancelToken::with_timeout(Duration::from_secs(2))
}

#[test]
fn test_text_round_trip() {
    let desk = Desk::new();
    desk.owner.copy_text("hello across processes").unwrap();

    let cancel = timeout();
    let snapshot = desk.reader.paste(&cancel).unwrap();
    assert_eq!(snapshot.board(), Board::Default);
    assert_eq!(snapshot.kind(), DataKind::Text);
    // Aliases, markers and the bare type are normalised away
    assert_eq!(
        snapshot.mimes().collect::<Vec<_>>(),
        vec!["text/plain;charset=utf-8"]
    );
    assert_eq!(snapshot.to_text(&cancel).unwrap(), "hello across processes");
    assert_eq!(
        snapshot.get_format("text/plain", &cancel).unwrap(),
        b"hello across processes".to_vec()
    );
}

#[test]
fn test_multi_format_round_trip() {
    let desk = Desk::new();
    let files = [PathBuf::from("/home/u/a.txt"), PathBuf::from("/tmp/b c")];
    desk.owner
        .copy_to(
            Board::PrimarySelection,
            Snapshot::builder()
                .files(&files[..])
                .bytes("application/x-custom", vec![0, 1, 2, 3, 255])
                .build(),
        )
        .unwrap();

    let cancel = timeout();
    let snapshot = desk
        .reader
        .paste_from(Board::PrimarySelection, &cancel)
        .unwrap();
    assert_eq!(snapshot.kind(), DataKind::FileList);
    assert_eq!(snapshot.file_list(&cancel).unwrap(), files.to_vec());
    assert_eq!(
        snapshot.get_format("application/x-custom", &cancel).unwrap(),
        vec![0, 1, 2, 3, 255]
    );
    assert_eq!(
        snapshot.get_format("image/png", &cancel),
        Err(ClipboardError::FormatUnavailable("image/png".into()))
    );
}

#[test]
fn test_file_manager_offer_keeps_legacy_text() {
    let desk = Desk::new();
    let files = [PathBuf::from("/home/u/doc.odt")];
    desk.owner
        .copy(
            Snapshot::builder()
                .files(&files[..])
                .bytes("UTF8_STRING", b"/home/u/doc.odt".to_vec())
                .build(),
        )
        .unwrap();

    let cancel = timeout();
    let snapshot = desk.reader.paste(&cancel).unwrap();
    assert_eq!(
        snapshot.mimes().collect::<Vec<_>>(),
        vec!["text/uri-list", "UTF8_STRING"]
    );
    assert_eq!(snapshot.kind(), DataKind::FileList);
    assert_eq!(snapshot.to_text(&cancel).unwrap(), "/home/u/doc.odt");
    assert_eq!(snapshot.file_list(&cancel).unwrap(), files.to_vec());
}

#[test]
fn test_paste_unowned_board() {
    let desk = Desk::new();
    assert_eq!(
        desk.reader
            .paste_from(Board::SecondarySelection, &timeout())
            .err(),
        Some(ClipboardError::NotFound)
    );
}

#[test]
fn test_paste_own_content() {
    let desk = Desk::new();
    desk.owner.copy_text("mine").unwrap();
    assert_eq!(desk.owner.paste_text(Board::Default).unwrap(), "mine");
}

#[test]
fn test_expired_deadline_fails_fast() {
    let desk = Desk::new();
    desk.owner.copy_text("unused").unwrap();

    let expired = CancelToken::with_deadline(Instant::now() - Duration::from_millis(1));
    let start = Instant::now();
    assert_eq!(
        desk.reader.paste(&expired).err(),
        Some(ClipboardError::DeadlineExceeded)
    );
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_hung_owner_hits_deadline() {
    let desk = Desk::new();

    // An owner that never answers
    let hung = desk.display.connect().unwrap();
    let window = hung.create_window("hung").unwrap();
    let clipboard = hung.intern_atom("CLIPBOARD").unwrap();
    hung.set_selection_owner(window, clipboard).unwrap();

    let start = Instant::now();
    let cancel = CancelToken::with_timeout(Duration::from_millis(150));
    assert_eq!(
        desk.reader.paste(&cancel).err(),
        Some(ClipboardError::DeadlineExceeded)
    );
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn test_manual_cancel_wakes_waiter() {
    let desk = Desk::new();
    let hung = desk.display.connect().unwrap();
    let window = hung.create_window("hung").unwrap();
    let clipboard = hung.intern_atom("CLIPBOARD").unwrap();
    hung.set_selection_owner(window, clipboard).unwrap();

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        trigger.cancel();
    });

    assert_eq!(desk.reader.paste(&cancel).err(), Some(ClipboardError::Cancelled));
    canceller.join().unwrap();
}

#[test]
fn test_incremental_transfer_is_unavailable() {
    let desk = Desk::new();
    let engine = desk.reader.engine().unwrap();

    let rogue = desk.display.connect().unwrap();
    let window = rogue.create_window("incr-owner").unwrap();
    let clipboard = rogue.intern_atom("CLIPBOARD").unwrap();
    let incr = rogue.intern_atom("INCR").unwrap();
    rogue.set_selection_owner(window, clipboard).unwrap();

    let server = thread::spawn(move || {
        let request = next_request(&rogue).expect("request");
        rogue
            .change_property(
                request.requestor,
                request.property,
                incr,
                32,
                &encode_atoms(&[1 << 20]),
            )
            .unwrap();
        rogue
            .send_selection_notify(&SelectionNotify {
                time: request.time,
                requestor: request.requestor,
                selection: request.selection,
                target: request.target,
                property: request.property,
            })
            .unwrap();
        rogue
    });

    let png = engine.atoms().intern("image/png").unwrap();
    assert!(matches!(
        engine.fetch_format(Board::Default, png, &timeout()),
        Err(ClipboardError::FormatUnavailable(_))
    ));
    drop(server.join().unwrap());
}

#[test]
fn test_late_reply_is_not_matched_to_next_request() {
    let desk = Desk::new();
    let engine = desk.reader.engine().unwrap();

    let rogue = desk.display.connect().unwrap();
    let window = rogue.create_window("slow-owner").unwrap();
    let clipboard = rogue.intern_atom("CLIPBOARD").unwrap();
    rogue.set_selection_owner(window, clipboard).unwrap();

    let png = engine.atoms().intern("image/png").unwrap();
    let html = engine.atoms().intern("text/html").unwrap();

    // First request times out before the owner answers
    let first = CancelToken::with_timeout(Duration::from_millis(50));
    assert_eq!(
        engine.fetch_format(Board::Default, png, &first),
        Err(ClipboardError::DeadlineExceeded)
    );

    let server = thread::spawn(move || {
        // Answer the abandoned request, then the live one
        for _ in 0..2 {
            let request = next_request(&rogue).expect("request");
            let body = if request.target == png {
                b"stale png".to_vec()
            } else {
                b"<b>fresh</b>".to_vec()
            };
            rogue
                .change_property(request.requestor, request.property, request.target, 8, &body)
                .unwrap();
            rogue
                .send_selection_notify(&SelectionNotify {
                    time: request.time,
                    requestor: request.requestor,
                    selection: request.selection,
                    target: request.target,
                    property: request.property,
                })
                .unwrap();
        }
        rogue
    });

    assert_eq!(
        engine.fetch_format(Board::Default, html, &timeout()).unwrap(),
        b"<b>fresh</b>".to_vec()
    );
    drop(server.join().unwrap());
}

#[test]
fn test_late_reply_is_not_matched_to_retry_of_same_format() {
    let desk = Desk::new();
    let engine = desk.reader.engine().unwrap();

    let rogue = desk.display.connect().unwrap();
    let window = rogue.create_window("slow-owner").unwrap();
    let clipboard = rogue.intern_atom("CLIPBOARD").unwrap();
    rogue.set_selection_owner(window, clipboard).unwrap();

    let png = engine.atoms().intern("image/png").unwrap();
    let first = CancelToken::with_timeout(Duration::from_millis(50));
    assert_eq!(
        engine.fetch_format(Board::Default, png, &first),
        Err(ClipboardError::DeadlineExceeded)
    );

    let server = thread::spawn(move || {
        // Hold the abandoned request until the retry is in flight, then
        // answer both: the stale one first
        let abandoned = next_request(&rogue).expect("request");
        let retry = next_request(&rogue).expect("request");
        assert_eq!(abandoned.target, retry.target);
        assert_ne!(abandoned.property, retry.property);

        for (request, body) in [(abandoned, b"stale png".to_vec()), (retry, b"fresh png".to_vec())] {
            rogue
                .change_property(request.requestor, request.property, request.target, 8, &body)
                .unwrap();
            rogue
                .send_selection_notify(&SelectionNotify {
                    time: request.time,
                    requestor: request.requestor,
                    selection: request.selection,
                    target: request.target,
                    property: request.property,
                })
                .unwrap();
        }
        rogue
    });

    assert_eq!(
        engine.fetch_format(Board::Default, png, &timeout()).unwrap(),
        b"fresh png".to_vec()
    );
    drop(server.join().unwrap());
}

#[test]
fn test_concurrent_fetches_on_one_board() {
    let desk = Desk::new();
    desk.owner
        .copy(
            Snapshot::builder()
                .text("text body")
                .bytes("image/png", vec![42u8; 3000])
                .build(),
        )
        .unwrap();
    let engine = desk.reader.engine().unwrap();
    let text = engine.atoms().intern("text/plain;charset=utf-8").unwrap();
    let png = engine.atoms().intern("image/png").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let format = if i % 2 == 0 { text } else { png };
                (format, engine.fetch_format(Board::Default, format, &timeout()))
            })
        })
        .collect();

    for handle in handles {
        let (format, result) = handle.join().unwrap();
        let bytes = result.unwrap();
        if format == text {
            assert_eq!(bytes, b"text body".to_vec());
        } else {
            assert_eq!(bytes, vec![42u8; 3000]);
        }
    }
}

#[test]
fn test_connection_loss_reports_unavailable() {
    let desk = Desk::new();
    let engine = desk.reader.engine().unwrap();
    desk.display.shutdown();

    assert!(super::common::wait_until(Duration::from_secs(2), || !engine
        .is_running()));
    assert!(matches!(
        desk.reader.paste(&timeout()),
        Err(ClipboardError::ConnectionUnavailable(_))
    ));
    assert!(matches!(
        desk.reader.copy_text("x"),
        Err(ClipboardError::ConnectionUnavailable(_))
    ));
}

#[test]
fn test_owner_refuses_targets() {
    let desk = Desk::new();
    let rogue = desk.display.connect().unwrap();
    let window = rogue.create_window("refuser").unwrap();
    let clipboard = rogue.intern_atom("CLIPBOARD").unwrap();
    rogue.set_selection_owner(window, clipboard).unwrap();

    let server = thread::spawn(move || {
        let request = next_request(&rogue).expect("request");
        rogue
            .send_selection_notify(&SelectionNotify {
                time: request.time,
                requestor: request.requestor,
                selection: request.selection,
                target: request.target,
                property: NONE,
            })
            .unwrap();
        rogue
    });

    assert_eq!(desk.reader.paste(&timeout()).err(), Some(ClipboardError::NotFound));
    drop(server.join().unwrap());
}

fn length_for(choice: u8, chunk: usize) -> usize {
    match choice {
        0 => 0,
        1 => 1,
        2 => chunk - 1,
        3 => chunk,
        4 => chunk + 1,
        _ => 5 * chunk + 37,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_chunked_reads_reassemble(units in 1usize..32, choice in 0u8..6, seed in any::<u8>()) {
        let chunk = units * 4;
        let len = length_for(choice, chunk);
        let payload: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();

        let desk = Desk::with_config(ClipboardConfig::default().with_chunk_size(chunk));
        desk.owner
            .copy(Snapshot::builder().bytes("application/octet-stream", payload.clone()).build())
            .unwrap();

        let cancel = timeout();
        let snapshot = desk.reader.paste(&cancel).unwrap();
        prop_assert_eq!(snapshot.get_format("application/octet-stream", &cancel).unwrap(), payload);
    }
}
