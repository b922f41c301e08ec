// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn snapshot_str(screen: &Screen) -> String {
    String::from_utf8(screen.snapshot_ansi()).unwrap()
}

#[test]
fn feed_plain_text() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"hello world");
    assert!(snapshot_str(&screen).contains("hello world"));
}

#[test]
fn snapshot_starts_with_clear_and_home() {
    let screen = Screen::new(10, 3);
    let snap = snapshot_str(&screen);
    assert!(snap.starts_with("\x1b[2J\x1b[H"));
}

#[test]
fn snapshot_positions_cursor_one_based() {
    let mut screen = Screen::new(20, 5);
    screen.feed(b"ab");
    let snap = snapshot_str(&screen);
    // Cursor sits after "ab": row 0, col 2 → CSI 1;3H
    assert!(snap.ends_with("\x1b[1;3H"), "snapshot ends with {:?}", &snap[snap.len() - 12..]);
}

#[test]
fn snapshot_carries_indexed_colors() {
    let mut screen = Screen::new(20, 3);
    screen.feed(b"\x1b[38;5;196mred\x1b[0m plain");
    let snap = snapshot_str(&screen);
    assert!(snap.contains(";38;5;196m"), "snapshot: {snap:?}");
    assert!(snap.contains("red"));
    assert!(snap.contains("plain"));
}

#[test]
fn snapshot_rows_separated_by_crlf() {
    let mut screen = Screen::new(10, 3);
    screen.feed(b"one\r\ntwo");
    let snap = snapshot_str(&screen);
    assert_eq!(snap.matches("\r\n").count(), 2); // 3 rows → 2 separators
}

#[test]
fn split_utf8_across_feeds() {
    let mut screen = Screen::new(20, 3);
    let heart = "♥".as_bytes(); // 3 bytes
    screen.feed(&heart[..1]);
    screen.feed(&heart[1..]);
    assert!(snapshot_str(&screen).contains('♥'));
}

#[test]
fn resize_changes_dimensions() {
    let mut screen = Screen::new(80, 24);
    screen.resize(100, 40);
    assert_eq!(screen.size(), (100, 40));
}

#[test]
fn resize_floors_at_one() {
    let mut screen = Screen::new(80, 24);
    screen.resize(0, 0);
    assert_eq!(screen.size(), (1, 1));
}

#[test]
fn cursor_tracks_moves() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"\x1b[5;10H");
    assert_eq!(screen.cursor(), (4, 9));
}
