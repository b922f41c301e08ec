// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;

/// Live VT100 state for one session, backed by an avt virtual terminal.
///
/// Raw PTY bytes are fed in; late joiners get an ANSI repaint of the
/// current screen via [`Screen::snapshot_ansi`].
pub struct Screen {
    vt: avt::Vt,
    /// Buffer for incomplete UTF-8 trailing bytes between `feed()` calls.
    utf8_buf: [u8; 3],
    utf8_buf_len: u8,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cols, rows) = self.vt.size();
        f.debug_struct("Screen").field("cols", &cols).field("rows", &rows).finish()
    }
}

/// Returns the number of trailing bytes that form an incomplete UTF-8
/// sequence. Scans backwards for a leading byte whose expected length
/// exceeds the bytes available; 0 when the tail is complete or ASCII.
fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xC0 {
            let expected = if byte < 0xE0 {
                2
            } else if byte < 0xF0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
        // Continuation byte — keep scanning backwards.
    }
    0
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            vt: avt::Vt::new(cols.max(1) as usize, rows.max(1) as usize),
            utf8_buf: [0; 3],
            utf8_buf_len: 0,
        }
    }

    /// Feed raw PTY bytes into the virtual terminal.
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        // Prepend any buffered incomplete UTF-8 bytes from the previous call.
        let buf_len = self.utf8_buf_len as usize;
        let owned: Vec<u8>;
        let input = if buf_len == 0 {
            data
        } else {
            owned = [&self.utf8_buf[..buf_len], data].concat();
            self.utf8_buf_len = 0;
            &owned
        };

        let tail = incomplete_utf8_tail_len(input);
        let (to_feed, to_buffer) = input.split_at(input.len() - tail);

        if !to_buffer.is_empty() {
            self.utf8_buf[..to_buffer.len()].copy_from_slice(to_buffer);
            self.utf8_buf_len = to_buffer.len() as u8;
        }

        if !to_feed.is_empty() {
            let s = String::from_utf8_lossy(to_feed);
            let _ = self.vt.feed_str(&s);
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let _ = self.vt.resize(cols.max(1) as usize, rows.max(1) as usize);
    }

    pub fn size(&self) -> (u16, u16) {
        let (cols, rows) = self.vt.size();
        (cols as u16, rows as u16)
    }

    /// Cursor position as (row, col), zero-based.
    pub fn cursor(&self) -> (u16, u16) {
        let cursor = self.vt.cursor();
        (cursor.row as u16, cursor.col as u16)
    }

    /// Repaint the visible screen as ANSI bytes for a newly-connected
    /// viewer: clear + home, every row with minimal SGR transitions,
    /// final reset, cursor repositioned.
    pub fn snapshot_ansi(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("\x1b[2J\x1b[H");

        let mut first = true;
        for line in self.vt.view() {
            if !first {
                out.push_str("\r\n");
            }
            first = false;
            line_to_ansi(line, &mut out);
        }

        out.push_str("\x1b[0m");
        let (row, col) = self.cursor();
        let _ = write!(out, "\x1b[{};{}H", row + 1, col + 1);
        out.into_bytes()
    }
}

/// Append one avt line as ANSI, grouping runs of identically-styled cells
/// so each style change costs a single reset-and-set sequence.
fn line_to_ansi(line: &avt::Line, out: &mut String) {
    let mut styled = false;
    for cells in line.chunks(|c1, c2| c1.pen() != c2.pen()) {
        let pen = cells[0].pen();
        if pen.is_default() {
            if styled {
                out.push_str("\x1b[0m");
                styled = false;
            }
        } else {
            pen_to_sgr(pen, out);
            styled = true;
        }
        for cell in &cells {
            out.push(cell.char());
        }
    }
    if styled {
        out.push_str("\x1b[0m");
    }
}

/// Emit a reset-and-set SGR sequence for `pen`. Indexed colors use the
/// 256-color forms `38;5;N` / `48;5;N`; RGB pens pass through as
/// truecolor.
fn pen_to_sgr(pen: &avt::Pen, out: &mut String) {
    out.push_str("\x1b[0");
    if let Some(c) = pen.foreground() {
        color_sgr(&c, 38, out);
    }
    if let Some(c) = pen.background() {
        color_sgr(&c, 48, out);
    }
    if pen.is_bold() {
        out.push_str(";1");
    }
    if pen.is_italic() {
        out.push_str(";3");
    }
    if pen.is_underline() {
        out.push_str(";4");
    }
    if pen.is_inverse() {
        out.push_str(";7");
    }
    out.push('m');
}

fn color_sgr(c: &avt::Color, base: u8, out: &mut String) {
    match c {
        avt::Color::Indexed(n) => {
            let _ = write!(out, ";{base};5;{n}");
        }
        avt::Color::RGB(rgb) => {
            let _ = write!(out, ";{base};2;{};{};{}", rgb.r, rgb.g, rgb.b);
        }
    }
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
