//! Numeric-aware ordering so `page2` sorts before `page10`.

use std::cmp::Ordering;
use std::ffi::OsStr;

/// Compare two strings in natural order: digit runs compare by value,
/// everything else case-insensitively. Ties fall back to a plain comparison
/// so the order is total and deterministic.
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let mut a = Chunks::new(left);
    let mut b = Chunks::new(right);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return left.cmp(right),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunks(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

pub fn natural_cmp_os(left: &OsStr, right: &OsStr) -> Ordering {
    natural_cmp(&left.to_string_lossy(), &right.to_string_lossy())
}

fn compare_chunks(x: &str, y: &str) -> Ordering {
    let x_digits = x.starts_with(|ch: char| ch.is_ascii_digit());
    let y_digits = y.starts_with(|ch: char| ch.is_ascii_digit());
    match (x_digits, y_digits) {
        (true, true) => {
            let xt = x.trim_start_matches('0');
            let yt = y.trim_start_matches('0');
            xt.len()
                .cmp(&yt.len())
                .then_with(|| xt.cmp(yt))
                .then_with(|| x.len().cmp(&y.len()))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let xl = x.chars().flat_map(char::to_lowercase);
            let yl = y.chars().flat_map(char::to_lowercase);
            xl.cmp(yl)
        }
    }
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(value: &'a str) -> Self {
        Self { rest: value }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() != digits)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}
