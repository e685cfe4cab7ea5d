//! String building on top of an arena.
//!
//! Every helper returns a `&mut str` borrowed from the arena; the bytes
//! stay valid until the arena is rolled back below them.

use std::ffi::CStr;
use std::fmt::{self, Write as _};

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::raw;

impl Arena {
    /// Copy `s` into the arena.
    pub fn push_str(&mut self, s: &str) -> Result<&mut str, ArenaError> {
        self.concat(&[s])
    }

    /// Copy `s` into the arena followed by a NUL byte, for handing to C.
    ///
    /// An interior NUL ends the C string early.
    pub fn push_cstr(&mut self, s: &str) -> Result<&CStr, ArenaError> {
        let bytes = self.alloc_bytes(s.len() + 1)?;
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        // The zeroed allocation always ends in NUL.
        Ok(CStr::from_bytes_until_nul(bytes).unwrap_or_default())
    }

    /// Concatenate `parts` into one arena string.
    pub fn concat(&mut self, parts: &[&str]) -> Result<&mut str, ArenaError> {
        let len = parts.iter().map(|p| p.len()).sum();
        let bytes = self.alloc_bytes_non_zero(len)?;
        Ok(raw::concat_into(bytes, parts.iter().copied()))
    }

    /// `prefix`, then `parts` separated by `separator`, then `suffix`.
    ///
    /// ```
    /// # use spork_arena::{Arena, ArenaConfig};
    /// let mut arena = Arena::new(ArenaConfig::new(1 << 16, 0)).unwrap();
    /// let s = arena.join(&["a", "b", "c"], "[", ", ", "]").unwrap();
    /// assert_eq!(s, "[a, b, c]");
    /// ```
    pub fn join(
        &mut self,
        parts: &[&str],
        prefix: &str,
        separator: &str,
        suffix: &str,
    ) -> Result<&mut str, ArenaError> {
        let separators = parts.len().saturating_sub(1) * separator.len();
        let len = prefix.len()
            + parts.iter().map(|p| p.len()).sum::<usize>()
            + separators
            + suffix.len();
        let pieces = std::iter::once(prefix)
            .chain(parts.iter().enumerate().flat_map(|(i, part)| {
                let sep = if i == 0 { "" } else { separator };
                [sep, *part]
            }))
            .chain(std::iter::once(suffix));
        let bytes = self.alloc_bytes_non_zero(len)?;
        Ok(raw::concat_into(bytes, pieces))
    }

    /// Format `args` directly into the arena.
    ///
    /// Measures first, then writes in place. Use with `format_args!`:
    /// `arena.push_fmt(format_args!("{x}-{y}"))`.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<&mut str, ArenaError> {
        if let Some(s) = args.as_str() {
            return self.push_str(s);
        }
        let mut counter = Counter(0);
        // Formatting into a counter never fails on its own; a failing
        // `Display` impl leaves whatever length it reached.
        let _ = counter.write_fmt(args);
        let len = counter.0;

        let before = self.pos();
        let written = {
            let mut writer = SliceWriter {
                buf: self.alloc_bytes_non_zero(len)?,
                at: 0,
            };
            writer.write_fmt(args).is_ok()
                && writer.at == len
                && std::str::from_utf8(writer.buf).is_ok()
        };
        if !written {
            // The two passes disagreed (a `Display` impl that is not
            // deterministic); fall back to an owned copy.
            self.pop_to(before);
            let owned = args.to_string();
            return self.push_str(&owned);
        }
        Ok(std::str::from_utf8_mut(self.tail_bytes(len)).unwrap_or_default())
    }

    /// Copy `s` with every space, tab and newline removed.
    pub fn push_str_stripped(&mut self, s: &str) -> Result<&mut str, ArenaError> {
        let is_space = |c: char| matches!(c, ' ' | '\t' | '\n');
        let len = s.len() - s.matches(is_space).count();
        let bytes = self.alloc_bytes_non_zero(len)?;
        Ok(raw::concat_into(bytes, s.split(is_space)))
    }
}

struct Counter(usize);

impl fmt::Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.at.checked_add(s.len()).ok_or(fmt::Error)?;
        let dst = self.buf.get_mut(self.at..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.at = end;
        Ok(())
    }
}
