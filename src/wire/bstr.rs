//! Length-prefixed native strings (`BSTR`).
//!
//! A native string is a pointer to UTF-16 code units, preceded by a 32-bit byte length and
//! followed by a NUL terminator. A null pointer is a valid, empty-or-absent string. Strings
//! handed to native code are allocated here and freed here, so both sides agree on layout.

use std::{
    alloc::{self, Layout},
    ptr::{self, NonNull},
};

use widestring::{U16Str, U16String};

const PREFIX: usize = std::mem::size_of::<u32>();
const UNIT: usize = std::mem::size_of::<u16>();

fn layout(units: usize) -> Option<Layout> {
    let size = units.checked_mul(UNIT)?.checked_add(PREFIX + UNIT)?;
    Layout::from_size_align(size, PREFIX).ok()
}

/// Allocates a native string holding a copy of `units`.
///
/// Returns a null pointer if the length cannot be represented.
#[must_use]
pub fn alloc_units(units: &[u16]) -> *mut u16 {
    let Ok(byte_len) = u32::try_from(units.len() * UNIT) else {
        return ptr::null_mut();
    };
    let Some(layout) = layout(units.len()) else {
        return ptr::null_mut();
    };

    // SAFETY: the layout is non-zero sized, the prefix is 4-byte aligned and the unit area
    // directly follows it with room for the terminator
    unsafe {
        let block = alloc::alloc(layout);
        if block.is_null() {
            alloc::handle_alloc_error(layout);
        }
        block.cast::<u32>().write(byte_len);
        let text = block.add(PREFIX).cast::<u16>();
        ptr::copy_nonoverlapping(units.as_ptr(), text, units.len());
        text.add(units.len()).write(0);
        text
    }
}

/// Allocates a native string holding `text`.
#[must_use]
pub fn alloc_string(text: &str) -> *mut u16 {
    let wide = U16String::from_str(text);
    alloc_units(wide.as_slice())
}

/// Length in code units of a native string; zero for null.
///
/// # Safety
/// `bstr` must be null or a live string allocated by [`alloc_units`] / [`alloc_string`].
#[must_use]
pub unsafe fn string_len(bstr: *const u16) -> usize {
    if bstr.is_null() {
        return 0;
    }
    let byte_len = bstr.cast::<u8>().sub(PREFIX).cast::<u32>().read();
    byte_len as usize / UNIT
}

/// Copies a native string into an owned `String`, replacing invalid UTF-16 with U+FFFD.
///
/// # Safety
/// `bstr` must be null or a live string allocated by [`alloc_units`] / [`alloc_string`].
#[must_use]
pub unsafe fn to_string(bstr: *const u16) -> Option<String> {
    if bstr.is_null() {
        return None;
    }
    let text = U16Str::from_ptr(bstr, string_len(bstr));
    Some(text.to_string_lossy())
}

/// Frees a native string; null is ignored.
///
/// # Safety
/// `bstr` must be null or a live string allocated by [`alloc_units`] / [`alloc_string`] that
/// is not used afterwards.
pub unsafe fn free_string(bstr: *mut u16) {
    if bstr.is_null() {
        return;
    }
    let units = string_len(bstr);
    if let Some(layout) = layout(units) {
        alloc::dealloc(bstr.cast::<u8>().sub(PREFIX), layout);
    }
}

/// An owned native string, freed on drop.
#[derive(Debug)]
pub struct BString(NonNull<u16>);

impl BString {
    /// Allocates a native string holding `text`.
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        NonNull::new(alloc_string(text)).map(BString)
    }

    /// Takes ownership of a raw native string.
    ///
    /// # Safety
    /// `raw` must be null or a live string allocated by this module that nothing else frees.
    pub unsafe fn from_raw(raw: *mut u16) -> Option<Self> {
        NonNull::new(raw).map(BString)
    }

    /// Gives up ownership and returns the raw pointer.
    #[must_use]
    pub fn into_raw(self) -> *mut u16 {
        let raw = self.0.as_ptr();
        std::mem::forget(self);
        raw
    }

    /// The raw pointer, still owned by `self`.
    #[must_use]
    pub fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// Length in code units.
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: owned and live
        unsafe { string_len(self.0.as_ptr()) }
    }

    /// Returns `true` for a zero-length string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text, with invalid UTF-16 replaced.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        // SAFETY: owned and live
        unsafe { to_string(self.0.as_ptr()) }.unwrap_or_default()
    }
}

impl Drop for BString {
    fn drop(&mut self) {
        // SAFETY: owned and not yet freed
        unsafe { free_string(self.0.as_ptr()) }
    }
}
