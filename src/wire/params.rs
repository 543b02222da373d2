//! Packed invocation arguments (`DISPPARAMS`) and exception information (`EXCEPINFO`).
//!
//! [`DispParams`] is the argument block handed to `Invoke`. Arguments are stored in reverse
//! order: the last logical argument is at index 0. Named arguments come first in the array,
//! matched index-for-index with the member ids in `named_args`.
//!
//! [`ExcepInfo`] is filled by an object that returns `DISP_E_EXCEPTION`. Its strings are native
//! strings owned by the structure and freed when it is dropped or converted with
//! [`ExcepInfo::take_exception`].

use std::{ffi::c_void, ptr, slice};

use crate::{
    native::{DispId, HResult},
    wire::{bstr, Variant},
    ComException,
};

/// The argument block of an invocation.
#[repr(C)]
#[derive(Debug)]
pub struct DispParams {
    args: *mut Variant,
    named_args: *mut DispId,
    arg_count: u32,
    named_arg_count: u32,
}

impl DispParams {
    /// Creates an argument block over caller-owned storage.
    ///
    /// `args` must already be in reverse order; `named_args` holds the member ids of the first
    /// `named_args.len()` entries of `args`.
    ///
    /// # Panics
    /// Panics in debug builds if there are more named ids than arguments.
    #[must_use]
    pub fn new(args: &mut [Variant], named_args: &mut [DispId]) -> Self {
        debug_assert!(named_args.len() <= args.len());
        DispParams {
            args: if args.is_empty() {
                ptr::null_mut()
            } else {
                args.as_mut_ptr()
            },
            named_args: if named_args.is_empty() {
                ptr::null_mut()
            } else {
                named_args.as_mut_ptr()
            },
            arg_count: args.len() as u32,
            named_arg_count: named_args.len() as u32,
        }
    }

    /// An argument block without arguments.
    #[must_use]
    pub fn empty() -> Self {
        DispParams {
            args: ptr::null_mut(),
            named_args: ptr::null_mut(),
            arg_count: 0,
            named_arg_count: 0,
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.arg_count as usize
    }

    /// Number of named arguments.
    #[must_use]
    pub fn named_arg_count(&self) -> usize {
        self.named_arg_count as usize
    }

    /// The arguments, in reverse order.
    #[must_use]
    pub fn args(&self) -> &[Variant] {
        if self.args.is_null() {
            return &[];
        }
        // SAFETY: `args` points to `arg_count` wire values for the lifetime of the block
        unsafe { slice::from_raw_parts(self.args, self.arg_count as usize) }
    }

    /// The arguments, in reverse order, for writing by-reference results.
    pub fn args_mut(&mut self) -> &mut [Variant] {
        if self.args.is_null() {
            return &mut [];
        }
        // SAFETY: as above, and `&mut self` guarantees exclusive access
        unsafe { slice::from_raw_parts_mut(self.args, self.arg_count as usize) }
    }

    /// Member ids of the named arguments.
    #[must_use]
    pub fn named_ids(&self) -> &[DispId] {
        if self.named_args.is_null() {
            return &[];
        }
        // SAFETY: `named_args` points to `named_arg_count` ids for the lifetime of the block
        unsafe { slice::from_raw_parts(self.named_args, self.named_arg_count as usize) }
    }

    /// The positional argument at logical position `index`.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&Variant> {
        let positional = self.arg_count().checked_sub(self.named_arg_count())?;
        if index >= positional {
            return None;
        }
        self.args().get(self.arg_count() - 1 - index)
    }

    /// The named argument bound to `member`.
    #[must_use]
    pub fn named(&self, member: DispId) -> Option<&Variant> {
        let slot = self.named_ids().iter().position(|id| *id == member)?;
        self.args().get(slot)
    }
}

/// Signature of the deferred fill-in callback of [`ExcepInfo`].
pub type DeferredFillIn = unsafe extern "system" fn(*mut ExcepInfo) -> i32;

/// Exception information filled in by an object that raised an application exception.
#[repr(C)]
#[derive(Debug)]
pub struct ExcepInfo {
    /// Error code; used only when `scode` is zero
    pub code: u16,
    reserved: u16,
    /// Native string naming the component that raised the exception
    pub source: *mut u16,
    /// Native string describing the failure
    pub description: *mut u16,
    /// Native string holding the help file path
    pub help_file: *mut u16,
    /// Help context within the help file
    pub help_context: u32,
    reserved_ptr: *mut c_void,
    /// Callback that fills in the remaining fields on demand
    pub deferred_fill_in: Option<DeferredFillIn>,
    /// Status code describing the failure
    pub scode: i32,
}

impl ExcepInfo {
    /// Creates an empty structure.
    #[must_use]
    pub fn new() -> Self {
        ExcepInfo {
            code: 0,
            reserved: 0,
            source: ptr::null_mut(),
            description: ptr::null_mut(),
            help_file: ptr::null_mut(),
            help_context: 0,
            reserved_ptr: ptr::null_mut(),
            deferred_fill_in: None,
            scode: 0,
        }
    }

    /// Fills the structure; used by objects raising an exception.
    ///
    /// Previously stored strings are freed.
    pub fn fill(
        &mut self,
        scode: HResult,
        source: Option<&str>,
        description: Option<&str>,
        help_file: Option<&str>,
        help_context: u32,
    ) {
        self.free_strings();
        self.scode = scode.0;
        self.source = source.map_or(ptr::null_mut(), bstr::alloc_string);
        self.description = description.map_or(ptr::null_mut(), bstr::alloc_string);
        self.help_file = help_file.map_or(ptr::null_mut(), bstr::alloc_string);
        self.help_context = help_context;
    }

    /// Converts into an owned exception, running the deferred fill-in first and freeing the
    /// native strings.
    pub fn take_exception(&mut self) -> ComException {
        if let Some(fill_in) = self.deferred_fill_in.take() {
            // SAFETY: the callback was installed by the object for exactly this structure
            unsafe {
                fill_in(ptr::from_mut(self));
            }
        }

        let code = if self.scode != 0 {
            HResult(self.scode)
        } else {
            HResult(i32::from(self.code))
        };

        // SAFETY: the strings were allocated by the object through this crate's allocator
        let (source, description, help_file) = unsafe {
            (
                bstr::to_string(self.source),
                bstr::to_string(self.description),
                bstr::to_string(self.help_file),
            )
        };
        let help_link = help_file.filter(|file| !file.is_empty()).map(|file| {
            if self.help_context != 0 {
                format!("{file}#{}", self.help_context)
            } else {
                file
            }
        });
        self.free_strings();

        ComException {
            code,
            description,
            source,
            help_link,
        }
    }

    fn free_strings(&mut self) {
        for field in [&mut self.source, &mut self.description, &mut self.help_file] {
            // SAFETY: each field is null or a native string owned by this structure
            unsafe { bstr::free_string(*field) };
            *field = ptr::null_mut();
        }
    }
}

impl Default for ExcepInfo {
    fn default() -> Self {
        ExcepInfo::new()
    }
}

impl Drop for ExcepInfo {
    fn drop(&mut self) {
        self.free_strings();
    }
}

enum Storage {
    Empty,
    One([Variant; 1]),
    Two([Variant; 2]),
    Four([Variant; 4]),
    Eight([Variant; 8]),
    Heap(Box<[Variant]>),
}

/// Contiguous storage for the wire values of one invocation.
///
/// Small argument counts are kept inline; larger ones go to the heap. Every slot starts out
/// empty and is cleared when the buffer is dropped.
pub(crate) struct ArgBuffer {
    storage: Storage,
    len: usize,
}

impl ArgBuffer {
    pub(crate) fn new(len: usize) -> Self {
        let storage = match len {
            0 => Storage::Empty,
            1 => Storage::One(std::array::from_fn(|_| Variant::new())),
            2 => Storage::Two(std::array::from_fn(|_| Variant::new())),
            3..=4 => Storage::Four(std::array::from_fn(|_| Variant::new())),
            5..=8 => Storage::Eight(std::array::from_fn(|_| Variant::new())),
            _ => Storage::Heap((0..len).map(|_| Variant::new()).collect()),
        };
        ArgBuffer { storage, len }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Variant] {
        let all: &mut [Variant] = match &mut self.storage {
            Storage::Empty => &mut [],
            Storage::One(slots) => slots.as_mut_slice(),
            Storage::Two(slots) => slots.as_mut_slice(),
            Storage::Four(slots) => slots.as_mut_slice(),
            Storage::Eight(slots) => slots.as_mut_slice(),
            Storage::Heap(slots) => &mut slots[..],
        };
        &mut all[..self.len]
    }

    /// Clears every slot, releasing what the wire values own.
    pub(crate) fn clear(&mut self) {
        for slot in self.as_mut_slice() {
            slot.clear();
        }
    }
}
