//! Single-dimension safe arrays of wire values (`SAFEARRAY` of `VARIANT`).
//!
//! Array arguments are passed as `VT_ARRAY | VT_VARIANT`: a descriptor with one bound, the
//! element size and a pointer to contiguous wire values. As with the native allocator, the
//! element type is stored in the four bytes directly preceding the descriptor.

use std::{ffi::c_void, mem::offset_of};

use crate::{
    wire::{VarType, Variant},
    Result,
};

/// Elements are wire values.
pub const FADF_VARIANT: u16 = 0x0800;
/// The element type is stored in front of the descriptor.
pub const FADF_HAVEVARTYPE: u16 = 0x0080;

/// Bounds of one array dimension.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeArrayBound {
    /// Number of elements
    pub elements: u32,
    /// Index of the first element
    pub lower_bound: i32,
}

/// A safe array descriptor with one dimension.
#[repr(C)]
#[derive(Debug)]
pub struct SafeArray {
    /// Number of dimensions
    pub dims: u16,
    /// `FADF_*` feature flags
    pub features: u16,
    /// Size of one element in bytes
    pub element_size: u32,
    /// Lock count
    pub locks: u32,
    /// Pointer to the elements
    pub data: *mut c_void,
    /// Bounds of the single dimension
    pub bounds: [SafeArrayBound; 1],
}

#[repr(C)]
struct SafeArrayBlock {
    _pad: u32,
    element_type: u32,
    array: SafeArray,
}

const _: () = assert!(offset_of!(SafeArrayBlock, array) - offset_of!(SafeArrayBlock, element_type) == 4);

/// Allocates a vector of wire values; ownership of `elements` moves into the array.
#[must_use]
pub fn from_variants(elements: Vec<Variant>) -> *mut SafeArray {
    let count = elements.len();
    let data = Box::into_raw(elements.into_boxed_slice()).cast::<Variant>();
    let block = Box::new(SafeArrayBlock {
        _pad: 0,
        element_type: u32::from(VarType::VARIANT.raw()),
        array: SafeArray {
            dims: 1,
            features: FADF_VARIANT | FADF_HAVEVARTYPE,
            element_size: std::mem::size_of::<Variant>() as u32,
            locks: 0,
            data: data.cast(),
            bounds: [SafeArrayBound {
                elements: count as u32,
                lower_bound: 0,
            }],
        },
    });
    let block = Box::into_raw(block);
    // SAFETY: block was just allocated
    unsafe { std::ptr::addr_of_mut!((*block).array) }
}

/// The element type stored in front of the descriptor.
///
/// # Safety
/// `array` must be a live descriptor created by [`from_variants`].
#[must_use]
pub unsafe fn element_type(array: *const SafeArray) -> VarType {
    if (*array).features & FADF_HAVEVARTYPE == 0 {
        return VarType::EMPTY;
    }
    let element_type = array.cast::<u8>().sub(4).cast::<u32>().read();
    VarType::from_raw(element_type as u16)
}

/// The elements of a one-dimensional array of wire values.
///
/// # Safety
/// `array` must be a live descriptor created by [`from_variants`]; the returned slice must
/// not outlive it.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for other shapes or element types.
pub unsafe fn variants<'a>(array: *const SafeArray) -> Result<&'a [Variant]> {
    let descriptor = &*array;
    if descriptor.dims != 1 {
        return Err(malformed_error!(
            "Only single-dimension arrays are supported, got {} dimensions",
            descriptor.dims
        ));
    }
    if descriptor.features & FADF_VARIANT == 0
        || descriptor.element_size as usize != std::mem::size_of::<Variant>()
    {
        return Err(malformed_error!(
            "Array elements are not wire values (element type {})",
            element_type(array)
        ));
    }
    let count = descriptor.bounds[0].elements as usize;
    if count == 0 || descriptor.data.is_null() {
        return Ok(&[]);
    }
    Ok(std::slice::from_raw_parts(descriptor.data.cast::<Variant>(), count))
}

/// Clears every element and frees the array.
///
/// # Safety
/// `array` must be null or a live descriptor created by [`from_variants`] that is not used
/// afterwards.
pub unsafe fn destroy(array: *mut SafeArray) {
    if array.is_null() {
        return;
    }
    let block = array
        .cast::<u8>()
        .sub(offset_of!(SafeArrayBlock, array))
        .cast::<SafeArrayBlock>();
    let block = Box::from_raw(block);
    let count = block.array.bounds[0].elements as usize;
    let data = block.array.data.cast::<Variant>();
    if !data.is_null() {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, count)));
    }
}
