//! Marshalling of arguments and results.
//!
//! Every variable-length result is a fresh allocation whose ownership passes to
//! the caller together with an element count; the caller releases it with the
//! matching `free*` function. Fixed-size results are written into caller arrays.

use crate::error::FfiError;
use helios::core::context::Uuid;
use helios::core::geometry::{RgbColor, RgbaColor, SphericalCoord, Vec2, Vec3};
use std::ffi::{CStr, CString, c_char};
use std::ptr;

/// Borrows a NUL-terminated UTF-8 argument.
pub(crate) fn c_str<'a>(value: *const c_char, what: &str) -> Result<&'a str, FfiError> {
    if value.is_null() {
        return Err(FfiError::null(what));
    }
    unsafe { CStr::from_ptr(value) }
        .to_str()
        .map_err(|_| FfiError::invalid(format!("{what} is not valid UTF-8")))
}

/// Borrows `len` elements; a null pointer is accepted only for `len == 0`.
pub(crate) fn slice<'a, T>(values: *const T, len: usize, what: &str) -> Result<&'a [T], FfiError> {
    if len == 0 {
        return Ok(&[]);
    }
    if values.is_null() {
        return Err(FfiError::null(what));
    }
    Ok(unsafe { std::slice::from_raw_parts(values, len) })
}

pub(crate) fn non_empty_slice<'a, T>(values: *const T, len: usize, what: &str) -> Result<&'a [T], FfiError> {
    if len == 0 {
        return Err(FfiError::invalid(format!("{what} must not be empty")));
    }
    slice(values, len, what)
}

pub(crate) fn uuid_slice<'a>(uuids: *const Uuid, count: usize) -> Result<&'a [Uuid], FfiError> {
    non_empty_slice(uuids, count, "UUID array")
}

/// Reads an array of label pointers.
pub(crate) fn c_str_array<'a>(values: *const *const c_char, len: usize, what: &str) -> Result<Vec<&'a str>, FfiError> {
    non_empty_slice(values, len, what)?
        .iter()
        .map(|value| c_str(*value, what))
        .collect()
}

pub(crate) fn read<const N: usize, T: Copy>(values: *const T, what: &str) -> Result<[T; N], FfiError> {
    let values = unsafe { values.cast::<[T; N]>().as_ref() }.ok_or_else(|| FfiError::null(what))?;
    Ok(*values)
}

pub(crate) fn read_vec3(values: *const f32, what: &str) -> Result<Vec3, FfiError> {
    read::<3, f32>(values, what).map(Vec3::from)
}

pub(crate) fn read_vec2(values: *const f32, what: &str) -> Result<Vec2, FfiError> {
    read::<2, f32>(values, what).map(Vec2::from)
}

/// Reads a `(radius, elevation, azimuth)` rotation triple.
pub(crate) fn read_rotation(values: *const f32) -> Result<SphericalCoord, FfiError> {
    let [radius, elevation, azimuth] = read::<3, f32>(values, "rotation")?;
    Ok(SphericalCoord::new(radius, elevation, azimuth))
}

pub(crate) fn read_rgb(values: *const f32) -> Result<RgbColor, FfiError> {
    read::<3, f32>(values, "color").map(RgbColor::from_array)
}

pub(crate) fn read_rgba(values: *const f32) -> Result<RgbaColor, FfiError> {
    read::<4, f32>(values, "color").map(RgbaColor::from_array)
}

/// Flat `3 · n` floats as `n` points.
pub(crate) fn read_points(values: *const f32, count: usize, what: &str) -> Result<Vec<Vec3>, FfiError> {
    let flat = non_empty_slice(values, count * 3, what)?;
    Ok(flat.chunks_exact(3).map(Vec3::from_column_slice).collect())
}

/// Checks a fixed-size output array up front so a null pointer is reported
/// before the engine is touched.
pub(crate) fn out_array<'a, const N: usize, T>(values: *mut T, what: &str) -> Result<&'a mut [T; N], FfiError> {
    unsafe { values.cast::<[T; N]>().as_mut() }.ok_or_else(|| FfiError::null(what))
}

pub(crate) fn out_value<'a, T>(value: *mut T, what: &str) -> Result<&'a mut T, FfiError> {
    unsafe { value.as_mut() }.ok_or_else(|| FfiError::null(what))
}

/// Validates a count out-parameter and zeroes it; the count is only set to the
/// real length once the result has been produced.
pub(crate) fn count_out<'a>(count: *mut usize) -> Result<&'a mut usize, FfiError> {
    let count = out_value(count, "count")?;
    *count = 0;
    Ok(count)
}

/// Transfers `values` to the caller. Empty results are returned as null.
pub(crate) fn owned_array<T>(values: Vec<T>, count: &mut usize) -> *mut T {
    *count = values.len();
    if values.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(values.into_boxed_slice()).cast::<T>()
}

fn to_c_string(value: &str) -> CString {
    CString::new(value.replace('\0', " ")).unwrap_or_default()
}

pub(crate) fn owned_string(value: &str) -> *mut c_char {
    to_c_string(value).into_raw()
}

pub(crate) fn owned_string_array(values: Vec<String>, count: &mut usize) -> *mut *mut c_char {
    let pointers = values.iter().map(|v| owned_string(v)).collect();
    owned_array(pointers, count)
}

fn free_array<T>(values: *mut T, count: usize) -> Option<Box<[T]>> {
    if values.is_null() {
        return None;
    }
    Some(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(values, count)) })
}

#[unsafe(no_mangle)]
pub extern "C" fn freeUIntArray(values: *mut u32, count: usize) {
    drop(free_array(values, count));
}

#[unsafe(no_mangle)]
pub extern "C" fn freeIntArray(values: *mut i32, count: usize) {
    drop(free_array(values, count));
}

#[unsafe(no_mangle)]
pub extern "C" fn freeFloatArray(values: *mut f32, count: usize) {
    drop(free_array(values, count));
}

#[unsafe(no_mangle)]
pub extern "C" fn freeByteArray(values: *mut u8, count: usize) {
    drop(free_array(values, count));
}

#[unsafe(no_mangle)]
pub extern "C" fn freeString(value: *mut c_char) {
    if !value.is_null() {
        drop(unsafe { CString::from_raw(value) });
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn freeStringArray(values: *mut *mut c_char, count: usize) {
    if let Some(strings) = free_array(values, count) {
        for value in strings.iter() {
            freeString(*value);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_arrays_report_their_length() {
        let mut count = 99;
        let values = owned_array(vec![1u32, 2, 3], &mut count);
        assert_eq!(count, 3);
        assert_eq!(take::array(values, count), vec![1, 2, 3]);

        let empty = owned_array(Vec::<f32>::new(), &mut count);
        assert!(empty.is_null());
        assert_eq!(count, 0);
        freeFloatArray(empty, 0);
    }

    #[test]
    fn string_arrays_free_every_element() {
        let mut count = 0;
        let values = owned_string_array(vec!["PAR".into(), "NIR".into()], &mut count);
        assert_eq!(count, 2);
        freeStringArray(values, count);
        freeStringArray(ptr::null_mut(), 0);
    }

    #[test]
    fn null_arguments_are_rejected() {
        assert!(c_str(ptr::null(), "label").is_err());
        assert!(read_vec3(ptr::null(), "center").is_err());
        assert!(slice::<f32>(ptr::null(), 0, "values").unwrap().is_empty());
        assert!(slice::<f32>(ptr::null(), 2, "values").is_err());
        assert!(non_empty_slice::<f32>(ptr::null(), 0, "values").is_err());
        assert!(count_out(ptr::null_mut()).is_err());
    }

    #[test]
    fn rotations_go_through_spherical_coordinates() {
        let rotation = read_rotation([1.0, 0.5, 0.25].as_ptr()).unwrap();
        assert_eq!(rotation, SphericalCoord::new(1.0, 0.5, 0.25));
        let points = read_points([0.0, 1.0, 2.0, 3.0, 4.0, 5.0].as_ptr(), 2, "nodes").unwrap();
        assert_eq!(points[1], Vec3::new(3.0, 4.0, 5.0));
    }
}
