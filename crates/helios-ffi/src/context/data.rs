//! Typed data at the primitive, object and global level.
//!
//! Scalars cross the boundary by value, vector types through caller arrays of
//! their fixed length and strings as NUL-terminated text (returned strings are
//! owned by the caller and released with `freeString`).

use crate::buffer::{c_str, count_out, owned_string, owned_string_array, read, slice, uuid_slice};
use crate::error::FfiError;
use crate::handle::{context_mut, context_ref};
use helios::core::context::{Context, DataKind, DataType, ObjectId, Uuid};
use helios::core::geometry::{Int2, Int3, Int4, Vec2, Vec3, Vec4};
use std::ffi::c_char;
use std::ptr;

/// Sentinel of the `get*DataType` queries.
const NO_DATA_TYPE: i32 = -1;

#[derive(Debug, Clone, Copy)]
enum Target {
    Primitive(Uuid),
    Object(ObjectId),
    Global,
}

fn set_value<T: DataKind>(context: *mut Context, target: Target, label: *const c_char, value: T) -> Result<(), FfiError> {
    let context = context_mut(context)?;
    let label = c_str(label, "label")?;
    match target {
        Target::Primitive(uuid) => context.set_primitive_data(uuid, label, value)?,
        Target::Object(id) => context.set_object_data(id, label, value)?,
        Target::Global => context.set_global_data(label, value),
    }
    Ok(())
}

fn get_value<T: DataKind>(context: *const Context, target: Target, label: *const c_char) -> Result<T, FfiError> {
    let context = context_ref(context)?;
    let label = c_str(label, "label")?;
    let value = match target {
        Target::Primitive(uuid) => context.get_primitive_data(uuid, label)?,
        Target::Object(id) => context.get_object_data(id, label)?,
        Target::Global => context.get_global_data(label)?,
    };
    Ok(value)
}

fn data_exists(context: *const Context, target: Target, label: *const c_char) -> Result<bool, FfiError> {
    let context = context_ref(context)?;
    let label = c_str(label, "label")?;
    Ok(match target {
        Target::Primitive(uuid) => context.does_primitive_data_exist(uuid, label)?,
        Target::Object(id) => context.does_object_data_exist(id, label)?,
        Target::Global => context.does_global_data_exist(label),
    })
}

fn data_type(context: *const Context, target: Target, label: *const c_char) -> Result<i32, FfiError> {
    let context = context_ref(context)?;
    let label = c_str(label, "label")?;
    let data_type: DataType = match target {
        Target::Primitive(uuid) => context.primitive_data_type(uuid, label)?,
        Target::Object(id) => context.object_data_type(id, label)?,
        Target::Global => context.global_data_type(label)?,
    };
    Ok(data_type as i32)
}

fn clear_data(context: *mut Context, target: Target, label: *const c_char) -> Result<(), FfiError> {
    let context = context_mut(context)?;
    let label = c_str(label, "label")?;
    match target {
        Target::Primitive(uuid) => context.clear_primitive_data(uuid, label)?,
        Target::Object(id) => context.clear_object_data(id, label)?,
        Target::Global => context.clear_global_data(label),
    }
    Ok(())
}

/// Scalar setters and getters at all three levels.
macro_rules! scalar_data {
    ($($ty:ty => $set_p:ident, $get_p:ident, $set_o:ident, $get_o:ident, $set_g:ident, $get_g:ident;)*) => {
        exports! {$(
            fn $set_p(context: *mut Context, uuid: Uuid, label: *const c_char, value: $ty) -> () = () => {
                set_value(context, Target::Primitive(uuid), label, value)
            }

            fn $get_p(context: *const Context, uuid: Uuid, label: *const c_char) -> $ty = <$ty>::default() => {
                get_value(context, Target::Primitive(uuid), label)
            }

            fn $set_o(context: *mut Context, object_id: ObjectId, label: *const c_char, value: $ty) -> () = () => {
                set_value(context, Target::Object(object_id), label, value)
            }

            fn $get_o(context: *const Context, object_id: ObjectId, label: *const c_char) -> $ty = <$ty>::default() => {
                get_value(context, Target::Object(object_id), label)
            }

            fn $set_g(context: *mut Context, label: *const c_char, value: $ty) -> () = () => {
                set_value(context, Target::Global, label, value)
            }

            fn $get_g(context: *const Context, label: *const c_char) -> $ty = <$ty>::default() => {
                get_value(context, Target::Global, label)
            }
        )*}
    };
}

/// Fixed-length vector setters and getters at all three levels; values travel
/// through arrays of `$n` elements of `$elem`.
macro_rules! vector_data {
    ($($ty:ty, $elem:ty, $n:literal => $set_p:ident, $get_p:ident, $set_o:ident, $get_o:ident, $set_g:ident, $get_g:ident;)*) => {
        exports! {$(
            fn $set_p(context: *mut Context, uuid: Uuid, label: *const c_char, value: *const $elem) -> () = () => {
                let value = <$ty>::from(read::<$n, $elem>(value, "value")?);
                set_value(context, Target::Primitive(uuid), label, value)
            }

            fn $get_p(context: *const Context, uuid: Uuid, label: *const c_char, value: *mut $elem) -> () = () => {
                let out = crate::buffer::out_array::<$n, $elem>(value, "value")?;
                *out = get_value::<$ty>(context, Target::Primitive(uuid), label)?.into();
                Ok(())
            }

            fn $set_o(context: *mut Context, object_id: ObjectId, label: *const c_char, value: *const $elem) -> () = () => {
                let value = <$ty>::from(read::<$n, $elem>(value, "value")?);
                set_value(context, Target::Object(object_id), label, value)
            }

            fn $get_o(context: *const Context, object_id: ObjectId, label: *const c_char, value: *mut $elem) -> () = () => {
                let out = crate::buffer::out_array::<$n, $elem>(value, "value")?;
                *out = get_value::<$ty>(context, Target::Object(object_id), label)?.into();
                Ok(())
            }

            fn $set_g(context: *mut Context, label: *const c_char, value: *const $elem) -> () = () => {
                let value = <$ty>::from(read::<$n, $elem>(value, "value")?);
                set_value(context, Target::Global, label, value)
            }

            fn $get_g(context: *const Context, label: *const c_char, value: *mut $elem) -> () = () => {
                let out = crate::buffer::out_array::<$n, $elem>(value, "value")?;
                *out = get_value::<$ty>(context, Target::Global, label)?.into();
                Ok(())
            }
        )*}
    };
}

scalar_data! {
    f32 => setPrimitiveDataFloat, getPrimitiveDataFloat, setObjectDataFloat, getObjectDataFloat, setGlobalDataFloat, getGlobalDataFloat;
    f64 => setPrimitiveDataDouble, getPrimitiveDataDouble, setObjectDataDouble, getObjectDataDouble, setGlobalDataDouble, getGlobalDataDouble;
    i32 => setPrimitiveDataInt, getPrimitiveDataInt, setObjectDataInt, getObjectDataInt, setGlobalDataInt, getGlobalDataInt;
    u32 => setPrimitiveDataUInt, getPrimitiveDataUInt, setObjectDataUInt, getObjectDataUInt, setGlobalDataUInt, getGlobalDataUInt;
}

vector_data! {
    Vec2, f32, 2 => setPrimitiveDataVec2, getPrimitiveDataVec2, setObjectDataVec2, getObjectDataVec2, setGlobalDataVec2, getGlobalDataVec2;
    Vec3, f32, 3 => setPrimitiveDataVec3, getPrimitiveDataVec3, setObjectDataVec3, getObjectDataVec3, setGlobalDataVec3, getGlobalDataVec3;
    Vec4, f32, 4 => setPrimitiveDataVec4, getPrimitiveDataVec4, setObjectDataVec4, getObjectDataVec4, setGlobalDataVec4, getGlobalDataVec4;
    Int2, i32, 2 => setPrimitiveDataInt2, getPrimitiveDataInt2, setObjectDataInt2, getObjectDataInt2, setGlobalDataInt2, getGlobalDataInt2;
    Int3, i32, 3 => setPrimitiveDataInt3, getPrimitiveDataInt3, setObjectDataInt3, getObjectDataInt3, setGlobalDataInt3, getGlobalDataInt3;
    Int4, i32, 4 => setPrimitiveDataInt4, getPrimitiveDataInt4, setObjectDataInt4, getObjectDataInt4, setGlobalDataInt4, getGlobalDataInt4;
}

fn read_string(value: *const c_char) -> Result<String, FfiError> {
    c_str(value, "value").map(str::to_string)
}

exports! {
    fn setPrimitiveDataString(context: *mut Context, uuid: Uuid, label: *const c_char, value: *const c_char) -> () = () => {
        set_value(context, Target::Primitive(uuid), label, read_string(value)?)
    }

    fn getPrimitiveDataString(context: *const Context, uuid: Uuid, label: *const c_char) -> *mut c_char = ptr::null_mut() => {
        let value: String = get_value(context, Target::Primitive(uuid), label)?;
        Ok(owned_string(&value))
    }

    fn setObjectDataString(context: *mut Context, object_id: ObjectId, label: *const c_char, value: *const c_char) -> () = () => {
        set_value(context, Target::Object(object_id), label, read_string(value)?)
    }

    fn getObjectDataString(context: *const Context, object_id: ObjectId, label: *const c_char) -> *mut c_char = ptr::null_mut() => {
        let value: String = get_value(context, Target::Object(object_id), label)?;
        Ok(owned_string(&value))
    }

    fn setGlobalDataString(context: *mut Context, label: *const c_char, value: *const c_char) -> () = () => {
        set_value(context, Target::Global, label, read_string(value)?)
    }

    fn getGlobalDataString(context: *const Context, label: *const c_char) -> *mut c_char = ptr::null_mut() => {
        let value: String = get_value(context, Target::Global, label)?;
        Ok(owned_string(&value))
    }

    fn doesPrimitiveDataExist(context: *const Context, uuid: Uuid, label: *const c_char) -> bool = false => {
        data_exists(context, Target::Primitive(uuid), label)
    }

    fn doesObjectDataExist(context: *const Context, object_id: ObjectId, label: *const c_char) -> bool = false => {
        data_exists(context, Target::Object(object_id), label)
    }

    fn doesGlobalDataExist(context: *const Context, label: *const c_char) -> bool = false => {
        data_exists(context, Target::Global, label)
    }

    /// Type code of the stored value (int 0 … string 10), or -1 on failure.
    fn getPrimitiveDataType(context: *const Context, uuid: Uuid, label: *const c_char) -> i32 = NO_DATA_TYPE => {
        data_type(context, Target::Primitive(uuid), label)
    }

    fn getObjectDataType(context: *const Context, object_id: ObjectId, label: *const c_char) -> i32 = NO_DATA_TYPE => {
        data_type(context, Target::Object(object_id), label)
    }

    fn getGlobalDataType(context: *const Context, label: *const c_char) -> i32 = NO_DATA_TYPE => {
        data_type(context, Target::Global, label)
    }

    fn clearPrimitiveData(context: *mut Context, uuid: Uuid, label: *const c_char) -> () = () => {
        clear_data(context, Target::Primitive(uuid), label)
    }

    fn clearObjectData(context: *mut Context, object_id: ObjectId, label: *const c_char) -> () = () => {
        clear_data(context, Target::Object(object_id), label)
    }

    fn clearGlobalData(context: *mut Context, label: *const c_char) -> () = () => {
        clear_data(context, Target::Global, label)
    }

    fn listPrimitiveData(context: *const Context, uuid: Uuid, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let labels = context_ref(context)?.list_primitive_data(uuid)?;
        Ok(owned_string_array(labels, count))
    }

    fn listGlobalData(context: *const Context, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let labels = context_ref(context)?.list_global_data();
        Ok(owned_string_array(labels, count))
    }

    /// Sets `values[i]` on `uuids[i]`. Every UUID is checked before any is written.
    fn setPrimitiveDataFloatForUUIDs(
        context: *mut Context,
        uuids: *const Uuid,
        count: usize,
        label: *const c_char,
        values: *const f32,
    ) -> () = () => {
        let context = context_mut(context)?;
        let uuids = uuid_slice(uuids, count)?;
        let values = slice(values, count, "values")?;
        let label = c_str(label, "label")?;
        context.validate_uuids(uuids)?;
        for (&uuid, &value) in uuids.iter().zip(values) {
            context.set_primitive_data(uuid, label, value)?;
        }
        Ok(())
    }

    /// Writes the value of `label` for each of `uuids` into `values[0..count]`.
    fn getPrimitiveDataFloatForUUIDs(
        context: *const Context,
        uuids: *const Uuid,
        count: usize,
        label: *const c_char,
        values: *mut f32,
    ) -> () = () => {
        let context = context_ref(context)?;
        let uuids = uuid_slice(uuids, count)?;
        let label = c_str(label, "label")?;
        if values.is_null() {
            return Err(FfiError::null("values"));
        }
        let gathered = uuids
            .iter()
            .map(|&uuid| context.get_primitive_data::<f32>(uuid, label))
            .collect::<Result<Vec<_>, _>>()?;
        let out = unsafe { std::slice::from_raw_parts_mut(values, count) };
        out.copy_from_slice(&gathered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::addPatch;
    use super::super::fixtures::*;
    use super::*;
    use crate::buffer::take;
    use std::ffi::CString;

    fn label(text: &str) -> CString {
        CString::new(text).unwrap()
    }

    #[test]
    fn scalar_data_round_trips_at_every_level() {
        let ctx = TestContext::new();
        let uuid = addPatch(ctx.0);
        let key = label("value");

        setPrimitiveDataFloat(ctx.0, uuid, key.as_ptr(), 2.5);
        assert_eq!(getPrimitiveDataFloat(ctx.0, uuid, key.as_ptr()), 2.5);
        setPrimitiveDataDouble(ctx.0, uuid, key.as_ptr(), 1e-12);
        assert_eq!(getPrimitiveDataDouble(ctx.0, uuid, key.as_ptr()), 1e-12);
        setPrimitiveDataInt(ctx.0, uuid, key.as_ptr(), -4);
        assert_eq!(getPrimitiveDataInt(ctx.0, uuid, key.as_ptr()), -4);
        setPrimitiveDataUInt(ctx.0, uuid, key.as_ptr(), 7);
        assert_eq!(getPrimitiveDataUInt(ctx.0, uuid, key.as_ptr()), 7);
        assert_eq!(getPrimitiveDataType(ctx.0, uuid, key.as_ptr()), 1);

        setGlobalDataDouble(ctx.0, key.as_ptr(), 3.25);
        assert_eq!(getGlobalDataDouble(ctx.0, key.as_ptr()), 3.25);
        setGlobalDataInt(ctx.0, key.as_ptr(), 9);
        assert_eq!(getGlobalDataInt(ctx.0, key.as_ptr()), 9);
        assert_eq!(last_code(), 0);
    }

    #[test]
    fn vector_and_string_data_round_trip() {
        let ctx = TestContext::new();
        let uuid = addPatch(ctx.0);
        let key = label("v");

        let v3 = [1.0f32, -2.0, 3.5];
        setPrimitiveDataVec3(ctx.0, uuid, key.as_ptr(), v3.as_ptr());
        let mut out3 = [0.0f32; 3];
        getPrimitiveDataVec3(ctx.0, uuid, key.as_ptr(), out3.as_mut_ptr());
        assert_eq!(out3, v3);
        assert_eq!(getPrimitiveDataType(ctx.0, uuid, key.as_ptr()), 5);

        let v2 = [0.5f32, 0.25];
        setGlobalDataVec2(ctx.0, key.as_ptr(), v2.as_ptr());
        let mut out2 = [0.0f32; 2];
        getGlobalDataVec2(ctx.0, key.as_ptr(), out2.as_mut_ptr());
        assert_eq!(out2, v2);

        let v4 = [1.0f32, 2.0, 3.0, 4.0];
        setGlobalDataVec4(ctx.0, key.as_ptr(), v4.as_ptr());
        let mut out4 = [0.0f32; 4];
        getGlobalDataVec4(ctx.0, key.as_ptr(), out4.as_mut_ptr());
        assert_eq!(out4, v4);

        let i2 = [3, -3];
        setPrimitiveDataInt2(ctx.0, uuid, key.as_ptr(), i2.as_ptr());
        let mut o2 = [0; 2];
        getPrimitiveDataInt2(ctx.0, uuid, key.as_ptr(), o2.as_mut_ptr());
        assert_eq!(o2, i2);

        let i3 = [1, 2, 3];
        setGlobalDataInt3(ctx.0, key.as_ptr(), i3.as_ptr());
        let mut o3 = [0; 3];
        getGlobalDataInt3(ctx.0, key.as_ptr(), o3.as_mut_ptr());
        assert_eq!(o3, i3);

        let i4 = [4, 3, 2, 1];
        setPrimitiveDataInt4(ctx.0, uuid, key.as_ptr(), i4.as_ptr());
        let mut o4 = [0; 4];
        getPrimitiveDataInt4(ctx.0, uuid, key.as_ptr(), o4.as_mut_ptr());
        assert_eq!(o4, i4);

        let text = label("maize leaf");
        setPrimitiveDataString(ctx.0, uuid, key.as_ptr(), text.as_ptr());
        assert_eq!(take::string(getPrimitiveDataString(ctx.0, uuid, key.as_ptr())), "maize leaf");
        setGlobalDataString(ctx.0, key.as_ptr(), text.as_ptr());
        assert_eq!(take::string(getGlobalDataString(ctx.0, key.as_ptr())), "maize leaf");
        assert_eq!(getGlobalDataType(ctx.0, key.as_ptr()), 10);
    }

    #[test]
    fn object_data_round_trips() {
        let ctx = TestContext::new();
        let center = [0.0f32; 3];
        let size = [1.0f32, 1.0];
        let rotation = [0.0f32; 3];
        let subdivisions = [1u32, 1];
        let color = [0.0f32, 1.0, 0.0];
        let id = super::super::compound::addTileObject(
            ctx.0,
            center.as_ptr(),
            size.as_ptr(),
            rotation.as_ptr(),
            subdivisions.as_ptr(),
            color.as_ptr(),
        );
        let key = label("age");

        setObjectDataFloat(ctx.0, id, key.as_ptr(), 12.0);
        assert_eq!(getObjectDataFloat(ctx.0, id, key.as_ptr()), 12.0);
        assert!(doesObjectDataExist(ctx.0, id, key.as_ptr()));
        assert_eq!(getObjectDataType(ctx.0, id, key.as_ptr()), 2);

        let v = [1.0f32, 2.0, 3.0];
        setObjectDataVec3(ctx.0, id, key.as_ptr(), v.as_ptr());
        let mut out = [0.0f32; 3];
        getObjectDataVec3(ctx.0, id, key.as_ptr(), out.as_mut_ptr());
        assert_eq!(out, v);

        let text = label("tile");
        setObjectDataString(ctx.0, id, key.as_ptr(), text.as_ptr());
        assert_eq!(take::string(getObjectDataString(ctx.0, id, key.as_ptr())), "tile");

        clearObjectData(ctx.0, id, key.as_ptr());
        assert!(!doesObjectDataExist(ctx.0, id, key.as_ptr()));
        assert_eq!(getObjectDataType(ctx.0, id, key.as_ptr()), NO_DATA_TYPE);
        assert_eq!(last_code(), 7);

        setObjectDataInt(ctx.0, 999, key.as_ptr(), 1);
        assert_eq!(last_code(), 2);
    }

    #[test]
    fn lookup_failures_are_classified() {
        let ctx = TestContext::new();
        let uuid = addPatch(ctx.0);
        let key = label("temperature");

        assert_eq!(getPrimitiveDataFloat(ctx.0, 555, key.as_ptr()), 0.0);
        assert_eq!(last_code(), 2);

        assert_eq!(getPrimitiveDataFloat(ctx.0, uuid, key.as_ptr()), 0.0);
        assert_eq!(last_code(), 7);
        assert!(last_message().starts_with("getPrimitiveDataFloat: "));

        setPrimitiveDataInt(ctx.0, uuid, key.as_ptr(), 300);
        assert_eq!(getPrimitiveDataFloat(ctx.0, uuid, key.as_ptr()), 0.0);
        assert_eq!(last_code(), 7);

        setPrimitiveDataFloat(ctx.0, uuid, ptr::null(), 1.0);
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn labels_can_be_listed_and_cleared() {
        let ctx = TestContext::new();
        let uuid = addPatch(ctx.0);
        let (a, b) = (label("a"), label("b"));
        setPrimitiveDataFloat(ctx.0, uuid, a.as_ptr(), 1.0);
        setPrimitiveDataFloat(ctx.0, uuid, b.as_ptr(), 2.0);
        setGlobalDataFloat(ctx.0, a.as_ptr(), 3.0);

        let mut count = 0;
        let mut labels = take::strings(listPrimitiveData(ctx.0, uuid, &mut count), count);
        labels.sort();
        assert_eq!(labels, vec!["a", "b"]);

        clearPrimitiveData(ctx.0, uuid, a.as_ptr());
        assert!(!doesPrimitiveDataExist(ctx.0, uuid, a.as_ptr()));
        assert!(doesPrimitiveDataExist(ctx.0, uuid, b.as_ptr()));

        assert_eq!(take::strings(listGlobalData(ctx.0, &mut count), count), vec!["a"]);
        clearGlobalData(ctx.0, a.as_ptr());
        assert!(!doesGlobalDataExist(ctx.0, a.as_ptr()));
    }

    #[test]
    fn bulk_float_data_round_trips() {
        let ctx = TestContext::new();
        let uuids = [addPatch(ctx.0), addPatch(ctx.0), addPatch(ctx.0)];
        let key = label("radiation_flux_PAR");
        let values = [100.0f32, 200.0, 300.0];
        setPrimitiveDataFloatForUUIDs(ctx.0, uuids.as_ptr(), 3, key.as_ptr(), values.as_ptr());
        let mut out = [0.0f32; 3];
        getPrimitiveDataFloatForUUIDs(ctx.0, uuids.as_ptr(), 3, key.as_ptr(), out.as_mut_ptr());
        assert_eq!(out, values);

        let missing = [uuids[0], 4242];
        setPrimitiveDataFloatForUUIDs(ctx.0, missing.as_ptr(), 2, key.as_ptr(), values.as_ptr());
        assert_eq!(last_code(), 2);
        assert_eq!(getPrimitiveDataFloat(ctx.0, uuids[0], key.as_ptr()), 100.0);
    }
}
