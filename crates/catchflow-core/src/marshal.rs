//! Conversion between the framework's `f64` values and a module backend's
//! native storage type.
//!
//! Backends describe each variable with a C-style type-name string and a per
//! item byte size. The closed set of supported types lives in [`NativeValue`];
//! a type name outside the set is an error, never a silent reinterpretation.

use crate::errors::{CoupleError, CoupleResult};

/// A block of values in one of the native types a module backend may expose.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

impl NativeValue {
    pub fn len(&self) -> usize {
        match self {
            NativeValue::F64(v) => v.len(),
            NativeValue::F32(v) => v.len(),
            NativeValue::I16(v) => v.len(),
            NativeValue::U16(v) => v.len(),
            NativeValue::I32(v) => v.len(),
            NativeValue::U32(v) => v.len(),
            NativeValue::I64(v) => v.len(),
            NativeValue::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item_size(&self) -> usize {
        match self {
            NativeValue::F64(_) => 8,
            NativeValue::F32(_) => 4,
            NativeValue::I16(_) | NativeValue::U16(_) => 2,
            NativeValue::I32(_) | NativeValue::U32(_) => 4,
            NativeValue::I64(_) | NativeValue::U64(_) => 8,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::F64(_) => "double",
            NativeValue::F32(_) => "float",
            NativeValue::I16(_) => "short",
            NativeValue::U16(_) => "unsigned short",
            NativeValue::I32(_) => "int",
            NativeValue::U32(_) => "unsigned int",
            NativeValue::I64(_) => "long long",
            NativeValue::U64(_) => "unsigned long long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    F64,
    F32,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl TypeTag {
    fn size(self) -> usize {
        match self {
            TypeTag::F64 => 8,
            TypeTag::F32 => 4,
            TypeTag::I16 | TypeTag::U16 => 2,
            TypeTag::I32 | TypeTag::U32 => 4,
            TypeTag::I64 | TypeTag::U64 => 8,
        }
    }
}

/// Recognised C-style spellings for the supported types.
fn parse_type_name(type_name: &str) -> Option<TypeTag> {
    let tag = match type_name.trim() {
        "double" | "long double" => TypeTag::F64,
        "float" => TypeTag::F32,
        "short" | "short int" | "signed short" | "signed short int" => TypeTag::I16,
        "unsigned short" | "unsigned short int" => TypeTag::U16,
        "int" | "signed" | "signed int" => TypeTag::I32,
        "unsigned" | "unsigned int" => TypeTag::U32,
        "long" | "long int" | "signed long" | "signed long int" | "long long"
        | "long long int" | "signed long long" | "signed long long int" => TypeTag::I64,
        "unsigned long" | "unsigned long int" | "unsigned long long"
        | "unsigned long long int" => TypeTag::U64,
        _ => return None,
    };
    Some(tag)
}

fn check_item_size(
    variable: &str,
    type_name: &str,
    tag: TypeTag,
    item_size: usize,
) -> CoupleResult<()> {
    // "long double" is stored as f64; its reported ABI size varies.
    let acceptable = type_name.trim() == "long double" && matches!(item_size, 8 | 12 | 16);
    if item_size != tag.size() && !acceptable {
        return Err(CoupleError::ItemSizeMismatch {
            variable: variable.to_string(),
            type_name: type_name.to_string(),
            expected: tag.size(),
            actual: item_size,
        });
    }
    Ok(())
}

fn checked_int_cast<T>(variable: &str, type_name: &str, value: f64) -> CoupleResult<T>
where
    T: TryFrom<i128>,
{
    let out_of_range = || CoupleError::ValueNotRepresentable {
        variable: variable.to_string(),
        type_name: type_name.to_string(),
        value,
    };
    if !value.is_finite() {
        return Err(out_of_range());
    }
    // Truncate toward zero, as a C cast would, then range-check.
    T::try_from(value.trunc() as i128).map_err(|_| out_of_range())
}

/// Check that a declared type-name string is supported and consistent with
/// the declared per-item byte size.
pub fn verify_declared_type(
    variable: &str,
    type_name: &str,
    item_size: usize,
) -> CoupleResult<()> {
    let tag = parse_type_name(type_name).ok_or_else(|| CoupleError::UnsupportedNativeType {
        variable: variable.to_string(),
        type_name: type_name.to_string(),
    })?;
    check_item_size(variable, type_name, tag, item_size)
}

/// Convert framework values to the native representation a backend expects
/// for one of its variables.
pub fn to_native(
    variable: &str,
    type_name: &str,
    item_size: usize,
    values: &[f64],
) -> CoupleResult<NativeValue> {
    let tag = parse_type_name(type_name).ok_or_else(|| CoupleError::UnsupportedNativeType {
        variable: variable.to_string(),
        type_name: type_name.to_string(),
    })?;
    check_item_size(variable, type_name, tag, item_size)?;

    let native = match tag {
        TypeTag::F64 => NativeValue::F64(values.to_vec()),
        TypeTag::F32 => NativeValue::F32(values.iter().map(|&v| v as f32).collect()),
        TypeTag::I16 => NativeValue::I16(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
        TypeTag::U16 => NativeValue::U16(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
        TypeTag::I32 => NativeValue::I32(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
        TypeTag::U32 => NativeValue::U32(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
        TypeTag::I64 => NativeValue::I64(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
        TypeTag::U64 => NativeValue::U64(
            values
                .iter()
                .map(|&v| checked_int_cast(variable, type_name, v))
                .collect::<CoupleResult<_>>()?,
        ),
    };
    Ok(native)
}

/// Read one element of a native block back as `f64`.
pub fn from_native(variable: &str, value: &NativeValue, index: usize) -> CoupleResult<f64> {
    if index >= value.len() {
        return Err(CoupleError::ValueCountMismatch {
            module: String::new(),
            variable: variable.to_string(),
            expected: index + 1,
            actual: value.len(),
        });
    }
    let v = match value {
        NativeValue::F64(v) => v[index],
        NativeValue::F32(v) => f64::from(v[index]),
        NativeValue::I16(v) => f64::from(v[index]),
        NativeValue::U16(v) => f64::from(v[index]),
        NativeValue::I32(v) => f64::from(v[index]),
        NativeValue::U32(v) => f64::from(v[index]),
        NativeValue::I64(v) => v[index] as f64,
        NativeValue::U64(v) => v[index] as f64,
    };
    Ok(v)
}

/// Read the single element of a scalar native block.
pub fn scalar_from_native(variable: &str, value: &NativeValue) -> CoupleResult<f64> {
    from_native(variable, value, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_supported_type() {
        let cases: &[(&str, usize)] = &[
            ("double", 8),
            ("float", 4),
            ("short", 2),
            ("unsigned short int", 2),
            ("int", 4),
            ("unsigned int", 4),
            ("long long int", 8),
            ("unsigned long long int", 8),
        ];
        for (type_name, item_size) in cases {
            let native = to_native("x", type_name, *item_size, &[3.0, 7.0]).unwrap();
            assert_eq!(native.len(), 2);
            assert_eq!(from_native("x", &native, 0).unwrap(), 3.0);
            assert_eq!(from_native("x", &native, 1).unwrap(), 7.0);
        }
    }

    #[test]
    fn long_double_is_stored_as_f64() {
        let native = to_native("x", "long double", 16, &[1.5]).unwrap();
        assert_eq!(native, NativeValue::F64(vec![1.5]));
    }

    #[test]
    fn unknown_type_name_errors() {
        let err = to_native("depth", "complex double", 16, &[1.0]).unwrap_err();
        assert!(matches!(err, CoupleError::UnsupportedNativeType { variable, .. }
            if variable == "depth"));
    }

    #[test]
    fn item_size_mismatch_errors() {
        let err = to_native("depth", "double", 4, &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            CoupleError::ItemSizeMismatch {
                expected: 8,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn integer_casts_are_range_checked() {
        let err = to_native("count", "short", 2, &[40000.0]).unwrap_err();
        assert!(matches!(err, CoupleError::ValueNotRepresentable { .. }));
        let err = to_native("count", "unsigned int", 4, &[-1.0]).unwrap_err();
        assert!(matches!(err, CoupleError::ValueNotRepresentable { .. }));
        let err = to_native("count", "int", 4, &[f64::NAN]).unwrap_err();
        assert!(matches!(err, CoupleError::ValueNotRepresentable { .. }));
    }

    #[test]
    fn integer_casts_truncate_toward_zero() {
        let native = to_native("count", "int", 4, &[2.9, -2.9]).unwrap();
        assert_eq!(native, NativeValue::I32(vec![2, -2]));
    }

    #[test]
    fn out_of_bounds_read_errors() {
        let native = NativeValue::F64(vec![1.0]);
        assert!(from_native("x", &native, 1).is_err());
    }
}
