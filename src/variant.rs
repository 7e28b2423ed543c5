// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use nalgebra::{DMatrix, Vector3};

use crate::utilities::numeric_prefix;

/// Tag of the member currently held by a [`Variant`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum VariantType {
    Null,
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Pointer,
    Vector,
    Matrix,
}

/// A value of one of a closed set of types, passed between codecs and the
/// molecule.
///
/// Owned payloads (strings, vectors, matrices) are deep copied by `clone`.
/// Conversions between members follow permissive rules: numbers narrow by
/// truncation, strings are parsed from their leading numeric part, and a
/// conversion that makes no sense yields the target's zero value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Opaque address-sized handle. It is carried around, never dereferenced.
    Pointer(usize),
    Vector(Vector3<f64>),
    Matrix(DMatrix<f64>),
}

impl Variant {
    pub fn new() -> Self {
        Variant::Null
    }

    pub fn pointer(handle: usize) -> Self {
        Variant::Pointer(handle)
    }

    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Null => VariantType::Null,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Long(_) => VariantType::Long,
            Variant::Float(_) => VariantType::Float,
            Variant::Double(_) => VariantType::Double,
            Variant::String(_) => VariantType::String,
            Variant::Pointer(_) => VariantType::Pointer,
            Variant::Vector(_) => VariantType::Vector,
            Variant::Matrix(_) => VariantType::Matrix,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Replaces the held value, dropping the previous payload.
    pub fn set_value(&mut self, value: impl Into<Variant>) {
        *self = value.into();
    }

    pub fn clear(&mut self) {
        *self = Variant::Null;
    }

    pub fn value<T: FromVariant>(&self) -> T {
        T::from_variant(self)
    }

    pub fn to_bool(&self) -> bool {
        self.value()
    }

    pub fn to_char(&self) -> char {
        self.value()
    }

    pub fn to_short(&self) -> i16 {
        self.value()
    }

    pub fn to_int(&self) -> i32 {
        self.value()
    }

    pub fn to_long(&self) -> i64 {
        self.value()
    }

    pub fn to_float(&self) -> f32 {
        self.value()
    }

    pub fn to_double(&self) -> f64 {
        self.value()
    }

    /// The opaque handle, `None` unless this is a `Pointer`.
    pub fn to_pointer(&self) -> Option<usize> {
        match *self {
            Variant::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// The string form: strings as-is, numbers formatted, otherwise empty.
    pub fn to_string_value(&self) -> String {
        self.value()
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        self.value()
    }

    /// Borrows the matrix payload; non-matrices give an empty 0×0 matrix.
    pub fn to_matrix_ref(&self) -> &DMatrix<f64> {
        static EMPTY: std::sync::OnceLock<DMatrix<f64>> = std::sync::OnceLock::new();
        match self {
            Variant::Matrix(m) => m,
            _ => EMPTY.get_or_init(|| DMatrix::zeros(0, 0)),
        }
    }

    pub fn to_vector3(&self) -> Vector3<f64> {
        self.value()
    }

    pub fn to_list(&self) -> Vec<f64> {
        self.value()
    }
}

/// Conversion out of a [`Variant`], following the permissive rules
/// described on the type.
pub trait FromVariant: Sized {
    fn from_variant(variant: &Variant) -> Self;
}

fn parse_integer(text: &str) -> i64 {
    numeric_prefix(text, false).parse::<i64>().unwrap_or(0)
}

fn parse_real(text: &str) -> f64 {
    numeric_prefix(text, true).parse::<f64>().unwrap_or(0.0)
}

impl FromVariant for bool {
    fn from_variant(variant: &Variant) -> Self {
        match *variant {
            Variant::Bool(b) => b,
            Variant::Int(i) => i != 0,
            _ => false,
        }
    }
}

impl FromVariant for char {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Int(i) => (*i as u8) as char,
            Variant::String(s) => s.chars().next().unwrap_or('\0'),
            _ => '\0',
        }
    }
}

impl FromVariant for i16 {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Int(i) => *i as i16,
            Variant::String(s) => parse_integer(s) as i16,
            _ => 0,
        }
    }
}

impl FromVariant for i32 {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Int(i) => *i,
            Variant::Long(l) => *l as i32,
            Variant::Bool(b) => *b as i32,
            Variant::Float(f) => *f as i32,
            Variant::Double(d) => *d as i32,
            Variant::String(s) => parse_integer(s) as i32,
            _ => 0,
        }
    }
}

impl FromVariant for i64 {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Long(l) => *l,
            Variant::Int(i) => *i as i64,
            Variant::String(s) => parse_integer(s),
            _ => 0,
        }
    }
}

impl FromVariant for f32 {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Float(f) => *f,
            Variant::Double(d) => *d as f32,
            Variant::Int(i) => *i as f32,
            Variant::Long(l) => *l as f32,
            Variant::String(s) => parse_real(s) as f32,
            _ => 0.0,
        }
    }
}

impl FromVariant for f64 {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Double(d) => *d,
            Variant::Float(f) => *f as f64,
            Variant::Int(i) => *i as f64,
            Variant::Long(l) => *l as f64,
            Variant::String(s) => parse_real(s),
            _ => 0.0,
        }
    }
}

impl FromVariant for String {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::String(s) => s.clone(),
            Variant::Int(i) => i.to_string(),
            Variant::Long(l) => l.to_string(),
            Variant::Float(f) => f.to_string(),
            Variant::Double(d) => d.to_string(),
            _ => String::new(),
        }
    }
}

impl FromVariant for DMatrix<f64> {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Matrix(m) => m.clone(),
            _ => DMatrix::zeros(0, 0),
        }
    }
}

impl FromVariant for Vector3<f64> {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Vector(v) => *v,
            _ => Vector3::zeros(),
        }
    }
}

impl FromVariant for Vec<f64> {
    fn from_variant(variant: &Variant) -> Self {
        match variant {
            Variant::Matrix(m) if m.ncols() == 1 => m.column(0).iter().copied().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<char> for Variant {
    fn from(value: char) -> Self {
        Variant::Int(value as u8 as i32)
    }
}

impl From<i16> for Variant {
    fn from(value: i16) -> Self {
        Variant::Int(value as i32)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Long(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<(f64, f64, f64)> for Variant {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Variant::Vector(Vector3::new(x, y, z))
    }
}

impl From<Vector3<f64>> for Variant {
    fn from(value: Vector3<f64>) -> Self {
        Variant::Vector(value)
    }
}

impl From<Vector3<f32>> for Variant {
    fn from(value: Vector3<f32>) -> Self {
        Variant::Vector(value.cast::<f64>())
    }
}

impl From<DMatrix<f64>> for Variant {
    fn from(value: DMatrix<f64>) -> Self {
        Variant::Matrix(value)
    }
}

impl From<DMatrix<f32>> for Variant {
    fn from(value: DMatrix<f32>) -> Self {
        Variant::Matrix(value.cast::<f64>())
    }
}

impl From<&[f64]> for Variant {
    fn from(value: &[f64]) -> Self {
        Variant::Matrix(DMatrix::from_column_slice(value.len(), 1, value))
    }
}

impl From<Vec<f64>> for Variant {
    fn from(value: Vec<f64>) -> Self {
        Variant::from(value.as_slice())
    }
}

/// Named [`Variant`] values attached to a molecule.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct VariantMap(HashMap<String, Variant>);

impl VariantMap {
    pub fn new() -> Self {
        VariantMap(HashMap::new())
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        self.0.insert(name.into(), value.into());
    }

    /// The value stored under `name`, or `Variant::Null`.
    pub fn value(&self, name: &str) -> &Variant {
        static NULL: Variant = Variant::Null;
        self.0.get(name).unwrap_or(&NULL)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Deref for VariantMap {
    type Target = HashMap<String, Variant>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for VariantMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a> IntoIterator for &'a VariantMap {
    type Item = (&'a String, &'a Variant);
    type IntoIter = <&'a HashMap<String, Variant> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn double_round_trip() {
        let value = 0.1 + 0.2;
        let variant = Variant::from(value);
        let copy = variant.clone();
        assert_eq!(copy.variant_type(), VariantType::Double);
        assert_eq!(copy.to_double(), value);
        assert_eq!(copy.value::<f64>(), value);
    }

    #[test]
    fn list_round_trip() {
        let list = vec![1.5, -2.0, 3.25, 1e-9];
        let variant = Variant::from(list.clone());
        assert_eq!(variant.variant_type(), VariantType::Matrix);
        assert_eq!(variant.to_matrix().shape(), (4, 1));
        assert_eq!(variant.to_list(), list);

        // more than one column can not be read as a list
        let wide = Variant::from(DMatrix::<f64>::zeros(2, 2));
        assert!(wide.to_list().is_empty());
        assert!(Variant::from(1.0).to_list().is_empty());
    }

    #[test]
    fn copies_are_independent() {
        let mut original = Variant::from("hello");
        let copy = original.clone();
        original.set_value("changed");
        assert_eq!(copy.to_string_value(), "hello");
        assert_eq!(original.to_string_value(), "changed");

        let mut matrix = Variant::from(DMatrix::from_element(2, 3, 1.0));
        let copy = matrix.clone();
        if let Variant::Matrix(m) = &mut matrix {
            m[(0, 0)] = 5.0;
        }
        assert_eq!(copy.to_matrix()[(0, 0)], 1.0);
        assert_eq!(matrix.to_matrix_ref()[(0, 0)], 5.0);
    }

    #[test]
    fn assignment_replaces_type() {
        let mut variant = Variant::from(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(variant.variant_type(), VariantType::Vector);
        variant.set_value(7);
        assert_eq!(variant.variant_type(), VariantType::Int);
        assert_eq!(variant.to_vector3(), Vector3::zeros());
        variant.clear();
        assert!(variant.is_null());
        assert_eq!(variant.to_int(), 0);
    }

    #[test]
    fn string_to_number() {
        assert_eq!(Variant::from("42").to_int(), 42);
        assert_eq!(Variant::from(" -17 ").to_long(), -17);
        assert_eq!(Variant::from("3.7").to_int(), 3);
        assert_eq!(Variant::from("12abc").to_int(), 12);
        assert_eq!(Variant::from("not a number").to_int(), 0);
        assert_eq!(Variant::from("").to_double(), 0.0);
        assert_approx_eq!(Variant::from("2.5e2").to_double(), 250.0);
        assert_approx_eq!(Variant::from("1.25").to_float(), 1.25f32);
        assert_eq!(Variant::from("77").to_short(), 77);
    }

    #[test]
    fn narrowing_truncates() {
        assert_eq!(Variant::from(3.99).to_int(), 3);
        assert_eq!(Variant::from(-3.99f32).to_int(), -3);
        assert_eq!(Variant::from(0x1_0000_0005i64).to_int(), 5);
        assert_eq!(Variant::from(1.0e-50).to_float(), 0.0);
        assert_eq!(Variant::from(true).to_int(), 1);
        assert_eq!(Variant::from(70000).to_short(), 70000i32 as i16);
    }

    #[test]
    fn misc_conversions() {
        assert!(Variant::from(true).to_bool());
        assert!(Variant::from(2).to_bool());
        assert!(!Variant::from("true").to_bool());

        assert_eq!(Variant::from('A').to_int(), 65);
        assert_eq!(Variant::from('A').to_char(), 'A');
        assert_eq!(Variant::from("xyz").to_char(), 'x');
        assert_eq!(Variant::Null.to_char(), '\0');

        assert_eq!(Variant::from(5).to_string_value(), "5");
        assert_eq!(Variant::from(2.5).to_string_value(), "2.5");
        assert_eq!(Variant::from(true).to_string_value(), "");

        assert_eq!(Variant::pointer(0xdead).to_pointer(), Some(0xdead));
        assert_eq!(Variant::from(1).to_pointer(), None);

        let v = Variant::from((1.0, 2.0, 3.0));
        assert_eq!(v.to_vector3(), Vector3::new(1.0, 2.0, 3.0));
        let vf = Variant::from(Vector3::new(1.5f32, 0.0, 0.0));
        assert_eq!(vf.to_vector3().x, 1.5);

        let mf = Variant::from(DMatrix::<f32>::from_element(1, 2, 0.5));
        assert_eq!(mf.to_matrix()[(0, 1)], 0.5);
        assert_eq!(Variant::from(1).to_matrix_ref().shape(), (0, 0));
    }

    #[test]
    fn variant_map() {
        let mut map = VariantMap::new();
        assert!(map.is_empty());
        assert_eq!(map.size(), 0);

        map.set_value("value1", 1);
        assert!(!map.is_empty());
        assert!(map.has_value("value1"));
        assert!(!map.has_value("value2"));
        assert_eq!(map.value("value1").to_int(), 1);
        assert!(map.value("value2").is_null());

        map.set_value("name", "water");
        assert_eq!(map.names(), vec!["name", "value1"]);
        map.remove("value1");
        assert_eq!(map.size(), 1);

        let mut count = 0;
        for (key, value) in &map {
            assert_eq!(key, "name");
            assert_eq!(value.to_string_value(), "water");
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
