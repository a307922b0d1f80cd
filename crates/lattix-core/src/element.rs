//! Floating-point element types the solver runs on.

use bytemuck::Pod;
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Runtime tag for an [`Element`] type, used by backends that dispatch to
/// precision-specific kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    F32,
    F64,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
        }
    }
}

/// A scalar type vectors and matrices can hold.
pub trait Element:
    num_traits::Float
    + FromPrimitive
    + ToPrimitive
    + Pod
    + Debug
    + Display
    + Sum
    + Send
    + Sync
    + 'static
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    const KIND: ElementKind;

    fn val_from_f64(v: f64) -> Self;
    fn val_to_f64(self) -> f64;
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::F64;

    fn val_from_f64(v: f64) -> Self {
        v
    }
    fn val_to_f64(self) -> f64 {
        self
    }
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;

    fn val_from_f64(v: f64) -> Self {
        v as f32
    }
    fn val_to_f64(self) -> f64 {
        self as f64
    }
}

/// Convert a slice between element types.
pub fn convert<S: Element, D: Element>(src: &[S]) -> Vec<D> {
    src.iter().map(|v| D::val_from_f64(v.val_to_f64())).collect()
}
