//! Classifier output class → nail length lookup.
//!
//! 17 classes, 240 mm to 480 mm in 15 mm steps. The order matches the
//! classifier's output vector and never changes at runtime.

use serde::Serialize;

pub const CLASS_COUNT: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassMapping {
    pub diameter: Option<u32>,
    pub length: u32,
}

const fn class(length: u32) -> ClassMapping {
    ClassMapping {
        diameter: None,
        length,
    }
}

pub const CLASS_MAPPING: [ClassMapping; CLASS_COUNT] = [
    class(240),
    class(255),
    class(270),
    class(285),
    class(300),
    class(315),
    class(330), // 175 cm patient
    class(345),
    class(360),
    class(375),
    class(390),
    class(405),
    class(420),
    class(435),
    class(450),
    class(465),
    class(480),
];

/// Returned for indices the table does not cover.
pub const UNKNOWN_CLASS: ClassMapping = ClassMapping {
    diameter: None,
    length: 0,
};

pub fn length_for_class(index: usize) -> ClassMapping {
    CLASS_MAPPING.get(index).copied().unwrap_or(UNKNOWN_CLASS)
}
