#![doc = include_str!("../README.md")]

pub use ww_utils as utils;
pub use ww_wire as wire;
