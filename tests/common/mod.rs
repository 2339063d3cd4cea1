#![allow(dead_code)]

pub mod setup;

pub use setup::*;
