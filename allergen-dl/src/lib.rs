//! The building blocks of the food allergen detection pipeline.

mod common;
pub mod allergen;
pub mod annotation;
pub mod classes;
pub mod generator;
pub mod model;
pub mod processor;
