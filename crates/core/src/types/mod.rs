//! Core types for Cartsync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod report;

pub use cart::{Cart, CartInvariantError, ItemKey, LineItem};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use report::*;
