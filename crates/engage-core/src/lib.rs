//! Core types and utilities for the engage write-back engine.
//!
//! This crate provides the foundational types shared by the storage layer and
//! the engine:
//!
//! - **Identifiers**: `UserId`, `SubjectId`
//! - **Interactions**: `InteractionKind`, `InteractionKey`, `InteractionRecord`, `Interaction`
//! - **Attendance**: `YearMonth`, `MonthBitmap`, `CheckInOutcome`
//!
//! # Attendance bitmaps
//!
//! A month of check-ins is one bit per day. Day `d` lives at bit offset `d - 1`,
//! counted from the most significant bit of the first byte, so reading the first
//! `d` bits as an unsigned integer puts day 1 in the most significant position
//! and day `d` in the least significant one.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attendance;
pub mod error;
pub mod ids;
pub mod interaction;

pub use attendance::{day_offset, CheckInOutcome, MonthBitmap, YearMonth, MAX_DAYS_IN_MONTH};
pub use error::{EngageError, Result};
pub use ids::{SubjectId, UserId};
pub use interaction::{
    decode_state, encode_state, Interaction, InteractionKey, InteractionKind, InteractionRecord,
};
