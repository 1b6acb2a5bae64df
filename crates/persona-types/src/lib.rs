//! Foundation types for the persona profile service.
//!
//! This crate provides the identity and record types shared by every other
//! persona crate. It has no knowledge of storage or transport.
//!
//! # Key Types
//!
//! - [`ProfileKey`] -- Opaque unique identifier of a profile (UUID v4 by default)
//! - [`ViewerId`] -- Opaque identity of whoever loaded a profile
//! - [`Profile`] -- Stored profile document: opaque payload plus interaction counters
//! - [`ViewerRecord`] -- Durable witness that a viewer has been counted once
//! - [`InteractionCounters`] -- The `(total, unique)` counter pair of a profile

pub mod error;
pub mod key;
pub mod profile;
pub mod viewer;

pub use error::TypeError;
pub use key::ProfileKey;
pub use profile::{InteractionCounters, Profile, ViewerRecord};
pub use viewer::ViewerId;
