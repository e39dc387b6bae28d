#![warn(missing_docs)]
//! A toolkit for picking reflectors in depth-sounder survey lines
//!
//! Survey lines are read from a [`store::TraceStore`], auto-picked by the
//! [`picker`], and held and edited through a [`picks::PickLineManager`].
//! Picks are corrected with a [`tide::TideCurve`] by the [`correction`]
//! functions and written out as survey points by [`export`].
pub mod algorithms;
pub mod cli;
pub mod config;
pub mod correction;
pub mod error;
pub mod export;
pub mod model;
pub mod picker;
pub mod picks;
pub mod project;
pub mod records;
pub mod store;
pub mod tide;
