//! HTTP surface
//!
//! `view` resolves a flowsheet request into a grid or a no-data prompt;
//! `rest` exposes that and entry charting over warp.

pub mod rest;
pub mod view;
