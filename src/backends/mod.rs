// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for capture and decoding
//!
//! This module provides the collaborators the scan engine drives:
//! - Camera capture (V4L2 or still images) rendered into a shared sink
//! - Decoder backends (native detector, software QR, software Code 39)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Scan Engine                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Camera    │    │     Decoders     │   │
//! │  │ (V4L2/file) │    │ (native / soft)  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Media devices, camera session and frame rasterization
//! - [`decoders`]: Decoder backend trait and its implementations

pub mod camera;
pub mod decoders;
