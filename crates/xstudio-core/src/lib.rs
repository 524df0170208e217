//! Core engine for xstudio: a synchronized XML/XSLT editing model with a live
//! HTML preview.
//!
//! The crate is headless. Editor widgets, the preview surface and the clipboard
//! are reached through small traits so front-ends (the `xstudio` CLI, tests)
//! can plug in their own adapters.

pub mod buffer;
pub mod clipboard;
pub mod config;
pub mod debounce;
pub mod diagnostics;
pub mod doc_info;
pub mod export;
pub mod image;
pub mod logging;
pub mod navigator;
pub mod preview;
pub mod runtime;
pub mod sample;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod transform;
pub mod tree;
