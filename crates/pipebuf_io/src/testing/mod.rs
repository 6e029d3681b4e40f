// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Utilities for testing code that uses `pipebuf_io` abstractions.

mod fake_sink;
mod fake_source;
mod log_capture;
mod slow_channel;

pub use fake_sink::*;
pub use fake_source::*;
pub use log_capture::*;
pub use slow_channel::*;
