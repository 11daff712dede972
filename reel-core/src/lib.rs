// Reel
// Copyright (c) 2024-2026 The Project Reel Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![forbid(unsafe_code)]

pub mod container;
pub mod conv;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod io;
pub mod outcome;
pub mod packet;
pub mod stream;
pub mod units;
