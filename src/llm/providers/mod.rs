// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat transport implementations

pub mod pollinations;

pub use pollinations::PollinationsTransport;
