// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response envelope encryption.

pub mod envelope;

pub use envelope::{EnvelopeCodec, EnvelopeError, EnvelopeMode};
