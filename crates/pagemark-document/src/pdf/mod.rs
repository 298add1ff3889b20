// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF output — page assembly and signing.

pub mod assembler;
pub mod signer;

pub use assembler::PageAssembler;
pub use signer::{FingerprintSigner, Signer, UnsignedSigner, verify_fingerprint};
