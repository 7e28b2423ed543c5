// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

pub mod cjson;
pub mod cmsgpack;
pub mod mdl;
pub mod sdf;
pub mod trr;
pub mod turbomole;
pub mod xyz;

pub use cjson::{CjsonFormat, Encoding};
pub use cmsgpack::CMsgPackFormat;
pub use mdl::MdlFormat;
pub use sdf::SdfFormat;
pub use trr::TrrFormat;
pub use turbomole::TurbomoleFormat;
pub use xyz::XyzFormat;
