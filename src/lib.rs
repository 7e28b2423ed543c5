// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

pub mod angle_tools;
pub mod bond;
pub mod element;
pub mod error;
pub mod format;
pub mod format_registry;
pub mod formats;
pub mod molecule;
pub mod unit_cell;
pub mod units;
pub mod utilities;
pub mod valence;
pub mod variant;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub use bond::{Bond, BondOrder};
pub use error::{CError, ErrorKind, ErrorLog};
pub use format::{Codec, FileFormat, Format, Operations, ReadSeek};
pub use format_registry::FormatRegistry;
pub use molecule::{Atom, Molecule};
pub use unit_cell::UnitCell;
pub use variant::{Variant, VariantMap};

/// Reads `path` with the format matching its extension.
pub fn read_path(path: &Path) -> Result<Molecule, CError> {
    let mut format = Format::from_path(path)?;
    let mut reader = BufReader::new(File::open(path)?);
    let mut molecule = Molecule::new();
    format.codec_mut().read_molecule(&mut reader, &mut molecule)?;
    Ok(molecule)
}

/// Writes `molecule` to `path` with the format matching its extension.
pub fn write_path(path: &Path, molecule: &Molecule) -> Result<(), CError> {
    let mut format = Format::from_path(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    format.codec_mut().write_molecule(&mut writer, molecule)?;
    writer.flush()?;
    Ok(())
}
