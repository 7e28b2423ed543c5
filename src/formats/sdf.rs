// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.
//

use std::collections::BTreeSet;
use std::io::Write;

use crate::error::CError;
use crate::format::{string_set, FileFormat, ReadSeek};
use crate::formats::mdl::MdlFormat;
use crate::molecule::Molecule;

/// SD files: MDL records followed by data items and `$$$$`.
#[derive(Debug, Clone, Copy)]
pub struct SdfFormat {
    mdl: MdlFormat,
}

impl Default for SdfFormat {
    fn default() -> Self {
        let mut mdl = MdlFormat::new();
        mdl.set_write_properties(true);
        SdfFormat { mdl }
    }
}

impl SdfFormat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileFormat for SdfFormat {
    fn identifier(&self) -> &'static str {
        "SDF"
    }

    fn name(&self) -> &'static str {
        "SDF"
    }

    fn description(&self) -> &'static str {
        "Generic format that contains atoms, bonds, positions and data items."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["sdf", "sd3"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-mdl-molfile"])
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        self.mdl.read_molecule(reader, molecule)
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        self.mdl.write_molecule(writer, molecule)
    }
}
