// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::collections::BTreeSet;
use std::io::Write;

use crate::error::CError;
use crate::format::{string_set, FileFormat, Operations, ReadSeek};
use crate::formats::cjson::{CjsonFormat, Encoding};
use crate::molecule::Molecule;

/// Chemical JSON documents encoded as MessagePack.
#[derive(Debug, Clone, Copy)]
pub struct CMsgPackFormat {
    cjson: CjsonFormat,
}

impl Default for CMsgPackFormat {
    fn default() -> Self {
        CMsgPackFormat {
            cjson: CjsonFormat::new().with_encoding(Encoding::MessagePack),
        }
    }
}

impl CMsgPackFormat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileFormat for CMsgPackFormat {
    fn identifier(&self) -> &'static str {
        "CMsgPack"
    }

    fn name(&self) -> &'static str {
        "Chemical MessagePack"
    }

    fn description(&self) -> &'static str {
        "Chemical JSON in the binary MessagePack encoding."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["cmpk"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-cmpack"])
    }

    fn supported_operations(&self) -> Operations {
        Operations::READ_WRITE_BINARY
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        self.cjson.read_molecule(reader, molecule)
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        self.cjson.write_molecule(writer, molecule)
    }
}
