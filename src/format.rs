// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use crate::error::{CError, ErrorKind, ErrorLog};
use crate::format_registry::FormatRegistry;
use crate::formats::cjson::CjsonFormat;
use crate::formats::cmsgpack::CMsgPackFormat;
use crate::formats::mdl::MdlFormat;
use crate::formats::sdf::SdfFormat;
use crate::formats::trr::TrrFormat;
use crate::formats::turbomole::TurbomoleFormat;
use crate::formats::xyz::XyzFormat;
use crate::molecule::Molecule;
use log::debug;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

/// Byte source accepted by [`FileFormat::read_molecule`].
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// What a codec is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operations {
    pub read: bool,
    pub write: bool,
    /// The encoding is text, so `read_string`/`write_string` make sense.
    pub text: bool,
}

impl Operations {
    pub const READ_WRITE_TEXT: Operations = Operations {
        read: true,
        write: true,
        text: true,
    };

    pub const READ_WRITE_BINARY: Operations = Operations {
        read: true,
        write: true,
        text: false,
    };
}

/// Common interface of every molecule file format.
pub trait FileFormat {
    /// Unique, stable identifier such as `"TRR"` or `"SDF"`.
    fn identifier(&self) -> &'static str;

    /// Human readable name.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Lower-case file extensions, without the leading dot.
    fn file_extensions(&self) -> BTreeSet<String>;

    fn mime_types(&self) -> BTreeSet<String>;

    fn supported_operations(&self) -> Operations {
        Operations::READ_WRITE_TEXT
    }

    /// Reads one molecule (possibly with several coordinate frames) from
    /// `reader` into `molecule`, which is expected to be empty.
    ///
    /// # Errors
    ///
    /// Returns an error when the data is malformed. The molecule may be left
    /// partially filled in that case.
    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError>;

    /// Writes `molecule` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the molecule can not be represented in this
    /// format or if writing fails.
    fn write_molecule(&mut self, writer: &mut dyn Write, molecule: &Molecule)
        -> Result<(), CError>;
}

/// Builds a set of owned strings from literals.
pub(crate) fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// One of the concrete formats of this crate.
#[derive(Debug, Clone)]
pub enum Codec {
    Trr(TrrFormat),
    Mdl(MdlFormat),
    Sdf(SdfFormat),
    Turbomole(TurbomoleFormat),
    Cjson(CjsonFormat),
    CMsgPack(CMsgPackFormat),
    Xyz(XyzFormat),
}

macro_rules! dispatch {
    ($codec:expr, $format:ident => $body:expr) => {
        match $codec {
            Codec::Trr($format) => $body,
            Codec::Mdl($format) => $body,
            Codec::Sdf($format) => $body,
            Codec::Turbomole($format) => $body,
            Codec::Cjson($format) => $body,
            Codec::CMsgPack($format) => $body,
            Codec::Xyz($format) => $body,
        }
    };
}

impl FileFormat for Codec {
    fn identifier(&self) -> &'static str {
        dispatch!(self, format => format.identifier())
    }

    fn name(&self) -> &'static str {
        dispatch!(self, format => format.name())
    }

    fn description(&self) -> &'static str {
        dispatch!(self, format => format.description())
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        dispatch!(self, format => format.file_extensions())
    }

    fn mime_types(&self) -> BTreeSet<String> {
        dispatch!(self, format => format.mime_types())
    }

    fn supported_operations(&self) -> Operations {
        dispatch!(self, format => format.supported_operations())
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        dispatch!(self, format => format.read_molecule(reader, molecule))
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        dispatch!(self, format => format.write_molecule(writer, molecule))
    }
}

/// A codec together with its error channel.
///
/// `read*`/`write*` never panic on bad input: they return `false` (or
/// `None`) and the reason is available from [`Format::error`] until the next
/// call.
#[derive(Debug, Clone)]
pub struct Format {
    codec: Codec,
    errors: ErrorLog,
}

impl From<Codec> for Format {
    fn from(codec: Codec) -> Self {
        Format::new(codec)
    }
}

impl Format {
    pub fn new(codec: Codec) -> Self {
        Format {
            codec,
            errors: ErrorLog::new(),
        }
    }

    /// Picks the format from the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CError::UnknownFormat`] if no format handles the extension.
    pub fn from_path(path: &Path) -> Result<Self, CError> {
        FormatRegistry::new()
            .from_path(path)
            .ok_or_else(|| CError::UnknownFormat(path.display().to_string()))
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut Codec {
        &mut self.codec
    }

    pub fn identifier(&self) -> &'static str {
        self.codec.identifier()
    }

    /// Everything that went wrong during the last call, one message per line.
    pub fn error(&self) -> &str {
        self.errors.as_str()
    }

    /// Kind of the last error of the last call.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.errors.last_kind()
    }

    fn report<T>(&mut self, result: Result<T, CError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                debug!("{} format failed: {error}", self.codec.identifier());
                self.errors.append_error(&error);
                None
            }
        }
    }

    pub fn read(&mut self, reader: &mut dyn ReadSeek, molecule: &mut Molecule) -> bool {
        self.errors.clear();
        let result = self.codec.read_molecule(reader, molecule);
        self.report(result).is_some()
    }

    pub fn write(&mut self, writer: &mut dyn Write, molecule: &Molecule) -> bool {
        self.errors.clear();
        let result = self.codec.write_molecule(writer, molecule);
        self.report(result).is_some()
    }

    pub fn read_bytes(&mut self, bytes: &[u8], molecule: &mut Molecule) -> bool {
        self.read(&mut Cursor::new(bytes), molecule)
    }

    pub fn write_bytes(&mut self, molecule: &Molecule) -> Option<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, molecule).then_some(buffer)
    }

    pub fn read_string(&mut self, string: &str, molecule: &mut Molecule) -> bool {
        self.read_bytes(string.as_bytes(), molecule)
    }

    /// Writes `molecule` into a string. Binary formats fail with an
    /// unsupported-operation error.
    pub fn write_string(&mut self, molecule: &Molecule) -> Option<String> {
        if !self.codec.supported_operations().text {
            self.errors.clear();
            let error = CError::Unsupported(format!(
                "{} is a binary format and can not be written to a string",
                self.codec.identifier()
            ));
            return self.report(Err(error));
        }
        let bytes = self.write_bytes(molecule)?;
        let result = String::from_utf8(bytes)
            .map_err(|e| CError::GenericError(format!("output is not valid UTF-8: {e}")));
        self.report(result)
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>, molecule: &mut Molecule) -> bool {
        self.errors.clear();
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(error) => return self.report::<()>(Err(error.into())).is_some(),
        };
        let mut reader = BufReader::new(file);
        self.read(&mut reader, molecule)
    }

    pub fn write_file(&mut self, path: impl AsRef<Path>, molecule: &Molecule) -> bool {
        self.errors.clear();
        let file = match File::create(path.as_ref()) {
            Ok(file) => file,
            Err(error) => return self.report::<()>(Err(error.into())).is_some(),
        };
        let mut writer = BufWriter::new(file);
        if !self.write(&mut writer, molecule) {
            return false;
        }
        let result = writer.flush().map_err(CError::from);
        self.report(result).is_some()
    }
}
