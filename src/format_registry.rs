// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Picks a codec by identifier, file extension, MIME type or content.

use std::collections::BTreeSet;
use std::path::Path;

use crate::format::{Codec, FileFormat, Format};
use crate::formats::{
    CMsgPackFormat, CjsonFormat, MdlFormat, SdfFormat, TrrFormat, TurbomoleFormat, XyzFormat,
};
use crate::utilities::{lexical_cast, lexical_cast_all, trimmed};

/// Magic number opening every TRR frame.
const TRR_MAGIC: i32 = 1993;

/// Bytes of text inspected by [`FormatRegistry::sniff`].
const SNIFF_LENGTH: usize = 4096;

/// The known codecs. Every lookup returns a fresh [`Format`] for the first
/// registered codec that matches.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    codecs: Vec<Codec>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = FormatRegistry { codecs: Vec::new() };
        registry.register(Codec::Trr(TrrFormat::new()));
        registry.register(Codec::Mdl(MdlFormat::new()));
        registry.register(Codec::Sdf(SdfFormat::new()));
        registry.register(Codec::Turbomole(TurbomoleFormat::new()));
        registry.register(Codec::Cjson(CjsonFormat::new()));
        registry.register(Codec::CMsgPack(CMsgPackFormat::new()));
        registry.register(Codec::Xyz(XyzFormat::new()));
        registry
    }
}

impl FormatRegistry {
    /// A registry with every codec of this crate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry without any codec.
    pub fn empty() -> Self {
        FormatRegistry { codecs: Vec::new() }
    }

    pub fn register(&mut self, codec: Codec) {
        self.codecs.push(codec);
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }

    fn find(&self, matches: impl Fn(&Codec) -> bool) -> Option<Format> {
        self.codecs
            .iter()
            .find(|&codec| matches(codec))
            .map(|codec| Format::new(codec.clone()))
    }

    pub fn by_identifier(&self, identifier: &str) -> Option<Format> {
        self.find(|codec| codec.identifier().eq_ignore_ascii_case(identifier))
    }

    /// Case-insensitive, with or without the leading dot.
    pub fn by_extension(&self, extension: &str) -> Option<Format> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if extension.is_empty() {
            return None;
        }
        self.find(|codec| codec.file_extensions().contains(&extension))
    }

    pub fn by_mime_type(&self, mime_type: &str) -> Option<Format> {
        let mime_type = trimmed(mime_type).to_ascii_lowercase();
        self.find(|codec| codec.mime_types().contains(&mime_type))
    }

    pub fn from_path(&self, path: &Path) -> Option<Format> {
        let extension = path.extension()?.to_str()?;
        self.by_extension(extension)
    }

    /// Guesses the codec from the first bytes of some data.
    pub fn sniff(&self, bytes: &[u8]) -> Option<Format> {
        self.by_identifier(sniff_identifier(bytes)?)
    }

    /// Every extension known to the registry.
    pub fn file_extensions(&self) -> BTreeSet<String> {
        self.codecs
            .iter()
            .flat_map(|codec| codec.file_extensions())
            .collect()
    }

    pub fn mime_types(&self) -> BTreeSet<String> {
        self.codecs
            .iter()
            .flat_map(|codec| codec.mime_types())
            .collect()
    }
}

fn sniff_identifier(bytes: &[u8]) -> Option<&'static str> {
    if let Some(head) = bytes.first_chunk::<4>() {
        if i32::from_be_bytes(*head) == TRR_MAGIC || i32::from_le_bytes(*head) == TRR_MAGIC {
            return Some("TRR");
        }
    }
    if matches!(bytes.first(), Some(0x80..=0x8f | 0xde | 0xdf)) {
        return Some("CMsgPack");
    }

    let head = &bytes[..bytes.len().min(SNIFF_LENGTH)];
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // the cut may fall inside a character
        Err(error) if error.error_len().is_none() => {
            std::str::from_utf8(&head[..error.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };

    let content = text.trim_start();
    if content.starts_with('{') {
        return Some("CJSON");
    }
    if content.starts_with('$') {
        return Some("Turbomole");
    }

    let lines: Vec<&str> = text.lines().take(4).collect();
    if looks_like_molfile(&lines) {
        return Some(if text.contains("$$$$") || text.contains("> <") {
            "SDF"
        } else {
            "MDL"
        });
    }
    if looks_like_xyz(&lines) {
        return Some("XYZ");
    }
    None
}

/// Fourth line is a V2000 or V3000 counts line.
fn looks_like_molfile(lines: &[&str]) -> bool {
    let Some(counts) = lines.get(3) else {
        return false;
    };
    let versioned = counts.contains("V2000") || counts.contains("V3000");
    let atoms = counts.get(0..3).and_then(lexical_cast::<u32>);
    let bonds = counts.get(3..6).and_then(lexical_cast::<u32>);
    versioned && atoms.is_some() && bonds.is_some()
}

/// An atom count, a comment line and an atom line.
fn looks_like_xyz(lines: &[&str]) -> bool {
    let (Some(count), Some(atom)) = (lines.first(), lines.get(2)) else {
        return false;
    };
    if lexical_cast::<usize>(count).is_none() {
        return false;
    }
    let tokens: Vec<&str> = atom.split_whitespace().collect();
    tokens.len() >= 4 && lexical_cast_all::<f64, _>(tokens[1..4].iter().copied()).is_some()
}
