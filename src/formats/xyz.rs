// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! XYZ files, one block per coordinate frame, with the extended XYZ
//! `key=value` comment line.

use std::collections::BTreeSet;
use std::io::Write;

use log::{debug, warn};
use nalgebra::Vector3;

use crate::element::{self, CustomElementPool};
use crate::error::CError;
use crate::format::{string_set, FileFormat, ReadSeek};
use crate::molecule::{Molecule, NAME_KEY};
use crate::unit_cell::UnitCell;
use crate::utilities::{lexical_cast, lexical_cast_all, trimmed};
use crate::variant::Variant;

const FORMAT: &str = "XYZ";
const LATTICE_KEY: &str = "Lattice";
const PROPERTIES_KEY: &str = "Properties";
const DEFAULT_PROPERTIES: &str = "species:S:1:pos:R:3";

/// Splits an extended XYZ comment line into `key=value` pairs.
///
/// Values may be quoted with `"` to hold spaces. A key without `=` is a
/// flag and has no value.
fn comment_fields(line: &str) -> Vec<(&str, Option<&str>)> {
    let mut fields = Vec::new();
    let mut rest = line.trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = &rest[key_end..];

        let after_key = rest.trim_start();
        let value = match after_key.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                let (value, remaining) = match after.strip_prefix('"') {
                    Some(quoted) => match quoted.find('"') {
                        Some(end) => (&quoted[..end], &quoted[end + 1..]),
                        None => (quoted, ""),
                    },
                    None => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        (&after[..end], &after[end..])
                    }
                };
                rest = remaining;
                Some(value)
            }
            None => None,
        };

        if !key.is_empty() {
            fields.push((key, value));
        }
        rest = rest.trim_start();
    }
    fields
}

/// Value of a free-form comment field in the molecule data.
fn field_value(value: Option<&str>) -> Variant {
    let Some(value) = value else {
        return Variant::Bool(true);
    };
    match value.to_ascii_lowercase().as_str() {
        "t" | "true" => return Variant::Bool(true),
        "f" | "false" => return Variant::Bool(false),
        _ => {}
    }
    if let Some(number) = lexical_cast::<i32>(value) {
        return Variant::Int(number);
    }
    if let Some(number) = lexical_cast::<f64>(value) {
        return Variant::Double(number);
    }
    match lexical_cast_all::<f64, _>(value.split_whitespace()) {
        Some(numbers) if !numbers.is_empty() => Variant::from(numbers),
        _ => Variant::String(value.to_string()),
    }
}

/// What the comment line of one block says about the structure.
#[derive(Debug, Default)]
struct Comment {
    cell: Option<UnitCell>,
    data: Vec<(String, Variant)>,
}

impl Comment {
    fn parse(line: &str, number: usize) -> Result<Self, CError> {
        let mut comment = Comment::default();
        let fields = comment_fields(line);
        let extended = fields.iter().any(|(_, value)| value.is_some());
        if !extended {
            if !trimmed(line).is_empty() {
                comment
                    .data
                    .push((NAME_KEY.to_string(), Variant::from(trimmed(line))));
            }
            return Ok(comment);
        }

        for (key, value) in fields {
            if key.eq_ignore_ascii_case(LATTICE_KEY) {
                let numbers = value
                    .and_then(|v| lexical_cast_all::<f64, _>(v.split_whitespace()))
                    .filter(|numbers| numbers.len() == 9)
                    .ok_or_else(|| {
                        CError::grammar(FORMAT, number, "Lattice needs 9 numbers")
                    })?;
                let a = Vector3::new(numbers[0], numbers[1], numbers[2]);
                let b = Vector3::new(numbers[3], numbers[4], numbers[5]);
                let c = Vector3::new(numbers[6], numbers[7], numbers[8]);
                comment.cell = Some(UnitCell::try_new(a, b, c)?);
            } else if key.eq_ignore_ascii_case(PROPERTIES_KEY) {
                let columns = value.unwrap_or_default();
                if !columns.starts_with(DEFAULT_PROPERTIES) {
                    return Err(CError::grammar(
                        FORMAT,
                        number,
                        format!("Properties must start with {DEFAULT_PROPERTIES}, got '{columns}'"),
                    ));
                }
                if columns.len() > DEFAULT_PROPERTIES.len() {
                    debug!("ignoring extra per-atom columns: {columns}");
                }
            } else {
                comment.data.push((key.to_string(), field_value(value)));
            }
        }
        Ok(comment)
    }
}

/// One `count / comment / atoms` block.
struct Block<'a> {
    comment: Comment,
    symbols: Vec<&'a str>,
    positions: Vec<Vector3<f64>>,
}

struct Blocks<'a> {
    lines: std::str::Lines<'a>,
    number: usize,
}

impl<'a> Blocks<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        self.number += 1;
        self.lines.next()
    }

    fn error(&self, message: impl Into<String>) -> CError {
        CError::grammar(FORMAT, self.number, message)
    }

    /// Reads the next block, `None` at the end of the input.
    fn next_block(&mut self) -> Result<Option<Block<'a>>, CError> {
        let count = loop {
            let Some(line) = self.next_line() else {
                return Ok(None);
            };
            if !trimmed(line).is_empty() {
                break lexical_cast::<usize>(line)
                    .ok_or_else(|| self.error(format!("expected an atom count, got '{line}'")))?;
            }
        };

        let comment = self
            .next_line()
            .ok_or_else(|| self.error("missing comment line"))?;
        let comment = Comment::parse(comment, self.number)?;

        let mut symbols = Vec::with_capacity(count);
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            let line = self
                .next_line()
                .ok_or_else(|| self.error(format!("expected {count} atom lines")))?;
            let mut tokens = line.split_whitespace();
            let symbol = tokens
                .next()
                .ok_or_else(|| self.error("empty atom line"))?;
            let coordinates: Vec<f64> = tokens
                .take(3)
                .map(|token| {
                    lexical_cast(token)
                        .ok_or_else(|| self.error(format!("invalid coordinate '{token}'")))
                })
                .collect::<Result<_, _>>()?;
            let [x, y, z] = coordinates[..] else {
                return Err(self.error("atom line needs a symbol and three coordinates"));
            };
            symbols.push(symbol);
            positions.push(Vector3::new(x, y, z));
        }

        Ok(Some(Block {
            comment,
            symbols,
            positions,
        }))
    }
}

/// Atomic number for an atom label: an element symbol, a bare atomic
/// number, or else a custom element.
fn resolve_symbol(symbol: &str, pool: &mut CustomElementPool) -> Result<u8, CError> {
    if let Some(number) = element::atomic_number_from_symbol(symbol) {
        return Ok(number);
    }
    if let Some(number) = lexical_cast::<u8>(symbol).filter(|n| element::symbol(*n).is_some()) {
        return Ok(number);
    }
    pool.code_for(symbol)
}

/// Label of an atom as a single token, so the line still splits into a
/// symbol and three coordinates. Whitespace inside custom labels becomes
/// `_`.
fn atom_token(label: &str) -> String {
    let token = label.split_whitespace().collect::<Vec<_>>().join("_");
    if token.is_empty() {
        "X".to_string()
    } else {
        token
    }
}

/// Reader and writer for (extended) XYZ files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XyzFormat;

impl XyzFormat {
    pub fn new() -> Self {
        XyzFormat
    }

    fn read_text(text: &str, molecule: &mut Molecule) -> Result<(), CError> {
        let mut blocks = Blocks {
            lines: text.lines(),
            number: 0,
        };
        let first = blocks
            .next_block()?
            .ok_or_else(|| blocks.error("no atoms in the input"))?;

        let mut pool = CustomElementPool::new();
        for (symbol, position) in first.symbols.iter().zip(&first.positions) {
            let atom = molecule.add_atom(resolve_symbol(symbol, &mut pool)?);
            molecule.set_atom_position_3d(atom, *position)?;
        }
        molecule.set_custom_element_map(pool.into_map());
        if let Some(cell) = first.comment.cell {
            molecule.set_unit_cell(cell)?;
        }
        for (key, value) in first.comment.data {
            molecule.data_mut().set_value(key, value);
        }
        let atom_count = first.positions.len();
        molecule.set_coordinate_3d(first.positions, 0)?;

        while let Some(block) = blocks.next_block()? {
            let frame = molecule.coordinate_3d_count();
            if block.positions.len() != atom_count {
                return Err(CError::FrameSizeMismatch {
                    frame,
                    expected: atom_count,
                    got: block.positions.len(),
                });
            }
            if block.comment.cell.is_some() && block.comment.cell.as_ref() != molecule.unit_cell()
            {
                warn!("frame {frame} has a different unit cell, keeping the first one");
            }
            molecule.set_coordinate_3d(block.positions, frame)?;
        }
        Ok(())
    }

    fn write_block(
        writer: &mut dyn Write,
        molecule: &Molecule,
        labels: &[String],
        positions: &[Vector3<f64>],
    ) -> Result<(), CError> {
        writeln!(writer, "{}", labels.len())?;

        let mut comment = Vec::new();
        if let Some(cell) = molecule.unit_cell() {
            let vectors = [cell.a_vector(), cell.b_vector(), cell.c_vector()];
            let numbers: Vec<String> = vectors
                .iter()
                .flat_map(|v| v.iter().map(|x| format!("{x:.8}")))
                .collect();
            comment.push(format!("{LATTICE_KEY}=\"{}\"", numbers.join(" ")));
            comment.push(format!("{PROPERTIES_KEY}={DEFAULT_PROPERTIES}"));
        }
        let name = molecule.data().value(NAME_KEY).to_string_value();
        if !name.is_empty() {
            if comment.is_empty() && !name.contains('=') {
                comment.push(name);
            } else {
                comment.push(format!("{NAME_KEY}=\"{name}\""));
            }
        }
        writeln!(writer, "{}", comment.join(" "))?;

        for (label, position) in labels.iter().zip(positions) {
            writeln!(
                writer,
                "{label:<3} {:15.8} {:15.8} {:15.8}",
                position.x, position.y, position.z
            )?;
        }
        Ok(())
    }
}

impl FileFormat for XyzFormat {
    fn identifier(&self) -> &'static str {
        "XYZ"
    }

    fn name(&self) -> &'static str {
        "XYZ"
    }

    fn description(&self) -> &'static str {
        "Atom symbols and Cartesian coordinates, one block per frame."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["xyz", "extxyz"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-xyz"])
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::read_text(&text, molecule)
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        let labels: Vec<String> = molecule
            .atoms()
            .map(|(index, _)| atom_token(&molecule.atom_label(index).unwrap_or_default()))
            .collect();

        if molecule.coordinate_3d_count() == 0 {
            return Self::write_block(writer, molecule, &labels, &molecule.atom_positions_3d());
        }
        for frame in 0..molecule.coordinate_3d_count() {
            if let Some(positions) = molecule.coordinate_3d(frame) {
                Self::write_block(writer, molecule, &labels, positions)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::TrrFormat;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    const TRAJECTORY: &str = "3
water
O 0.0 0.0 0.0
H 0.9572 0.0 0.0
H -0.24 0.9266 0.0
3
water, later
O 0.1 0.0 0.0
H 1.0572 0.0 0.0
H -0.14 0.9266 0.0

";

    fn read(text: &str) -> Result<Molecule, CError> {
        let mut molecule = Molecule::new();
        XyzFormat::new().read_molecule(&mut Cursor::new(text.as_bytes()), &mut molecule)?;
        Ok(molecule)
    }

    #[test]
    fn trajectory() {
        let molecule = read(TRAJECTORY).unwrap();
        assert_eq!(molecule.atomic_numbers(), vec![8, 1, 1]);
        assert_eq!(molecule.coordinate_3d_count(), 2);
        assert_approx_eq!(molecule.coordinate_3d(1).unwrap()[1].x, 1.0572);
        // atoms keep the positions of the first block
        assert_approx_eq!(molecule.atom(0).unwrap().position3d.x, 0.0);
        assert_eq!(molecule.data().value(NAME_KEY).to_string_value(), "water");
        assert!(molecule.unit_cell().is_none());
    }

    #[test]
    fn extended_comment() {
        let text = r#"2
Lattice="5.0 0.0 0.0 0.0 6.0 0.0 1.0 0.0 7.0" Properties=species:S:1:pos:R:3:forces:R:3 energy=-12.5 step=4 config_type="bulk Ar" pbc="T T T" relaxed
Ar 0.0 0.0 0.0 0.1 0.2 0.3
Ar 2.5 3.0 3.5 -0.1 -0.2 -0.3
"#;
        let molecule = read(text).unwrap();
        let cell = molecule.unit_cell().unwrap();
        assert_eq!(cell.c_vector(), Vector3::new(1.0, 0.0, 7.0));
        assert_approx_eq!(cell.a(), 5.0);

        let data = molecule.data();
        assert_approx_eq!(data.value("energy").to_double(), -12.5);
        assert_eq!(data.value("step"), &Variant::Int(4));
        assert_eq!(data.value("config_type").to_string_value(), "bulk Ar");
        assert_eq!(data.value("pbc").to_string_value(), "T T T");
        assert_eq!(data.value("relaxed"), &Variant::Bool(true));
        assert!(!data.has_value(LATTICE_KEY));
        assert!(!data.has_value(NAME_KEY));
    }

    #[test]
    fn comment_fields_are_split() {
        let fields = comment_fields(r#"a=1 b = "two words"  flag c="unterminated"#);
        assert_eq!(
            fields,
            vec![
                ("a", Some("1")),
                ("b", Some("two words")),
                ("flag", None),
                ("c", Some("unterminated")),
            ]
        );
    }

    #[test]
    fn custom_and_numeric_symbols() {
        let text = "3\n\nCA 0 0 0\n6 1 0 0\nDummy 2 0 0\n";
        let molecule = read(text).unwrap();
        assert_eq!(molecule.atomic_number(0), Some(20));
        assert_eq!(molecule.atomic_number(1), Some(6));
        assert_eq!(molecule.atomic_number(2), Some(128));
        assert_eq!(molecule.atom_label(2).as_deref(), Some("Dummy"));
        assert!(!molecule.data().has_value(NAME_KEY));
    }

    #[test]
    fn labels_with_spaces_stay_one_token() {
        let mut trr = Vec::new();
        let mut source = Molecule::new();
        for x in [1.0, 4.0] {
            let atom = source.add_atom(1);
            source
                .set_atom_position_3d(atom, Vector3::new(x, 2.0, 3.0))
                .unwrap();
        }
        TrrFormat::new().write_molecule(&mut trr, &source).unwrap();
        let mut molecule = Molecule::new();
        TrrFormat::new()
            .read_molecule(&mut Cursor::new(trr), &mut molecule)
            .unwrap();
        assert_eq!(molecule.atom_label(0).as_deref(), Some("Atom 0"));

        let mut output = Vec::new();
        XyzFormat::new()
            .write_molecule(&mut output, &molecule)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Atom_1 "), "{text}");

        let copy = read(&text).unwrap();
        assert_eq!(copy.atom_count(), 2);
        assert_eq!(copy.atomic_numbers(), vec![128, 129]);
        assert_eq!(copy.atom_label(0).as_deref(), Some("Atom_0"));
        let position = copy.atom(1).unwrap().position3d;
        assert_approx_eq!(position.x, 4.0, 1e-5);
        assert_approx_eq!(position.y, 2.0, 1e-5);
        assert_approx_eq!(position.z, 3.0, 1e-5);

        assert_eq!(atom_token("united  atom\tCH3"), "united_atom_CH3");
        assert_eq!(atom_token(""), "X");
    }

    #[test]
    fn errors() {
        assert_eq!(read("").unwrap_err().kind(), ErrorKind::Grammar);
        assert_eq!(read("two\n\n").unwrap_err().kind(), ErrorKind::Grammar);
        assert!(matches!(
            read("2\n\nH 0 0 0\n"),
            Err(CError::Grammar { line: 4, .. })
        ));
        assert!(matches!(
            read("1\n\nH 0 zero 0\n"),
            Err(CError::Grammar { line: 3, .. })
        ));
        assert!(read("1\n\nH 0 0\n").is_err());
        assert!(read("1\nLattice=\"1 0 0 0 1 0\"\nH 0 0 0\n").is_err());
        assert_eq!(
            read("1\nLattice=\"1 0 0 0 1 0 0 0 0\"\nH 0 0 0\n")
                .unwrap_err()
                .kind(),
            ErrorKind::Semantic
        );
        assert!(read("1\nProperties=pos:R:3\nH 0 0 0\n").is_err());

        let text = TRAJECTORY.replacen("3\nwater, later", "2\nwater, later", 1);
        let text = text.replacen("H -0.14 0.9266 0.0\n", "", 1);
        assert!(matches!(
            read(&text),
            Err(CError::FrameSizeMismatch {
                frame: 1,
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn round_trip() {
        let mut molecule = read(TRAJECTORY).unwrap();
        molecule
            .set_unit_cell(UnitCell::new(
                Vector3::new(9.0, 0.0, 0.0),
                Vector3::new(0.0, 9.0, 0.0),
                Vector3::new(0.0, 0.5, 9.0),
            ))
            .unwrap();

        let mut output = Vec::new();
        XyzFormat::new()
            .write_molecule(&mut output, &molecule)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("Lattice=").count(), 2);

        let copy = read(&text).unwrap();
        assert_eq!(copy.atomic_numbers(), molecule.atomic_numbers());
        assert_eq!(copy.coordinate_3d_count(), 2);
        assert_eq!(copy.unit_cell(), molecule.unit_cell());
        assert_eq!(copy.data().value(NAME_KEY).to_string_value(), "water");
        assert_approx_eq!(copy.coordinate_3d(1).unwrap()[2].x, -0.14);
    }
}
