// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! MDL Molfiles (V2000 read and write, V3000 read) and the data items of
//! SD files.

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, SeekFrom, Write};
use std::ops::Range;
use std::str::FromStr;

use log::warn;
use nalgebra::Vector3;

use crate::bond::BondOrder;
use crate::element;
use crate::error::CError;
use crate::format::{string_set, FileFormat, ReadSeek};
use crate::molecule::{Molecule, NAME_KEY};
use crate::utilities::{lexical_cast, trimmed};
use crate::variant::VariantType;

const FORMAT: &str = "MDL";

/// Largest molecule a V2000 counts line can describe.
const V2000_MAX: usize = 999;

/// Cursor over the lines of a text, remembering how many bytes were used.
struct Lines<'a> {
    text: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Lines {
            text,
            offset: 0,
            number: 0,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        if self.offset >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.offset..];
        let (line, used) = match rest.find('\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.offset += used;
        self.number += 1;
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    fn expect(&mut self, what: &str) -> Result<&'a str, CError> {
        let number = self.number + 1;
        self.next_line().ok_or_else(|| {
            CError::grammar(FORMAT, number, format!("unexpected end of file, expected {what}"))
        })
    }

    fn error(&self, message: impl Into<String>) -> CError {
        CError::grammar(FORMAT, self.number, message)
    }
}

/// Parses the fixed-width column `range` of `line`, tolerating short lines.
fn column<T: FromStr>(line: &str, range: Range<usize>) -> Option<T> {
    let end = range.end.min(line.len());
    line.get(range.start..end).and_then(lexical_cast)
}

/// Charge from the legacy charge column of the V2000 atom block.
fn charge_from_code(code: i32) -> i8 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn code_from_charge(charge: i8) -> i32 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

fn element_from_symbol(symbol: &str, line: usize) -> u8 {
    element::atomic_number_from_symbol(symbol).unwrap_or_else(|| {
        warn!("unknown element '{symbol}' on line {line}, using 0");
        0
    })
}

/// Reader and writer for MDL Molfiles.
///
/// With `write_properties` set, string data of the molecule is written as
/// SD data items and the record is closed with `$$$$`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdlFormat {
    write_properties: bool,
}

impl MdlFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_write_properties(&mut self, write_properties: bool) {
        self.write_properties = write_properties;
    }

    pub fn write_properties(&self) -> bool {
        self.write_properties
    }

    fn read_record(lines: &mut Lines, molecule: &mut Molecule) -> Result<(), CError> {
        let name = loop {
            let line = lines
                .next_line()
                .ok_or_else(|| lines.error("no molecule in the input"))?;
            if !line.starts_with("$$$$") {
                break trimmed(line);
            }
        };
        if !name.is_empty() {
            molecule.data_mut().set_value(NAME_KEY, name);
        }
        lines.expect("program line")?;
        lines.expect("comment line")?;

        let counts = lines.expect("counts line")?;
        let is_v3000 = counts.get(33..39).map(trimmed) == Some("V3000")
            || trimmed(counts).ends_with("V3000");
        if is_v3000 {
            Self::read_v3000(lines, molecule)?;
        } else {
            let atoms = column::<usize>(counts, 0..3)
                .ok_or_else(|| lines.error("invalid atom count"))?;
            let bonds = column::<usize>(counts, 3..6)
                .ok_or_else(|| lines.error("invalid bond count"))?;
            Self::read_v2000(lines, molecule, atoms, bonds)?;
        }
        for index in molecule.perceive_implicit_hydrogens() {
            warn!("atom {} has more bonds than its valence allows", index + 1);
        }
        Self::read_data_items(lines, molecule);
        Ok(())
    }

    fn read_v2000(
        lines: &mut Lines,
        molecule: &mut Molecule,
        atom_count: usize,
        bond_count: usize,
    ) -> Result<(), CError> {
        let mut atoms = Vec::with_capacity(atom_count);
        let mut charges = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let line = lines.expect("atom line")?;
            if line.len() < 34 {
                return Err(lines.error("atom line too short"));
            }
            let x = column::<f64>(line, 0..10);
            let y = column::<f64>(line, 10..20);
            let z = column::<f64>(line, 20..30);
            let (Some(x), Some(y), Some(z)) = (x, y, z) else {
                return Err(lines.error("invalid atom coordinates"));
            };
            let symbol = line.get(31..34).map_or("", trimmed);
            let atom = molecule.add_atom(element_from_symbol(symbol, lines.number));
            molecule.set_atom_position_3d(atom, Vector3::new(x, y, z))?;
            atoms.push(atom);
            charges.push(charge_from_code(column(line, 36..39).unwrap_or(0)));
        }

        for _ in 0..bond_count {
            let line = lines.expect("bond line")?;
            let first = column::<usize>(line, 0..3);
            let second = column::<usize>(line, 3..6);
            let order = column::<i64>(line, 6..9).unwrap_or(1);
            let (Some(first), Some(second)) = (first, second) else {
                return Err(lines.error("invalid bond atoms"));
            };
            let lookup = |number: usize| {
                number
                    .checked_sub(1)
                    .and_then(|i| atoms.get(i).copied())
                    .ok_or_else(|| {
                        CError::InvalidBond(format!(
                            "line {}: atom {number} does not exist",
                            lines.number
                        ))
                    })
            };
            molecule.add_bond(lookup(first)?, lookup(second)?, BondOrder::from_code(order))?;
        }

        let mut charge_lines_seen = false;
        while let Some(line) = lines.next_line() {
            if line.starts_with("M  END") {
                break;
            }
            if let Some(entries) = line.strip_prefix("M  CHG") {
                if !charge_lines_seen {
                    // M  CHG supersedes the atom block charges
                    charges.iter_mut().for_each(|c| *c = 0);
                    charge_lines_seen = true;
                }
                let values: Vec<i64> = entries
                    .split_whitespace()
                    .skip(1)
                    .map(|token| {
                        lexical_cast(token).ok_or_else(|| lines.error("invalid M  CHG"))
                    })
                    .collect::<Result<_, _>>()?;
                for pair in values.chunks_exact(2) {
                    let index = pair[0]
                        .checked_sub(1)
                        .and_then(|i| usize::try_from(i).ok())
                        .filter(|i| *i < charges.len())
                        .ok_or_else(|| {
                            lines.error(format!("M  CHG for unknown atom {}", pair[0]))
                        })?;
                    charges[index] = i8::try_from(pair[1]).map_err(|_| {
                        lines.error(format!("M  CHG charge {} out of range", pair[1]))
                    })?;
                }
            }
        }

        for (atom, charge) in atoms.into_iter().zip(charges) {
            if charge != 0 {
                molecule.set_formal_charge(atom, charge)?;
            }
        }
        Ok(())
    }

    /// Collects the `M  V30` statements up to `M  END`, joining lines
    /// continued with a trailing `-`.
    fn v3000_statements(lines: &mut Lines) -> Result<Vec<(usize, String)>, CError> {
        let mut statements: Vec<(usize, String)> = Vec::new();
        let mut continued = false;
        loop {
            let line = lines.expect("M  END")?;
            if line.starts_with("M  END") {
                return Ok(statements);
            }
            let Some(content) = line.strip_prefix("M  V30 ") else {
                continue;
            };
            let (content, continues) = match content.trim_end().strip_suffix('-') {
                Some(head) => (head, true),
                None => (content.trim_end(), false),
            };
            match statements.last_mut() {
                Some((_, previous)) if continued => previous.push_str(content),
                _ => statements.push((lines.number, content.to_string())),
            }
            continued = continues;
        }
    }

    fn read_v3000(lines: &mut Lines, molecule: &mut Molecule) -> Result<(), CError> {
        #[derive(PartialEq)]
        enum Block {
            Other,
            Atom,
            Bond,
        }

        let statements = Self::v3000_statements(lines)?;
        let mut block = Block::Other;
        let mut ids: HashMap<&str, usize> = HashMap::new();
        for (number, statement) in &statements {
            let tokens: Vec<&str> = statement.split_whitespace().collect();
            let error = |message: &str| CError::grammar(FORMAT, *number, message);
            match tokens.as_slice() {
                ["BEGIN", "ATOM", ..] => block = Block::Atom,
                ["BEGIN", "BOND", ..] => block = Block::Bond,
                ["BEGIN", ..] | ["END", ..] => block = Block::Other,
                [id, symbol, x, y, z, rest @ ..] if block == Block::Atom => {
                    let position = [x, y, z].map(|value| lexical_cast::<f64>(value));
                    let [Some(x), Some(y), Some(z)] = position else {
                        return Err(error("invalid atom coordinates"));
                    };
                    let atom = molecule.add_atom(element_from_symbol(symbol, *number));
                    molecule.set_atom_position_3d(atom, Vector3::new(x, y, z))?;
                    for property in rest {
                        if let Some(charge) = property.strip_prefix("CHG=") {
                            let charge = lexical_cast::<i8>(charge)
                                .ok_or_else(|| error("invalid atom charge"))?;
                            molecule.set_formal_charge(atom, charge)?;
                        }
                    }
                    ids.insert(*id, atom);
                }
                [_, order, first, second, ..] if block == Block::Bond => {
                    let order =
                        lexical_cast::<i64>(order).ok_or_else(|| error("invalid bond type"))?;
                    let (Some(&first), Some(&second)) = (ids.get(first), ids.get(second)) else {
                        return Err(CError::InvalidBond(format!(
                            "line {number}: bond to an unknown atom"
                        )));
                    };
                    molecule.add_bond(first, second, BondOrder::from_code(order))?;
                }
                _ if block == Block::Other => {}
                _ => return Err(error("malformed V3000 statement")),
            }
        }
        Ok(())
    }

    /// Reads `> <name>` items up to `$$$$` or the end of the input.
    ///
    /// Inside an item only a blank line ends the value, so a value that
    /// looks like `$$$$` is kept as data.
    fn read_data_items(lines: &mut Lines, molecule: &mut Molecule) {
        let mut current: Option<(String, Vec<&str>)> = None;
        while let Some(line) = lines.next_line() {
            if let Some((name, values)) = current.as_mut() {
                if trimmed(line).is_empty() {
                    molecule.data_mut().set_value(name.as_str(), values.join("\n"));
                    current = None;
                } else {
                    values.push(line);
                }
                continue;
            }

            if line.starts_with("$$$$") {
                break;
            }
            if line.starts_with('>') {
                let name = line
                    .find('<')
                    .and_then(|start| {
                        let rest = &line[start + 1..];
                        rest.find('>').map(|end| rest[..end].to_string())
                    })
                    .unwrap_or_default();
                current = Some((name, Vec::new()));
            }
        }

        if let Some((name, values)) = current {
            molecule.data_mut().set_value(name, values.join("\n"));
        }
    }

    fn write_record(&self, writer: &mut dyn Write, molecule: &Molecule) -> Result<(), CError> {
        if molecule.atom_count() > V2000_MAX || molecule.bond_count() > V2000_MAX {
            return Err(CError::Unsupported(format!(
                "MDL V2000 files hold at most {V2000_MAX} atoms and bonds"
            )));
        }

        let name = molecule.data().value(NAME_KEY).to_string_value();
        writeln!(writer, "{name}")?;
        writeln!(writer, "  molgraph          3D")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "{:3}{:3}  0  0  0  0  0  0  0  0999 V2000",
            molecule.atom_count(),
            molecule.bond_count()
        )?;

        let mut numbers = HashMap::new();
        let mut charged = Vec::new();
        for (rank, (index, atom)) in molecule.atoms().enumerate() {
            let symbol = element::symbol(atom.atomic_number).ok_or_else(|| {
                CError::Unsupported(format!(
                    "atom {index} has no element symbol and can not be written as MDL"
                ))
            })?;
            let charge = atom.formal_charge.unwrap_or(0);
            let position = atom.position3d;
            writeln!(
                writer,
                "{:10.4}{:10.4}{:10.4} {:<3} 0{:3}  0  0  0  0  0  0  0  0  0  0",
                position.x,
                position.y,
                position.z,
                symbol,
                code_from_charge(charge)
            )?;
            numbers.insert(index, rank + 1);
            if charge != 0 {
                charged.push((rank + 1, charge));
            }
        }

        for bond in molecule.bonds() {
            let [i, j] = bond.atoms();
            writeln!(
                writer,
                "{:3}{:3}{:3}  0  0  0  0",
                numbers[&i],
                numbers[&j],
                bond.order.code().max(1)
            )?;
        }

        for chunk in charged.chunks(8) {
            write!(writer, "M  CHG{:3}", chunk.len())?;
            for (number, charge) in chunk {
                write!(writer, " {number:3} {charge:3}")?;
            }
            writeln!(writer)?;
        }
        writeln!(writer, "M  END")?;

        if self.write_properties {
            let data = molecule.data();
            for key in data.names() {
                let value = data.value(key);
                let scalar = matches!(
                    value.variant_type(),
                    VariantType::String
                        | VariantType::Int
                        | VariantType::Long
                        | VariantType::Float
                        | VariantType::Double
                );
                if key == NAME_KEY || !scalar {
                    continue;
                }
                writeln!(writer, "> <{key}>")?;
                writeln!(writer, "{}", value.to_string_value())?;
                writeln!(writer)?;
            }
            writeln!(writer, "$$$$")?;
        }
        Ok(())
    }
}

impl FileFormat for MdlFormat {
    fn identifier(&self) -> &'static str {
        "MDL"
    }

    fn name(&self) -> &'static str {
        "MDL"
    }

    fn description(&self) -> &'static str {
        "Generic format that contains atoms, bonds, positions."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["mol", "mdl"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-mdl-molfile"])
    }

    /// Reads the next record and leaves `reader` right after it, so
    /// repeated calls walk through a multi-record SD file.
    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        let start = reader.stream_position()?;
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let mut lines = Lines::new(&text);
        let result = Self::read_record(&mut lines, molecule);
        reader.seek(SeekFrom::Start(start + lines.offset as u64))?;
        result
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        self.write_record(writer, molecule)
    }
}
