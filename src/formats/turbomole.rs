// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Turbomole `coord` files.
//!
//! The file is a list of `$` directives. Only `$coord`, `$periodic`, `$cell`
//! and `$lattice` are interpreted, everything after `$end` is ignored.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::LazyLock;

use log::warn;
use nalgebra::Vector3;
use regex::Regex;

use crate::element;
use crate::error::CError;
use crate::format::{string_set, FileFormat, ReadSeek};
use crate::molecule::Molecule;
use crate::unit_cell::UnitCell;
use crate::units::{ANGSTROM_TO_BOHR, BOHR_TO_ANGSTROM, DEG_TO_RAD};
use crate::utilities::{lexical_cast, lexical_cast_all, rstrip, trimmed};

const FORMAT: &str = "Turbomole";

/// Length of the vacuum vectors completing 1D and 2D cells, in Ångström.
const VACUUM: f64 = 100.0;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$([A-Za-z][\w-]*)(.*)$").expect("valid directive regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthUnit {
    Bohr,
    Angstrom,
}

impl LengthUnit {
    fn factor(self) -> f64 {
        match self {
            LengthUnit::Bohr => BOHR_TO_ANGSTROM,
            LengthUnit::Angstrom => 1.0,
        }
    }
}

/// A `$name options` line and the lines following it.
#[derive(Debug)]
struct Directive<'a> {
    name: &'a str,
    options: Vec<&'a str>,
    line: usize,
    body: Vec<(usize, &'a str)>,
}

impl Directive<'_> {
    fn grammar(&self, message: impl Into<String>) -> CError {
        CError::grammar(FORMAT, self.line, message)
    }

    fn unit(&self) -> Result<LengthUnit, CError> {
        match self.options.as_slice() {
            [] | ["bohr"] => Ok(LengthUnit::Bohr),
            ["angs"] => Ok(LengthUnit::Angstrom),
            options => Err(self.grammar(format!(
                "unexpected options for ${}: '{}'",
                self.name,
                options.join(" ")
            ))),
        }
    }

    fn numbers(&self) -> Result<Vec<f64>, CError> {
        let tokens = self.body.iter().flat_map(|(_, line)| line.split_whitespace());
        lexical_cast_all(tokens)
            .ok_or_else(|| self.grammar(format!("${} expects only numbers", self.name)))
    }
}

/// Cell read from `$cell` or `$lattice`, before the periodicity check.
struct CellBlock {
    dimension: usize,
    line: usize,
    vectors: [Vector3<f64>; 3],
}

fn split_directives(text: &str) -> Result<Vec<Directive<'_>>, CError> {
    let mut directives: Vec<Directive> = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = trimmed(rstrip(raw, '#'));
        if line.is_empty() {
            continue;
        }

        if line.starts_with('$') {
            let captures = DIRECTIVE.captures(line).ok_or_else(|| {
                CError::grammar(FORMAT, number, format!("invalid directive '{line}'"))
            })?;
            let name = captures.get(1).map_or("", |m| m.as_str());
            if name == "end" {
                break;
            }
            let options = captures
                .get(2)
                .map_or(Vec::new(), |m| m.as_str().split_whitespace().collect());
            directives.push(Directive {
                name,
                options,
                line: number,
                body: Vec::new(),
            });
        } else if let Some(current) = directives.last_mut() {
            current.body.push((number, line));
        } else {
            warn!("ignoring Turbomole line {number} outside of any directive");
        }
    }
    Ok(directives)
}

fn parse_periodic(directive: &Directive) -> Result<usize, CError> {
    match directive.options.as_slice() {
        [value] => lexical_cast::<usize>(value)
            .filter(|n| *n <= 3)
            .ok_or_else(|| {
                directive.grammar(format!("$periodic expects 0, 1, 2 or 3, found '{value}'"))
            }),
        options => Err(directive.grammar(format!(
            "$periodic expects exactly one value, found {}",
            options.len()
        ))),
    }
}

fn parse_cell(directive: &Directive) -> Result<CellBlock, CError> {
    let factor = directive.unit()?.factor();
    let numbers = directive.numbers()?;
    let (dimension, vectors) = match numbers.as_slice() {
        &[a] => (
            1,
            [
                Vector3::new(a * factor, 0.0, 0.0),
                Vector3::new(0.0, VACUUM, 0.0),
                Vector3::new(0.0, 0.0, VACUUM),
            ],
        ),
        &[a, b, gamma] => {
            let gamma = gamma * DEG_TO_RAD;
            (
                2,
                [
                    Vector3::new(a * factor, 0.0, 0.0),
                    Vector3::new(b * gamma.cos(), b * gamma.sin(), 0.0) * factor,
                    Vector3::new(0.0, 0.0, VACUUM),
                ],
            )
        }
        &[a, b, c, alpha, beta, gamma] => {
            let lengths = [a * factor, b * factor, c * factor];
            let cell = UnitCell::from_lengths_angles(lengths, [alpha, beta, gamma])
                .map_err(|e| directive.grammar(e.to_string()))?;
            (3, [cell.a_vector(), cell.b_vector(), cell.c_vector()])
        }
        numbers => {
            return Err(directive.grammar(format!(
                "$cell expects 1, 3 or 6 values, found {}",
                numbers.len()
            )))
        }
    };
    Ok(CellBlock {
        dimension,
        line: directive.line,
        vectors,
    })
}

fn parse_lattice(directive: &Directive) -> Result<CellBlock, CError> {
    let factor = directive.unit()?.factor();
    let dimension = directive.body.len();
    if !(1..=3).contains(&dimension) {
        return Err(directive.grammar(format!(
            "$lattice expects 1 to 3 vectors, found {dimension}"
        )));
    }

    let mut vectors = [
        Vector3::new(VACUUM, 0.0, 0.0),
        Vector3::new(0.0, VACUUM, 0.0),
        Vector3::new(0.0, 0.0, VACUUM),
    ];
    for (vector, (number, line)) in vectors.iter_mut().zip(&directive.body) {
        let values: Vec<f64> = lexical_cast_all(line.split_whitespace()).ok_or_else(|| {
            CError::grammar(FORMAT, *number, "$lattice expects only numbers")
        })?;
        if values.len() != dimension {
            return Err(CError::grammar(
                FORMAT,
                *number,
                format!(
                    "a {dimension}D lattice needs {dimension} values per vector, found {}",
                    values.len()
                ),
            ));
        }
        *vector = Vector3::zeros();
        for (component, value) in vector.iter_mut().zip(values) {
            *component = value * factor;
        }
    }

    Ok(CellBlock {
        dimension,
        line: directive.line,
        vectors,
    })
}

fn parse_coord(directive: &Directive, molecule: &mut Molecule) -> Result<(), CError> {
    let factor = directive.unit()?.factor();
    for (number, line) in &directive.body {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(CError::grammar(
                FORMAT,
                *number,
                "expected 'x y z element' in $coord",
            ));
        }
        let position: Vec<f64> = lexical_cast_all(tokens[..3].iter().copied())
            .ok_or_else(|| CError::grammar(FORMAT, *number, "invalid coordinates"))?;

        let atomic_number = element::atomic_number_from_symbol(tokens[3]).unwrap_or_else(|| {
            warn!("unknown element '{}' on line {number}, using 0", tokens[3]);
            0
        });
        let atom = molecule.add_atom(atomic_number);
        let position = Vector3::new(position[0], position[1], position[2]) * factor;
        molecule.set_atom_position_3d(atom, position)?;
    }
    Ok(())
}

/// Reader and writer for Turbomole `coord` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurbomoleFormat;

impl TurbomoleFormat {
    pub fn new() -> Self {
        TurbomoleFormat
    }

    fn read_text(text: &str, molecule: &mut Molecule) -> Result<(), CError> {
        let directives = split_directives(text)?;

        let mut periodic = None;
        let mut cell: Option<CellBlock> = None;
        let mut coord_seen = false;

        for directive in &directives {
            match directive.name {
                "periodic" => {
                    if periodic.is_some() {
                        return Err(directive.grammar("$periodic given more than once"));
                    }
                    periodic = Some(parse_periodic(directive)?);
                }
                "cell" | "lattice" => {
                    if let Some(previous) = &cell {
                        return Err(directive.grammar(format!(
                            "${} conflicts with the cell given on line {}",
                            directive.name, previous.line
                        )));
                    }
                    cell = Some(if directive.name == "cell" {
                        parse_cell(directive)?
                    } else {
                        parse_lattice(directive)?
                    });
                }
                "coord" => {
                    if coord_seen {
                        return Err(directive.grammar("$coord given more than once"));
                    }
                    coord_seen = true;
                    parse_coord(directive, molecule)?;
                }
                name if ["periodic", "cell", "lattice", "coord"]
                    .iter()
                    .any(|known| name.starts_with(known)) =>
                {
                    return Err(directive.grammar(format!(
                        "unknown directive ${name}, options must be separated by a space"
                    )));
                }
                name => warn!("skipping Turbomole directive ${name}"),
            }
        }

        let periodic = periodic.unwrap_or(0);
        match (periodic, cell) {
            (0, Some(cell)) => {
                warn!(
                    "ignoring the cell on line {} of a non periodic structure",
                    cell.line
                );
            }
            (0, None) => {}
            (n, None) => {
                return Err(CError::grammar(
                    FORMAT,
                    0,
                    format!("$periodic {n} needs a $cell or $lattice block"),
                ));
            }
            (n, Some(cell)) if n != cell.dimension => {
                return Err(CError::grammar(
                    FORMAT,
                    cell.line,
                    format!("$periodic {n} does not match a {}D cell", cell.dimension),
                ));
            }
            (_, Some(cell)) => {
                let [a, b, c] = cell.vectors;
                molecule.set_unit_cell(UnitCell::new(a, b, c))?;
            }
        }
        Ok(())
    }
}

impl FileFormat for TurbomoleFormat {
    fn identifier(&self) -> &'static str {
        "Turbomole"
    }

    fn name(&self) -> &'static str {
        "Turbomole"
    }

    fn description(&self) -> &'static str {
        "Turbomole coord file with optional periodic cell."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["coord", "tmol"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-turbomole"])
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
        writeln!(writer, "$coord")?;
        for (index, atom) in molecule.atoms() {
            let symbol = element::symbol(atom.atomic_number).ok_or_else(|| {
                CError::Unsupported(format!(
                    "atom {index} has no element symbol and can not be written as Turbomole"
                ))
            })?;
            let position = atom.position3d * ANGSTROM_TO_BOHR;
            writeln!(
                writer,
                "{:20.14} {:20.14} {:20.14}      {}",
                position.x,
                position.y,
                position.z,
                symbol.to_lowercase()
            )?;
        }

        if let Some(cell) = molecule.unit_cell() {
            writeln!(writer, "$periodic 3")?;
            writeln!(writer, "$lattice angs")?;
            for vector in [cell.a_vector(), cell.b_vector(), cell.c_vector()] {
                writeln!(
                    writer,
                    "{:20.14} {:20.14} {:20.14}",
                    vector.x, vector.y, vector.z
                )?;
            }
        }
        writeln!(writer, "$end")?;
        Ok(())
    }
}
