// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Chemical JSON, stored either as JSON text or as MessagePack.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use log::warn;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::bond::BondOrder;
use crate::error::CError;
use crate::format::{string_set, FileFormat, Operations, ReadSeek};
use crate::molecule::{Molecule, NAME_KEY};
use crate::unit_cell::UnitCell;
use crate::units::is_custom_element;
use crate::variant::Variant;

/// Newest document version this codec understands.
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "chemicalJson", alias = "chemical json")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    atoms: Atoms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bonds: Option<Bonds>,
    #[serde(rename = "unitCell", default, skip_serializing_if = "Option::is_none")]
    unit_cell: Option<Cell>,
    #[serde(rename = "customElements", default, skip_serializing_if = "BTreeMap::is_empty")]
    custom_elements: BTreeMap<u8, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, Property>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Atoms {
    elements: Elements,
    #[serde(default)]
    coords: Coords,
    #[serde(rename = "formalCharges", default, skip_serializing_if = "Vec::is_empty")]
    formal_charges: Vec<i8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Elements {
    number: Vec<u8>,
}

/// Flat `x y z x y z ...` arrays.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Coords {
    #[serde(rename = "3d", default, skip_serializing_if = "Vec::is_empty")]
    three_d: Vec<f64>,
    #[serde(rename = "2d", default, skip_serializing_if = "Vec::is_empty")]
    two_d: Vec<f64>,
    #[serde(rename = "3dSets", default, skip_serializing_if = "Vec::is_empty")]
    three_d_sets: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Bonds {
    connections: Connections,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    order: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Connections {
    index: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Cell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    b: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    beta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gamma: Option<f64>,
    /// The a, b and c vectors one after the other.
    #[serde(rename = "cellVectors", default, skip_serializing_if = "Vec::is_empty")]
    cell_vectors: Vec<f64>,
}

/// Scalar (or flat numeric list) entries of the molecule data. Any other
/// JSON value, such as a nested object, lands in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Property {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    List(Vec<f64>),
    Other(serde_json::Value),
}

impl Property {
    fn from_variant(value: &Variant) -> Option<Self> {
        let property = match value {
            Variant::Bool(b) => Property::Bool(*b),
            Variant::Int(i) => Property::Integer(i64::from(*i)),
            Variant::Long(l) => Property::Integer(*l),
            Variant::Float(f) => Property::Real(f64::from(*f)),
            Variant::Double(d) => Property::Real(*d),
            Variant::String(s) => Property::Text(s.clone()),
            Variant::Vector(v) => Property::List(v.iter().copied().collect()),
            Variant::Matrix(m) if m.ncols() == 1 => Property::List(value.to_list()),
            _ => return None,
        };
        Some(property)
    }

    fn into_variant(self) -> Variant {
        match self {
            Property::Bool(b) => Variant::Bool(b),
            Property::Integer(i) => match i32::try_from(i) {
                Ok(i) => Variant::Int(i),
                Err(_) => Variant::Long(i),
            },
            Property::Real(d) => Variant::Double(d),
            Property::Text(s) => Variant::String(s),
            Property::List(values) => Variant::from(values),
            Property::Other(serde_json::Value::Null) => Variant::Null,
            // kept as its JSON text
            Property::Other(value) => Variant::String(value.to_string()),
        }
    }
}

/// A document that parses as JSON but not as Chemical JSON.
fn malformed(message: impl std::fmt::Display) -> CError {
    CError::Malformed {
        format: "CJSON",
        message: message.to_string(),
    }
}

/// Splits a flat array into `count` vectors of `N` components.
fn chunked<const N: usize>(
    values: &[f64],
    count: usize,
    what: &str,
) -> Result<Vec<[f64; N]>, CError> {
    if values.len() != N * count {
        return Err(malformed(format_args!(
            "{what} holds {} numbers instead of {}",
            values.len(),
            N * count
        )));
    }
    Ok(values
        .chunks_exact(N)
        .map(|chunk| std::array::from_fn(|i| chunk[i]))
        .collect())
}

fn positions_3d(values: &[f64], count: usize, what: &str) -> Result<Vec<Vector3<f64>>, CError> {
    Ok(chunked::<3>(values, count, what)?
        .into_iter()
        .map(Vector3::from)
        .collect())
}

/// How a Chemical JSON document is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    MessagePack,
}

/// Reader and writer for Chemical JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CjsonFormat {
    encoding: Encoding,
    pretty: bool,
}

impl CjsonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Indent JSON output. MessagePack output is not affected.
    pub fn set_pretty(&mut self, pretty: bool) {
        self.pretty = pretty;
    }

    pub fn pretty(&self) -> bool {
        self.pretty
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CError> {
        Ok(match self.encoding {
            Encoding::Json => serde_json::from_slice(bytes)?,
            Encoding::MessagePack => rmp_serde::from_slice(bytes)?,
        })
    }

    fn encode(&self, writer: &mut dyn Write, document: &Document) -> Result<(), CError> {
        match self.encoding {
            Encoding::Json if self.pretty => {
                serde_json::to_writer_pretty(&mut *writer, document)?;
                writeln!(writer)?;
            }
            Encoding::Json => {
                serde_json::to_writer(&mut *writer, document)?;
                writeln!(writer)?;
            }
            Encoding::MessagePack => writer.write_all(&rmp_serde::to_vec_named(document)?)?,
        }
        Ok(())
    }
}

fn fill_molecule(document: Document, molecule: &mut Molecule) -> Result<(), CError> {
    if document.version > VERSION {
        return Err(CError::Unsupported(format!(
            "Chemical JSON version {} (newest known is {VERSION})",
            document.version
        )));
    }

    let atoms = document.atoms;
    let count = atoms.elements.number.len();
    for &number in &atoms.elements.number {
        molecule.add_atom(number);
    }

    let coords = atoms.coords;
    if !coords.three_d.is_empty() {
        let positions = positions_3d(&coords.three_d, count, "atoms.coords.3d")?;
        for (index, position) in positions.into_iter().enumerate() {
            molecule.set_atom_position_3d(index, position)?;
        }
    }
    if !coords.two_d.is_empty() {
        let positions = chunked::<2>(&coords.two_d, count, "atoms.coords.2d")?;
        for (index, position) in positions.into_iter().enumerate() {
            molecule.set_atom_position_2d(index, Vector2::from(position))?;
        }
    }
    for (frame, set) in coords.three_d_sets.iter().enumerate() {
        let positions = positions_3d(set, count, "atoms.coords.3dSets")?;
        molecule.set_coordinate_3d(positions, frame)?;
    }
    if coords.three_d.is_empty() && molecule.coordinate_3d_count() > 0 {
        molecule.set_active_coordinate_3d(0)?;
    }

    if !atoms.formal_charges.is_empty() {
        if atoms.formal_charges.len() != count {
            return Err(malformed(format_args!(
                "atoms.formalCharges holds {} values for {count} atoms",
                atoms.formal_charges.len()
            )));
        }
        for (index, &charge) in atoms.formal_charges.iter().enumerate() {
            if charge != 0 {
                molecule.set_formal_charge(index, charge)?;
            }
        }
    }

    if let Some(bonds) = document.bonds {
        let index = &bonds.connections.index;
        if index.len() % 2 != 0 {
            return Err(malformed("bonds.connections.index has an odd length"));
        }
        for (k, pair) in index.chunks_exact(2).enumerate() {
            let order = bonds.order.get(k).copied().unwrap_or(1);
            molecule.add_bond(pair[0], pair[1], BondOrder::from_code(order))?;
        }
    }

    if let Some(cell) = document.unit_cell {
        let cell = if cell.cell_vectors.is_empty() {
            let (Some(a), Some(b), Some(c), Some(alpha), Some(beta), Some(gamma)) =
                (cell.a, cell.b, cell.c, cell.alpha, cell.beta, cell.gamma)
            else {
                return Err(malformed(
                    "unitCell needs cellVectors or all six cell parameters",
                ));
            };
            UnitCell::from_lengths_angles([a, b, c], [alpha, beta, gamma])?
        } else {
            let vectors = chunked::<3>(&cell.cell_vectors, 3, "unitCell.cellVectors")?;
            let [a, b, c]: [[f64; 3]; 3] = vectors
                .try_into()
                .map_err(|_| malformed("unitCell.cellVectors must hold 9 numbers"))?;
            UnitCell::try_new(a.into(), b.into(), c.into())?
        };
        molecule.set_unit_cell(cell)?;
    }

    let mut custom = BTreeMap::new();
    for (code, label) in document.custom_elements {
        if is_custom_element(code) {
            custom.insert(code, label);
        } else {
            warn!("ignoring custom element '{label}' with non-custom code {code}");
        }
    }
    molecule.set_custom_element_map(custom);

    if let Some(name) = document.name {
        molecule.data_mut().set_value(NAME_KEY, name);
    }
    for (key, property) in document.properties {
        molecule.data_mut().set_value(key, property.into_variant());
    }
    Ok(())
}

fn build_document(molecule: &Molecule) -> Document {
    let mut ranks = vec![None; molecule.atom_slot_count()];
    let mut numbers = Vec::with_capacity(molecule.atom_count());
    let mut three_d = Vec::with_capacity(3 * molecule.atom_count());
    let mut two_d = Vec::new();
    let mut formal_charges = Vec::new();
    let with_2d = molecule.has_2d_positions();
    let with_charges = molecule.atoms().any(|(_, atom)| atom.formal_charge.is_some());

    for (rank, (index, atom)) in molecule.atoms().enumerate() {
        ranks[index] = Some(rank);
        numbers.push(atom.atomic_number);
        three_d.extend(atom.position3d.iter());
        if with_2d {
            two_d.extend(atom.position2d.unwrap_or_else(Vector2::zeros).iter());
        }
        if with_charges {
            formal_charges.push(atom.formal_charge.unwrap_or(0));
        }
    }

    let three_d_sets = (0..molecule.coordinate_3d_count())
        .filter_map(|frame| molecule.coordinate_3d(frame))
        .map(|positions| positions.iter().flat_map(|p| p.iter().copied()).collect())
        .collect();

    let bonds = (molecule.bond_count() > 0).then(|| {
        let mut index = Vec::with_capacity(2 * molecule.bond_count());
        let mut order = Vec::with_capacity(molecule.bond_count());
        for bond in molecule.bonds() {
            index.extend(bond.atoms().iter().filter_map(|&atom| ranks[atom]));
            order.push(i64::from(bond.order.code()));
        }
        Bonds {
            connections: Connections { index },
            order,
        }
    });

    let unit_cell = molecule.unit_cell().map(|cell| Cell {
        a: Some(cell.a()),
        b: Some(cell.b()),
        c: Some(cell.c()),
        alpha: Some(cell.alpha()),
        beta: Some(cell.beta()),
        gamma: Some(cell.gamma()),
        cell_vectors: [cell.a_vector(), cell.b_vector(), cell.c_vector()]
            .iter()
            .flat_map(|v| v.iter().copied())
            .collect(),
    });

    let data = molecule.data();
    let name = data
        .has_value(NAME_KEY)
        .then(|| data.value(NAME_KEY).to_string_value());
    let properties = data
        .iter()
        .filter(|(key, _)| key.as_str() != NAME_KEY)
        .filter_map(|(key, value)| Some((key.clone(), Property::from_variant(value)?)))
        .collect();

    Document {
        version: VERSION,
        name,
        atoms: Atoms {
            elements: Elements { number: numbers },
            coords: Coords {
                three_d,
                two_d,
                three_d_sets,
            },
            formal_charges,
        },
        bonds,
        unit_cell,
        custom_elements: molecule.custom_element_map().clone(),
        properties,
    }
}

impl FileFormat for CjsonFormat {
    fn identifier(&self) -> &'static str {
        "CJSON"
    }

    fn name(&self) -> &'static str {
        "Chemical JSON"
    }

    fn description(&self) -> &'static str {
        "Chemical JSON: atoms, bonds, coordinate sets, unit cell and properties."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["cjson"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["chemical/x-cjson"])
    }

    fn supported_operations(&self) -> Operations {
        match self.encoding {
            Encoding::Json => Operations::READ_WRITE_TEXT,
            Encoding::MessagePack => Operations::READ_WRITE_BINARY,
        }
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let document = self.decode(&bytes)?;
        fill_molecule(document, molecule)
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        self.encode(writer, &build_document(molecule))
    }
}
