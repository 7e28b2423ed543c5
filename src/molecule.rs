// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::{Vector2, Vector3};

use crate::bond::{Bond, BondOrder};
use crate::element::{self, CustomElementMap};
use crate::error::CError;
use crate::unit_cell::UnitCell;
use crate::units::is_custom_element;
use crate::valence;
use crate::variant::VariantMap;

/// Key of the molecule title in [`Molecule::data`].
pub const NAME_KEY: &str = "name";

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub atomic_number: u8,
    pub position3d: Vector3<f64>,
    pub position2d: Option<Vector2<f64>>,
    pub formal_charge: Option<i8>,
    /// Hydrogens implied by the valence model, set by
    /// [`Molecule::perceive_implicit_hydrogens`].
    pub implicit_hydrogens: Option<u8>,
}

impl Atom {
    pub fn new(atomic_number: u8) -> Self {
        Self {
            atomic_number,
            position3d: Vector3::zeros(),
            position2d: None,
            formal_charge: None,
            implicit_hydrogens: None,
        }
    }
}

/// A molecular graph: atoms and bonds addressed by index, an optional unit
/// cell, coordinate frames and free-form data.
///
/// Atoms live in an arena. Removing an atom leaves a hole so the indices of
/// the other atoms stay valid; [`Molecule::compact`] closes the holes and
/// renumbers. Every coordinate frame holds one position per live atom, in
/// index order.
#[derive(Debug, Default, Clone)]
pub struct Molecule {
    atoms: Vec<Option<Atom>>,
    live_atoms: usize,
    bonds: Vec<Bond>,
    unit_cell: Option<UnitCell>,
    coordinates3d: Vec<Vec<Vector3<f64>>>,
    custom_elements: CustomElementMap,
    data: VariantMap,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of live atoms.
    pub fn atom_count(&self) -> usize {
        self.live_atoms
    }

    /// Number of atom indices handed out so far, including removed ones.
    pub fn atom_slot_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_atoms == 0
    }

    /// Adds an atom at the origin and returns its index.
    ///
    /// The position of the new atom is also appended to every existing
    /// coordinate frame.
    pub fn add_atom(&mut self, atomic_number: u8) -> usize {
        let index = self.atoms.len();
        self.atoms.push(Some(Atom::new(atomic_number)));
        self.live_atoms += 1;
        for frame in &mut self.coordinates3d {
            frame.push(Vector3::zeros());
        }
        index
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index).and_then(Option::as_ref)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index).and_then(Option::as_mut)
    }

    fn live_atom_mut(&mut self, index: usize) -> Result<&mut Atom, CError> {
        let count = self.atoms.len();
        self.atom_mut(index)
            .ok_or(CError::InvalidAtom { index, count })
    }

    /// Live atoms with their indices, in index order.
    pub fn atoms(&self) -> impl Iterator<Item = (usize, &Atom)> {
        self.atoms
            .iter()
            .enumerate()
            .filter_map(|(i, atom)| atom.as_ref().map(|atom| (i, atom)))
    }

    pub fn atomic_number(&self, index: usize) -> Option<u8> {
        self.atom(index).map(|atom| atom.atomic_number)
    }

    pub fn atomic_numbers(&self) -> Vec<u8> {
        self.atoms().map(|(_, atom)| atom.atomic_number).collect()
    }

    pub fn set_atomic_number(&mut self, index: usize, atomic_number: u8) -> Result<(), CError> {
        self.live_atom_mut(index)?.atomic_number = atomic_number;
        Ok(())
    }

    pub fn set_atom_position_3d(
        &mut self,
        index: usize,
        position: Vector3<f64>,
    ) -> Result<(), CError> {
        self.live_atom_mut(index)?.position3d = position;
        Ok(())
    }

    pub fn set_atom_position_2d(
        &mut self,
        index: usize,
        position: Vector2<f64>,
    ) -> Result<(), CError> {
        self.live_atom_mut(index)?.position2d = Some(position);
        Ok(())
    }

    pub fn set_formal_charge(&mut self, index: usize, charge: i8) -> Result<(), CError> {
        self.live_atom_mut(index)?.formal_charge = Some(charge);
        Ok(())
    }

    /// Current 3D positions of the live atoms, in index order.
    pub fn atom_positions_3d(&self) -> Vec<Vector3<f64>> {
        self.atoms().map(|(_, atom)| atom.position3d).collect()
    }

    /// Whether at least one atom carries a 2D position.
    pub fn has_2d_positions(&self) -> bool {
        self.atoms().any(|(_, atom)| atom.position2d.is_some())
    }

    /// Position of atom `index` among the live atoms.
    fn live_rank(&self, index: usize) -> usize {
        self.atoms[..index].iter().filter(|a| a.is_some()).count()
    }

    /// Removes atom `index` and every bond touching it.
    ///
    /// The index is not reused by later calls to [`Molecule::add_atom`].
    pub fn remove_atom(&mut self, index: usize) -> Result<(), CError> {
        if self.atom(index).is_none() {
            return Err(CError::InvalidAtom {
                index,
                count: self.atoms.len(),
            });
        }
        let rank = self.live_rank(index);
        for frame in &mut self.coordinates3d {
            frame.remove(rank);
        }
        self.bonds.retain(|bond| !bond.contains(index));
        self.atoms[index] = None;
        self.live_atoms -= 1;
        Ok(())
    }

    /// Drops the holes left by removed atoms and renumbers atoms and bonds.
    ///
    /// Returns the new index of every old index (`None` for removed atoms).
    pub fn compact(&mut self) -> Vec<Option<usize>> {
        let mut mapping = Vec::with_capacity(self.atoms.len());
        let mut next = 0;
        for atom in &self.atoms {
            if atom.is_some() {
                mapping.push(Some(next));
                next += 1;
            } else {
                mapping.push(None);
            }
        }

        self.atoms.retain(Option::is_some);
        for bond in &mut self.bonds {
            let [i, j] = bond.atoms();
            // bonds to removed atoms are dropped in remove_atom
            if let (Some(i), Some(j)) = (mapping[i], mapping[j]) {
                bond.remap(i, j);
            }
        }
        mapping
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bond_between(&self, i: usize, j: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|bond| bond.contains(i) && bond.partner(i) == Some(j))
    }

    pub fn bonds_for_atom(&self, index: usize) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(move |bond| bond.contains(index))
    }

    /// Sets the implicit hydrogen count of every atom the valence model
    /// covers, and returns the atoms with more bonds than their element and
    /// charge allow.
    pub fn perceive_implicit_hydrogens(&mut self) -> Vec<usize> {
        let mut orders = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            for index in bond.atoms() {
                orders[index].push(bond.order);
            }
        }

        let mut overbonded = Vec::new();
        for (index, atom) in self.atoms.iter_mut().enumerate() {
            let Some(atom) = atom else {
                continue;
            };
            let bond_sum = valence::bond_valence(orders[index].iter().copied());
            let charge = i32::from(atom.formal_charge.unwrap_or(0));
            let expected = valence::atom_valence(atom.atomic_number, charge, bond_sum);
            if expected < bond_sum {
                overbonded.push(index);
            }
            atom.implicit_hydrogens =
                valence::implicit_hydrogens(atom.atomic_number, charge, bond_sum)
                    .map(|count| u8::try_from(count).unwrap_or(u8::MAX));
        }
        overbonded
    }

    /// Adds a bond between two live atoms and returns its index. If the bond
    /// already exists its order is updated.
    pub fn add_bond(&mut self, i: usize, j: usize, order: BondOrder) -> Result<usize, CError> {
        let count = self.atoms.len();
        for index in [i, j] {
            if self.atom(index).is_none() {
                return Err(CError::InvalidBond(format!(
                    "atom {index} does not exist (the molecule has {count} atom slots)"
                )));
            }
        }
        if i == j {
            return Err(CError::InvalidBond(format!(
                "can not bond atom {i} to itself"
            )));
        }

        if let Some(position) = self
            .bonds
            .iter()
            .position(|bond| bond.contains(i) && bond.partner(i) == Some(j))
        {
            self.bonds[position].order = order;
            return Ok(position);
        }

        self.bonds.push(Bond::new(i, j, order));
        Ok(self.bonds.len() - 1)
    }

    /// Removes the bond between `i` and `j`, returning whether one existed.
    pub fn remove_bond(&mut self, i: usize, j: usize) -> bool {
        let before = self.bonds.len();
        self.bonds
            .retain(|bond| !(bond.contains(i) && bond.partner(i) == Some(j)));
        before != self.bonds.len()
    }

    pub fn unit_cell(&self) -> Option<&UnitCell> {
        self.unit_cell.as_ref()
    }

    /// Stores `cell`, rejecting irregular cells.
    pub fn set_unit_cell(&mut self, cell: UnitCell) -> Result<(), CError> {
        if !cell.is_regular() {
            return Err(CError::IrregularUnitCell);
        }
        self.unit_cell = Some(cell);
        Ok(())
    }

    pub fn clear_unit_cell(&mut self) {
        self.unit_cell = None;
    }

    pub fn coordinate_3d_count(&self) -> usize {
        self.coordinates3d.len()
    }

    pub fn coordinate_3d(&self, frame: usize) -> Option<&[Vector3<f64>]> {
        self.coordinates3d.get(frame).map(Vec::as_slice)
    }

    /// Stores `positions` as coordinate frame `frame`.
    ///
    /// Fails when `positions` does not hold exactly one position per atom.
    /// Frames missing before `frame` are filled with the current atom
    /// positions.
    pub fn set_coordinate_3d(
        &mut self,
        positions: Vec<Vector3<f64>>,
        frame: usize,
    ) -> Result<(), CError> {
        if positions.len() != self.live_atoms {
            return Err(CError::FrameSizeMismatch {
                frame,
                expected: self.live_atoms,
                got: positions.len(),
            });
        }

        if frame > self.coordinates3d.len() {
            debug!(
                "filling coordinate frames {}..{frame} with the current positions",
                self.coordinates3d.len()
            );
            let current = self.atom_positions_3d();
            self.coordinates3d.resize(frame, current);
        }

        if frame == self.coordinates3d.len() {
            self.coordinates3d.push(positions);
        } else {
            self.coordinates3d[frame] = positions;
        }
        Ok(())
    }

    /// Copies coordinate frame `frame` into the atom positions.
    pub fn set_active_coordinate_3d(&mut self, frame: usize) -> Result<(), CError> {
        let count = self.coordinates3d.len();
        let positions = self
            .coordinates3d
            .get(frame)
            .ok_or(CError::FrameOutOfRange { frame, count })?;
        for (slot, position) in self.atoms.iter_mut().flatten().zip(positions) {
            slot.position3d = *position;
        }
        Ok(())
    }

    pub fn custom_element_map(&self) -> &CustomElementMap {
        &self.custom_elements
    }

    pub fn set_custom_element_map(&mut self, map: CustomElementMap) {
        self.custom_elements = map;
    }

    pub fn has_custom_elements(&self) -> bool {
        self.atoms()
            .any(|(_, atom)| is_custom_element(atom.atomic_number))
    }

    /// Custom label for custom elements, element symbol otherwise.
    pub fn atom_label(&self, index: usize) -> Option<String> {
        let number = self.atomic_number(index)?;
        if let Some(label) = self.custom_elements.get(&number) {
            return Some(label.clone());
        }
        Some(element::symbol(number).unwrap_or("X").to_string())
    }

    pub fn data(&self) -> &VariantMap {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut VariantMap {
        &mut self.data
    }

    /// Chemical formula in Hill order (C, then H, then alphabetical; purely
    /// alphabetical without carbon).
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (index, _) in self.atoms() {
            if let Some(label) = self.atom_label(index) {
                *counts.entry(label).or_default() += 1;
            }
        }

        let mut result = String::new();
        let mut push = |symbol: &str, count: usize| {
            result.push_str(symbol);
            if count > 1 {
                result.push_str(&count.to_string());
            }
        };

        if let Some(carbon) = counts.remove("C") {
            push("C", carbon);
            if let Some(hydrogen) = counts.remove("H") {
                push("H", hydrogen);
            }
        }
        for (symbol, count) in counts {
            push(&symbol, count);
        }
        result
    }

    pub fn center_of_geometry(&self) -> Option<Vector3<f64>> {
        if self.live_atoms == 0 {
            return None;
        }
        let sum: Vector3<f64> = self.atoms().map(|(_, atom)| atom.position3d).sum();
        Some(sum / self.live_atoms as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use assert_approx_eq::assert_approx_eq;

    fn water() -> Molecule {
        let mut mol = Molecule::new();
        let o = mol.add_atom(8);
        let h1 = mol.add_atom(1);
        let h2 = mol.add_atom(1);
        mol.set_atom_position_3d(h1, Vector3::new(0.96, 0.0, 0.0))
            .unwrap();
        mol.set_atom_position_3d(h2, Vector3::new(-0.24, 0.93, 0.0))
            .unwrap();
        mol.add_bond(o, h1, BondOrder::Single).unwrap();
        mol.add_bond(o, h2, BondOrder::Single).unwrap();
        mol
    }

    #[test]
    fn build_water() {
        let mol = water();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.atomic_numbers(), vec![8, 1, 1]);
        assert_eq!(mol.formula(), "H2O");
        assert_eq!(mol.atom_label(0).as_deref(), Some("O"));
        assert!(mol.bond_between(1, 0).is_some());
        assert!(mol.bond_between(1, 2).is_none());
        assert_eq!(mol.bonds_for_atom(0).count(), 2);

        let center = mol.center_of_geometry().unwrap();
        assert_approx_eq!(center.x, 0.24);
        assert_approx_eq!(center.y, 0.31);
    }

    #[test]
    fn bonds_are_validated() {
        let mut mol = water();
        assert!(mol.add_bond(0, 7, BondOrder::Single).is_err());
        assert!(mol.add_bond(1, 1, BondOrder::Single).is_err());

        // an existing bond only has its order updated
        let index = mol.add_bond(1, 0, BondOrder::Double).unwrap();
        assert_eq!(index, 0);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.bonds()[0].order, BondOrder::Double);

        assert!(mol.remove_bond(0, 1));
        assert!(!mol.remove_bond(0, 1));
        assert_eq!(mol.bond_count(), 1);
    }

    #[test]
    fn set_coordinate_requires_matching_size() {
        let mut mol = water();
        for len in 0..6 {
            let frame = vec![Vector3::new(1.0, 2.0, 3.0); len];
            let result = mol.set_coordinate_3d(frame, 0);
            assert_eq!(result.is_ok(), len == mol.atom_count(), "len = {len}");
            if let Err(error) = result {
                assert_eq!(error.kind(), ErrorKind::Semantic);
            }
        }
        assert_eq!(mol.coordinate_3d_count(), 1);
    }

    #[test]
    fn frames() {
        let mut mol = water();
        let first = mol.atom_positions_3d();
        let shifted: Vec<_> = first.iter().map(|p| p + Vector3::new(1.0, 0.0, 0.0)).collect();

        // gaps are filled with the current positions
        mol.set_coordinate_3d(shifted.clone(), 2).unwrap();
        assert_eq!(mol.coordinate_3d_count(), 3);
        assert_eq!(mol.coordinate_3d(0).unwrap(), first.as_slice());
        assert_eq!(mol.coordinate_3d(2).unwrap(), shifted.as_slice());

        mol.set_active_coordinate_3d(2).unwrap();
        assert_approx_eq!(mol.atom(1).unwrap().position3d.x, 1.96);
        assert!(matches!(
            mol.set_active_coordinate_3d(5),
            Err(CError::FrameOutOfRange { frame: 5, count: 3 })
        ));

        // frames grow with the atoms
        mol.add_atom(6);
        assert!(
            (0..mol.coordinate_3d_count()).all(|i| mol.coordinate_3d(i).unwrap().len() == 4)
        );
    }

    #[test]
    fn removal_keeps_indices_until_compacted() {
        let mut mol = water();
        mol.set_coordinate_3d(mol.atom_positions_3d(), 0).unwrap();

        mol.remove_atom(1).unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.atom_slot_count(), 3);
        assert!(mol.atom(1).is_none());
        assert_eq!(mol.atomic_number(2), Some(1));
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.coordinate_3d(0).unwrap().len(), 2);
        assert!(mol.remove_atom(1).is_err());
        assert!(mol.set_atom_position_3d(1, Vector3::zeros()).is_err());

        // no reuse of removed indices
        let carbon = mol.add_atom(6);
        assert_eq!(carbon, 3);

        let mapping = mol.compact();
        assert_eq!(mapping, vec![Some(0), None, Some(1), Some(2)]);
        assert_eq!(mol.atomic_numbers(), vec![8, 1, 6]);
        assert_eq!(mol.bonds()[0].atoms(), [0, 1]);
        assert_eq!(mol.add_atom(7), 3);
    }

    #[test]
    fn unit_cell_must_be_regular() {
        let mut mol = Molecule::new();
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let bad = UnitCell::new(x, y, x + y);
        assert!(matches!(
            mol.set_unit_cell(bad),
            Err(CError::IrregularUnitCell)
        ));
        assert!(mol.unit_cell().is_none());

        let good = UnitCell::new(x, y, Vector3::new(0.0, 0.0, 1.0));
        mol.set_unit_cell(good).unwrap();
        assert_eq!(mol.unit_cell(), Some(&good));
        mol.clear_unit_cell();
        assert!(mol.unit_cell().is_none());
    }

    #[test]
    fn custom_elements_and_data() {
        let mut mol = Molecule::new();
        let atom = mol.add_atom(130);
        let mut map = CustomElementMap::new();
        map.insert(130, "Bead".to_string());
        mol.set_custom_element_map(map);
        assert!(mol.has_custom_elements());
        assert_eq!(mol.atom_label(atom).as_deref(), Some("Bead"));
        assert_eq!(mol.formula(), "Bead");

        mol.set_formal_charge(atom, -1).unwrap();
        mol.set_atom_position_2d(atom, Vector2::new(1.0, 2.0)).unwrap();
        assert_eq!(mol.atom(atom).unwrap().formal_charge, Some(-1));
        assert!(mol.has_2d_positions());

        mol.data_mut().set_value("name", "bead");
        assert_eq!(mol.data().value("name").to_string_value(), "bead");

        mol.clear();
        assert!(mol.is_empty());
        assert!(mol.data().is_empty());
    }

    #[test]
    fn implicit_hydrogens() {
        // heavy atoms of acetic acid plus a pentavalent carbon
        let mut mol = Molecule::new();
        let methyl = mol.add_atom(6);
        let carboxyl = mol.add_atom(6);
        let carbonyl = mol.add_atom(8);
        let hydroxyl = mol.add_atom(8);
        let iron = mol.add_atom(26);
        mol.add_bond(methyl, carboxyl, BondOrder::Single).unwrap();
        mol.add_bond(carboxyl, carbonyl, BondOrder::Double).unwrap();
        mol.add_bond(carboxyl, hydroxyl, BondOrder::Single).unwrap();
        assert!(mol.perceive_implicit_hydrogens().is_empty());
        let counts: Vec<_> = mol.atoms().map(|(_, a)| a.implicit_hydrogens).collect();
        assert_eq!(counts, vec![Some(3), Some(0), Some(0), Some(1), None]);

        mol.set_formal_charge(hydroxyl, -1).unwrap();
        mol.perceive_implicit_hydrogens();
        assert_eq!(mol.atom(hydroxyl).unwrap().implicit_hydrogens, Some(0));

        for _ in 0..4 {
            let h = mol.add_atom(1);
            mol.add_bond(methyl, h, BondOrder::Single).unwrap();
        }
        mol.remove_atom(iron).unwrap();
        assert_eq!(mol.perceive_implicit_hydrogens(), vec![methyl]);
        assert_eq!(mol.atom(methyl).unwrap().implicit_hydrogens, Some(0));
        assert_eq!(mol.atom(6).unwrap().implicit_hydrogens, Some(0));
    }

    #[test]
    fn hill_formula() {
        let mut mol = Molecule::new();
        for number in [8, 6, 1, 1, 6, 1, 1, 1, 1, 17] {
            mol.add_atom(number);
        }
        assert_eq!(mol.formula(), "C2H6ClO");
    }
}
