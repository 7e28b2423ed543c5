// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! GROMACS TRR binary trajectories.
//!
//! Each frame starts with the magic number 1993, a version string and a
//! table of block sizes, followed by the time, lambda and the blocks that
//! are present. Reals are stored in single or double precision and the byte
//! order may be either; both are detected again for every frame.

use std::collections::BTreeSet;
use std::io::{self, Read, SeekFrom, Write};

use log::debug;
use nalgebra::Vector3;

use crate::element::CustomElementPool;
use crate::error::CError;
use crate::format::{string_set, FileFormat, Operations, ReadSeek};
use crate::molecule::Molecule;
use crate::unit_cell::UnitCell;
use crate::units::{ANGSTROM_TO_NM, NM_TO_ANGSTROM};

const FORMAT: &str = "TRR";
const GROMACS_MAGIC: i32 = 1993;
const VERSION: &str = "GMX_trn_file";
const DIM: usize = 3;

/// Key of the per-frame simulation times in the molecule data.
pub const TIME_KEY: &str = "trr.time";
/// Key of the per-frame step numbers in the molecule data.
pub const STEP_KEY: &str = "trr.step";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    fn flipped(self) -> Self {
        match self {
            Endian::Big => Endian::Little,
            Endian::Little => Endian::Big,
        }
    }

    fn i32_from(self, bytes: [u8; 4]) -> i32 {
        match self {
            Endian::Big => i32::from_be_bytes(bytes),
            Endian::Little => i32::from_le_bytes(bytes),
        }
    }
}

/// Width of the reals stored in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Single,
    Double,
}

impl Precision {
    pub fn width(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    fn from_width(width: i64) -> Option<Self> {
        match width {
            4 => Some(Precision::Single),
            8 => Some(Precision::Double),
            _ => None,
        }
    }
}

/// Sizes table of a frame header, in the order found in the file.
#[derive(Debug, Clone, Copy, Default)]
struct FrameHeader {
    ir_size: usize,
    e_size: usize,
    box_size: usize,
    vir_size: usize,
    pres_size: usize,
    top_size: usize,
    sym_size: usize,
    x_size: usize,
    v_size: usize,
    f_size: usize,
    natoms: usize,
    step: i32,
    time: f64,
}

/// Positions and box of one frame, already in Ångström.
struct FrameData {
    header: FrameHeader,
    cell: Option<UnitCell>,
    positions: Option<Vec<Vector3<f64>>>,
}

/// Decoding state carried from one frame to the next.
struct FrameDecoder<'a> {
    reader: &'a mut dyn ReadSeek,
    /// Stream length, bounds every size taken from a header.
    end: u64,
    endian: Endian,
    precision: Precision,
}

impl<'a> FrameDecoder<'a> {
    fn new(reader: &'a mut dyn ReadSeek, end: u64) -> Self {
        FrameDecoder {
            reader,
            end,
            endian: Endian::Big,
            precision: Precision::Single,
        }
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], CError> {
        let mut buffer = [0; N];
        self.reader
            .read_exact(&mut buffer)
            .map_err(|error| truncation(error, what))?;
        Ok(buffer)
    }

    fn read_i32(&mut self, what: &str) -> Result<i32, CError> {
        let bytes = self.read_array::<4>(what)?;
        Ok(self.endian.i32_from(bytes))
    }

    fn read_real(&mut self, what: &str) -> Result<f64, CError> {
        match (self.precision, self.endian) {
            (Precision::Single, Endian::Big) => {
                Ok(f32::from_be_bytes(self.read_array(what)?) as f64)
            }
            (Precision::Single, Endian::Little) => {
                Ok(f32::from_le_bytes(self.read_array(what)?) as f64)
            }
            (Precision::Double, Endian::Big) => Ok(f64::from_be_bytes(self.read_array(what)?)),
            (Precision::Double, Endian::Little) => {
                Ok(f64::from_le_bytes(self.read_array(what)?))
            }
        }
    }

    fn read_vector(&mut self, what: &str) -> Result<Vector3<f64>, CError> {
        let x = self.read_real(what)?;
        let y = self.read_real(what)?;
        let z = self.read_real(what)?;
        Ok(Vector3::new(x, y, z))
    }

    fn skip(&mut self, size: usize, what: &str) -> Result<(), CError> {
        if size == 0 {
            return Ok(());
        }
        let mut block = (&mut *self.reader).take(size as u64);
        let copied = io::copy(&mut block, &mut io::sink())?;
        if copied != size as u64 {
            return Err(CError::truncated(FORMAT, what));
        }
        Ok(())
    }

    fn position(&mut self) -> Result<u64, CError> {
        Ok(self.reader.stream_position()?)
    }

    /// Fails unless at least `size` bytes are left before the end.
    fn ensure_available(&mut self, size: u64, what: &str) -> Result<(), CError> {
        let left = self.end.saturating_sub(self.position()?);
        if size > left {
            debug!("{what} needs {size} bytes, {left} left");
            return Err(CError::truncated(FORMAT, what));
        }
        Ok(())
    }

    /// Reads the magic number, switching byte order if it only matches
    /// once swapped.
    fn read_magic(&mut self) -> Result<(), CError> {
        let bytes = self.read_array::<4>("magic number")?;
        let magic = self.endian.i32_from(bytes);
        if magic == GROMACS_MAGIC {
            return Ok(());
        }
        let flipped = self.endian.flipped();
        if flipped.i32_from(bytes) == GROMACS_MAGIC {
            debug!("TRR frame uses {flipped:?} endian byte order");
            self.endian = flipped;
            return Ok(());
        }
        Err(CError::BadMagic {
            format: FORMAT,
            expected: GROMACS_MAGIC,
            found: magic,
        })
    }

    fn read_version(&mut self) -> Result<(), CError> {
        let slen0 = self.read_i32("version string length")?;
        let _slen1 = self.read_i32("version string length")?;
        if slen0 < 1 {
            return Err(CError::InvalidHeader {
                format: FORMAT,
                field: "version string length",
                value: slen0 as i64,
            });
        }

        let length = (slen0 - 1) as usize;
        self.ensure_available(length as u64, "version string")?;
        let mut raw = vec![0; length];
        self.reader
            .read_exact(&mut raw)
            .map_err(|error| truncation(error, "version string"))?;
        if !raw.starts_with(VERSION.as_bytes()) {
            return Err(CError::VersionMismatch {
                format: FORMAT,
                found: String::from_utf8_lossy(&raw).into_owned(),
            });
        }
        Ok(())
    }

    fn read_size(&mut self, field: &'static str) -> Result<usize, CError> {
        let value = self.read_i32(field)?;
        usize::try_from(value).map_err(|_| CError::InvalidHeader {
            format: FORMAT,
            field,
            value: value as i64,
        })
    }

    /// Guesses the real width from the first present block.
    fn infer_precision(header: &FrameHeader) -> Result<Precision, CError> {
        let candidates = [
            ("box_size", header.box_size, DIM * DIM),
            ("x_size", header.x_size, DIM * header.natoms),
            ("v_size", header.v_size, DIM * header.natoms),
            ("f_size", header.f_size, DIM * header.natoms),
        ];
        let Some((field, size, count)) = candidates.into_iter().find(|c| c.1 != 0) else {
            // nothing tells us, older writers used single precision
            return Ok(Precision::Single);
        };

        let invalid = CError::InvalidHeader {
            format: FORMAT,
            field,
            value: size as i64,
        };
        if count == 0 || size % count != 0 {
            return Err(invalid);
        }
        Precision::from_width((size / count) as i64).ok_or(invalid)
    }

    fn read_header(&mut self) -> Result<FrameHeader, CError> {
        self.read_magic()?;
        self.read_version()?;

        let mut header = FrameHeader {
            ir_size: self.read_size("ir_size")?,
            e_size: self.read_size("e_size")?,
            box_size: self.read_size("box_size")?,
            vir_size: self.read_size("vir_size")?,
            pres_size: self.read_size("pres_size")?,
            top_size: self.read_size("top_size")?,
            sym_size: self.read_size("sym_size")?,
            x_size: self.read_size("x_size")?,
            v_size: self.read_size("v_size")?,
            f_size: self.read_size("f_size")?,
            natoms: self.read_size("natoms")?,
            step: self.read_i32("step")?,
            time: 0.0,
        };
        let _nre = self.read_i32("nre")?;

        let precision = Self::infer_precision(&header)?;
        if precision != self.precision {
            debug!("TRR frame uses {precision:?} precision");
            self.precision = precision;
        }

        header.time = self.read_real("time")?;
        let _lambda = self.read_real("lambda")?;
        Ok(header)
    }

    fn check_block(&self, field: &'static str, size: usize, count: usize) -> Result<(), CError> {
        if size != 0 && size != count * self.precision.width() {
            return Err(CError::InvalidHeader {
                format: FORMAT,
                field,
                value: size as i64,
            });
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<FrameData, CError> {
        let header = self.read_header()?;
        self.check_block("box_size", header.box_size, DIM * DIM)?;
        self.check_block("x_size", header.x_size, DIM * header.natoms)?;

        self.skip(header.ir_size, "input record")?;
        self.skip(header.e_size, "energies")?;

        let cell = if header.box_size != 0 {
            let a = self.read_vector("box")? * NM_TO_ANGSTROM;
            let b = self.read_vector("box")? * NM_TO_ANGSTROM;
            let c = self.read_vector("box")? * NM_TO_ANGSTROM;
            Some(UnitCell::new(a, b, c))
        } else {
            None
        };

        self.skip(header.vir_size, "virial")?;
        self.skip(header.pres_size, "pressure")?;
        self.skip(header.top_size, "topology")?;
        self.skip(header.sym_size, "symbols")?;

        let positions = if header.x_size != 0 {
            self.ensure_available(header.x_size as u64, "positions")?;
            let mut positions = Vec::with_capacity(header.natoms);
            for _ in 0..header.natoms {
                positions.push(self.read_vector("positions")? * NM_TO_ANGSTROM);
            }
            Some(positions)
        } else {
            None
        };

        self.skip(header.v_size, "velocities")?;
        self.skip(header.f_size, "forces")?;

        Ok(FrameData {
            header,
            cell,
            positions,
        })
    }
}

fn truncation(error: io::Error, what: &str) -> CError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        CError::truncated(FORMAT, what)
    } else {
        CError::IoError(error)
    }
}

/// Reader and writer for GROMACS TRR trajectories.
///
/// Atoms get custom element codes labelled `Atom 0`, `Atom 1`, ... since
/// TRR files carry no element information.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrrFormat {
    precision: Precision,
}

impl TrrFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precision used when writing.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    fn add_atoms(molecule: &mut Molecule, positions: &[Vector3<f64>]) -> Result<(), CError> {
        let mut pool = CustomElementPool::new();
        for (i, position) in positions.iter().enumerate() {
            let code = pool.code_for(&format!("Atom {i}"))?;
            let atom = molecule.add_atom(code);
            molecule.set_atom_position_3d(atom, *position)?;
        }
        if !pool.is_empty() {
            molecule.set_custom_element_map(pool.into_map());
        }
        Ok(())
    }
}

impl FileFormat for TrrFormat {
    fn identifier(&self) -> &'static str {
        "TRR"
    }

    fn name(&self) -> &'static str {
        "TRR"
    }

    fn description(&self) -> &'static str {
        "GROMACS full-precision trajectory (positions, box, time and step per frame)."
    }

    fn file_extensions(&self) -> BTreeSet<String> {
        string_set(&["trr"])
    }

    fn mime_types(&self) -> BTreeSet<String> {
        string_set(&["application/octet-stream"])
    }

    fn supported_operations(&self) -> Operations {
        Operations::READ_WRITE_BINARY
    }

    fn read_molecule(
        &mut self,
        reader: &mut dyn ReadSeek,
        molecule: &mut Molecule,
    ) -> Result<(), CError> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut decoder = FrameDecoder::new(reader, end);
        let mut times = Vec::new();
        let mut steps = Vec::new();

        let first = decoder.read_frame()?;
        if let Some(cell) = first.cell {
            molecule.set_unit_cell(cell)?;
        }
        let positions = first.positions.unwrap_or_default();
        Self::add_atoms(molecule, &positions)?;
        molecule.set_coordinate_3d(positions, 0)?;
        times.push(first.header.time);
        steps.push(first.header.step as f64);

        while decoder.position()? < end {
            let frame = decoder.read_frame()?;
            if let Some(cell) = frame.cell {
                if !cell.is_regular() {
                    return Err(CError::IrregularUnitCell);
                }
            }

            times.push(frame.header.time);
            steps.push(frame.header.step as f64);
            match frame.positions {
                Some(positions) => {
                    let index = molecule.coordinate_3d_count();
                    molecule.set_coordinate_3d(positions, index)?;
                }
                None => debug!("TRR frame at step {} has no positions", frame.header.step),
            }
        }

        molecule.data_mut().set_value(TIME_KEY, times);
        molecule.data_mut().set_value(STEP_KEY, steps);
        Ok(())
    }

    fn write_molecule(
        &mut self,
        writer: &mut dyn Write,
        molecule: &Molecule,
    ) -> Result<(), CError> {
        let frames: Vec<Vec<Vector3<f64>>> = if molecule.coordinate_3d_count() == 0 {
            vec![molecule.atom_positions_3d()]
        } else {
            (0..molecule.coordinate_3d_count())
                .filter_map(|i| molecule.coordinate_3d(i).map(<[_]>::to_vec))
                .collect()
        };

        let times = molecule.data().value(TIME_KEY).to_list();
        let steps = molecule.data().value(STEP_KEY).to_list();
        let mut encoder = FrameEncoder {
            writer,
            precision: self.precision,
        };

        for (i, positions) in frames.iter().enumerate() {
            let time = times.get(i).copied().unwrap_or(i as f64);
            let step = steps.get(i).map_or(i as i32, |&step| step as i32);
            encoder.write_frame(molecule.unit_cell(), positions, step, time)?;
        }
        Ok(())
    }
}

/// Writes big-endian frames.
struct FrameEncoder<'a> {
    writer: &'a mut dyn Write,
    precision: Precision,
}

impl FrameEncoder<'_> {
    fn write_i32(&mut self, value: i32) -> Result<(), CError> {
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_real(&mut self, value: f64) -> Result<(), CError> {
        match self.precision {
            Precision::Single => self.writer.write_all(&(value as f32).to_be_bytes())?,
            Precision::Double => self.writer.write_all(&value.to_be_bytes())?,
        }
        Ok(())
    }

    fn block_size(&self, count: usize) -> Result<i32, CError> {
        i32::try_from(count * self.precision.width())
            .map_err(|_| CError::Unsupported(format!("{count} reals do not fit in a TRR frame")))
    }

    fn write_frame(
        &mut self,
        cell: Option<&UnitCell>,
        positions: &[Vector3<f64>],
        step: i32,
        time: f64,
    ) -> Result<(), CError> {
        let box_size = if cell.is_some() {
            self.block_size(DIM * DIM)?
        } else {
            0
        };
        let x_size = self.block_size(DIM * positions.len())?;
        let natoms = i32::try_from(positions.len())
            .map_err(|_| CError::Unsupported("too many atoms for a TRR frame".into()))?;

        self.write_i32(GROMACS_MAGIC)?;
        self.write_i32(VERSION.len() as i32 + 1)?;
        self.write_i32(VERSION.len() as i32)?;
        self.writer.write_all(VERSION.as_bytes())?;

        // ir, e, box, vir, pres, top, sym, x, v, f
        for size in [0, 0, box_size, 0, 0, 0, 0, x_size, 0, 0] {
            self.write_i32(size)?;
        }
        self.write_i32(natoms)?;
        self.write_i32(step)?;
        self.write_i32(0)?;
        self.write_real(time)?;
        self.write_real(0.0)?;

        if let Some(cell) = cell {
            for vector in [cell.a_vector(), cell.b_vector(), cell.c_vector()] {
                for value in vector.iter() {
                    self.write_real(value * ANGSTROM_TO_NM)?;
                }
            }
        }
        for position in positions {
            for value in position.iter() {
                self.write_real(value * ANGSTROM_TO_NM)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    /// Hand-assembled TRR frame.
    #[derive(Clone)]
    struct RawFrame {
        endian: Endian,
        width: usize,
        magic: i32,
        version: &'static str,
        box_rows: Option<[[f64; 3]; 3]>,
        positions: Vec<[f64; 3]>,
        velocities: bool,
        ir_bytes: usize,
        step: i32,
        time: f64,
    }

    impl RawFrame {
        fn new(positions: Vec<[f64; 3]>) -> Self {
            RawFrame {
                endian: Endian::Big,
                width: 4,
                magic: GROMACS_MAGIC,
                version: VERSION,
                box_rows: Some([[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0]]),
                positions,
                velocities: false,
                ir_bytes: 0,
                step: 0,
                time: 0.0,
            }
        }

        fn int(&self, out: &mut Vec<u8>, value: i32) {
            match self.endian {
                Endian::Big => out.extend(value.to_be_bytes()),
                Endian::Little => out.extend(value.to_le_bytes()),
            }
        }

        fn real(&self, out: &mut Vec<u8>, value: f64) {
            match (self.width, self.endian) {
                (8, Endian::Big) => out.extend(value.to_be_bytes()),
                (8, Endian::Little) => out.extend(value.to_le_bytes()),
                (_, Endian::Big) => out.extend((value as f32).to_be_bytes()),
                (_, Endian::Little) => out.extend((value as f32).to_le_bytes()),
            }
        }

        fn bytes(&self) -> Vec<u8> {
            let mut out = Vec::new();
            let natoms = self.positions.len();
            let box_size = if self.box_rows.is_some() { 9 * self.width } else { 0 };
            let x_size = 3 * natoms * self.width;
            let v_size = if self.velocities { x_size } else { 0 };

            self.int(&mut out, self.magic);
            self.int(&mut out, self.version.len() as i32 + 1);
            self.int(&mut out, self.version.len() as i32);
            out.extend(self.version.as_bytes());
            let sizes = [self.ir_bytes, 0, box_size, 0, 0, 0, 0, x_size, v_size, 0];
            for size in sizes {
                self.int(&mut out, size as i32);
            }
            self.int(&mut out, natoms as i32);
            self.int(&mut out, self.step);
            self.int(&mut out, 0);
            self.real(&mut out, self.time);
            self.real(&mut out, 0.0);

            out.extend(std::iter::repeat(0xAB).take(self.ir_bytes));
            if let Some(rows) = self.box_rows {
                for value in rows.iter().flatten() {
                    self.real(&mut out, *value);
                }
            }
            for position in &self.positions {
                for value in position {
                    self.real(&mut out, *value);
                }
            }
            if self.velocities {
                for _ in 0..3 * natoms {
                    self.real(&mut out, 99.0);
                }
            }
            out
        }
    }

    fn water_positions() -> Vec<[f64; 3]> {
        vec![[0.1, 0.2, 0.3], [0.15, 0.2, 0.3], [0.1, 0.25, 0.3]]
    }

    fn read(bytes: Vec<u8>) -> (Result<(), CError>, Molecule) {
        let mut molecule = Molecule::new();
        let result = TrrFormat::new().read_molecule(&mut Cursor::new(bytes), &mut molecule);
        (result, molecule)
    }

    fn check_water(molecule: &Molecule) {
        assert_eq!(molecule.atom_count(), 3);
        assert_eq!(molecule.atomic_numbers(), vec![128, 129, 130]);
        assert_eq!(molecule.atom_label(1).as_deref(), Some("Atom 1"));
        assert_eq!(molecule.custom_element_map().len(), 3);

        let position = molecule.atom(1).unwrap().position3d;
        assert_approx_eq!(position.x, 1.5, 1e-5);
        assert_approx_eq!(position.y, 2.0, 1e-5);
        assert_approx_eq!(position.z, 3.0, 1e-5);

        let cell = molecule.unit_cell().unwrap();
        assert_approx_eq!(cell.a(), 10.0, 1e-5);
        assert_approx_eq!(cell.b(), 20.0, 1e-5);
        assert_approx_eq!(cell.c(), 30.0, 1e-5);
    }

    #[test]
    fn single_frame_big_endian() {
        let (result, molecule) = read(RawFrame::new(water_positions()).bytes());
        result.unwrap();
        check_water(&molecule);
        assert_eq!(molecule.coordinate_3d_count(), 1);
    }

    #[test]
    fn single_frame_little_endian() {
        let mut frame = RawFrame::new(water_positions());
        frame.endian = Endian::Little;
        let (result, molecule) = read(frame.bytes());
        result.unwrap();
        check_water(&molecule);
    }

    #[test]
    fn double_precision() {
        let mut frame = RawFrame::new(water_positions());
        frame.width = 8;
        frame.velocities = true;
        let (result, molecule) = read(frame.bytes());
        result.unwrap();
        check_water(&molecule);
        assert_approx_eq!(molecule.atom(0).unwrap().position3d.x, 1.0, 1e-12);
    }

    #[test]
    fn skips_input_record() {
        let mut frame = RawFrame::new(water_positions());
        frame.ir_bytes = 12;
        let (result, molecule) = read(frame.bytes());
        result.unwrap();
        check_water(&molecule);
    }

    #[test]
    fn bad_magic() {
        for endian in [Endian::Big, Endian::Little] {
            let mut frame = RawFrame::new(water_positions());
            frame.magic = 1994;
            frame.endian = endian;
            let (result, molecule) = read(frame.bytes());
            let error = result.unwrap_err();
            assert!(matches!(error, CError::BadMagic { expected: 1993, .. }));
            assert_eq!(error.kind(), ErrorKind::Framing);
            assert!(molecule.unit_cell().is_none());
            assert_eq!(molecule.atom_count(), 0);
        }
    }

    #[test]
    fn version_mismatch() {
        let mut frame = RawFrame::new(water_positions());
        frame.version = "GMX_xtc_file";
        let (result, _) = read(frame.bytes());
        assert!(matches!(result, Err(CError::VersionMismatch { .. })));
    }

    #[test]
    fn truncated_stream() {
        let bytes = RawFrame::new(water_positions()).bytes();
        for length in [0, 2, 30, bytes.len() - 1] {
            let (result, _) = read(bytes[..length].to_vec());
            let error = result.unwrap_err();
            assert!(matches!(error, CError::Truncated { .. }), "{length}: {error}");
            assert_eq!(error.kind(), ErrorKind::Framing);
        }
    }

    #[test]
    fn multiple_frames() {
        let mut bytes = Vec::new();
        for i in 0..3 {
            let mut frame = RawFrame::new(water_positions());
            for position in &mut frame.positions {
                position[0] += 0.1 * i as f64;
            }
            // byte order and precision are detected again for every frame
            frame.endian = if i == 1 { Endian::Little } else { Endian::Big };
            frame.width = if i == 2 { 8 } else { 4 };
            frame.step = 100 * i;
            frame.time = 0.5 * i as f64;
            bytes.extend(frame.bytes());
        }

        let (result, molecule) = read(bytes);
        result.unwrap();
        assert_eq!(molecule.atom_count(), 3);
        assert_eq!(molecule.coordinate_3d_count(), 3);
        assert_approx_eq!(molecule.coordinate_3d(2).unwrap()[0].x, 3.0, 1e-5);
        assert_approx_eq!(molecule.coordinate_3d(1).unwrap()[0].x, 2.0, 1e-5);

        let times = molecule.data().value(TIME_KEY).to_list();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        let steps = molecule.data().value(STEP_KEY).to_list();
        assert_eq!(steps, vec![0.0, 100.0, 200.0]);
    }

    #[test]
    fn later_frame_with_other_atom_count() {
        let mut bytes = RawFrame::new(water_positions()).bytes();
        bytes.extend(RawFrame::new(vec![[0.0; 3]; 2]).bytes());
        let (result, molecule) = read(bytes);
        let error = result.unwrap_err();
        assert!(matches!(
            error,
            CError::FrameSizeMismatch {
                frame: 1,
                expected: 3,
                got: 2
            }
        ));
        assert_eq!(error.kind(), ErrorKind::Semantic);
        assert_eq!(molecule.coordinate_3d_count(), 1);
    }

    #[test]
    fn irregular_box() {
        let mut frame = RawFrame::new(water_positions());
        frame.box_rows = Some([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 3.0]]);
        let (result, molecule) = read(frame.bytes());
        assert!(matches!(result, Err(CError::IrregularUnitCell)));
        assert!(molecule.unit_cell().is_none());

        let mut bytes = RawFrame::new(water_positions()).bytes();
        bytes.extend(frame.bytes());
        let (result, _) = read(bytes);
        assert!(matches!(result, Err(CError::IrregularUnitCell)));
    }

    #[test]
    fn custom_element_limit() {
        let (result, molecule) = read(RawFrame::new(vec![[0.0; 3]; 127]).bytes());
        result.unwrap();
        assert_eq!(molecule.atomic_number(126), Some(254));

        let (result, _) = read(RawFrame::new(vec![[0.0; 3]; 128]).bytes());
        let error = result.unwrap_err();
        assert!(matches!(
            error,
            CError::CustomElementPoolExhausted { limit: 127 }
        ));
        assert_eq!(error.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn invalid_sizes() {
        let mut bytes = RawFrame::new(water_positions()).bytes();
        // box_size is the third entry of the size table, after 12 bytes of
        // magic and lengths and 12 bytes of version string
        let offset = 12 + VERSION.len() + 8;
        bytes[offset..offset + 4].copy_from_slice(&27_i32.to_be_bytes());
        let (result, _) = read(bytes.clone());
        assert!(matches!(
            result,
            Err(CError::InvalidHeader {
                field: "box_size",
                value: 27,
                ..
            })
        ));

        bytes[offset..offset + 4].copy_from_slice(&(-36_i32).to_be_bytes());
        let (result, _) = read(bytes);
        assert!(matches!(
            result,
            Err(CError::InvalidHeader {
                field: "box_size",
                value: -36,
                ..
            })
        ));
    }

    #[test]
    fn oversized_header_fields_are_truncation() {
        let bytes = RawFrame::new(water_positions()).bytes();

        // version string length
        let mut huge_version = bytes.clone();
        huge_version[4..8].copy_from_slice(&i32::MAX.to_be_bytes());
        let (result, _) = read(huge_version);
        assert!(matches!(result, Err(CError::Truncated { .. })));

        // natoms and a matching x_size, with only the header and box present
        let natoms: i32 = 100_000_000;
        let sizes = 12 + VERSION.len();
        let mut huge_frame = bytes[..sizes + 96].to_vec();
        huge_frame[sizes + 28..sizes + 32].copy_from_slice(&(natoms * 12).to_be_bytes());
        huge_frame[sizes + 40..sizes + 44].copy_from_slice(&natoms.to_be_bytes());
        let (result, molecule) = read(huge_frame);
        let error = result.unwrap_err();
        assert!(matches!(error, CError::Truncated { .. }), "{error}");
        assert_eq!(error.kind(), ErrorKind::Framing);
        assert_eq!(molecule.atom_count(), 0);
    }

    #[test]
    fn empty_frame_falls_back_to_single_precision() {
        let mut frame = RawFrame::new(Vec::new());
        frame.box_rows = None;
        frame.time = 2.5;
        let (result, molecule) = read(frame.bytes());
        result.unwrap();
        assert_eq!(molecule.atom_count(), 0);
        assert_eq!(molecule.data().value(TIME_KEY).to_list(), vec![2.5]);
    }

    #[test]
    fn write_then_read() {
        for precision in [Precision::Single, Precision::Double] {
            let (result, original) = {
                let mut bytes = Vec::new();
                for i in 0..2 {
                    let mut frame = RawFrame::new(water_positions());
                    frame.positions[2][2] += 0.1 * i as f64;
                    frame.step = 10 * i;
                    frame.time = i as f64;
                    bytes.extend(frame.bytes());
                }
                read(bytes)
            };
            result.unwrap();

            let mut bytes = Vec::new();
            TrrFormat::new()
                .with_precision(precision)
                .write_molecule(&mut bytes, &original)
                .unwrap();

            let (result, molecule) = read(bytes);
            result.unwrap();
            check_water(&molecule);
            assert_eq!(molecule.coordinate_3d_count(), 2);
            assert_approx_eq!(molecule.coordinate_3d(1).unwrap()[2].z, 4.0, 1e-5);
            assert_eq!(molecule.data().value(STEP_KEY).to_list(), vec![0.0, 10.0]);
        }
    }
}
