//! SMILES reading and writing for [`MoleculeGraph`].
//!
//! The reader accepts the organic subset, bracket atoms (isotope, element,
//! hydrogen count, charge), aromatic lowercase atoms, bonds, branches, ring
//! closures and `.` fragments. Stereo marks and atom-map classes are read and
//! dropped. Atoms receive ids `0..n` in the order they appear.

pub mod error;
mod parser;
pub(crate) mod writer;

use crate::graph::MoleculeGraph;

pub use error::ParseError;
pub use writer::{write, write_canonical};

pub fn parse(text: &str) -> Result<MoleculeGraph, ParseError> {
    parser::parse_smiles(text)
}
