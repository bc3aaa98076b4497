//! Reading and writing the tab-delimited `.smi` files exchanged between generations.
//!
//! Source compounds and reagent sets are plain `SMILES<TAB>NAME` rows; ranked
//! generation artifacts carry the full provenance of each ligand.

pub mod smi;
pub mod traits;
