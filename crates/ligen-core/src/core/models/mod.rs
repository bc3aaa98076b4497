pub mod atom;
pub mod element;
pub mod ligand;
pub mod molecule;
pub mod population;
pub mod topology;
