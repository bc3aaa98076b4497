use crate::core::models::molecule::{Molecule, SanitizeError};
use crate::core::reactions::ReactionError;
use crate::core::reactions::library::ReactionLibrary;
use crate::core::reagents::ReagentIndex;
use crate::engine::state::AttemptFailure;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct MutationProduct {
    pub molecule: Molecule,
    /// Name of the reaction template that was applied.
    pub reaction: String,
    /// Names of the reagents that filled the other reactant slots, in slot order.
    pub reagents: Vec<String>,
}

/// Reacts `parent` with randomly chosen complementary reagents.
///
/// The parent takes one slot of one applicable template, chosen uniformly among every
/// `(template, slot)` it can occupy; each remaining slot is filled with a reagent drawn
/// uniformly from that slot's functional group.
pub fn mutate<R: Rng + ?Sized>(
    parent: &Molecule,
    library: &ReactionLibrary,
    reagents: &ReagentIndex,
    rng: &mut R,
) -> Result<MutationProduct, AttemptFailure> {
    let slots = library.applicable_slots(parent);
    let &(template_index, parent_slot) =
        slots.choose(rng).ok_or(AttemptFailure::NoApplicableReaction)?;
    let template = &library.templates()[template_index];

    let mut partners = Vec::with_capacity(template.groups().len());
    for (slot, group) in template.groups().iter().enumerate() {
        if slot == parent_slot {
            continue;
        }
        let reagent = reagents
            .reagents(group)
            .choose(rng)
            .ok_or(AttemptFailure::NoReagentAvailable)?;
        partners.push((slot, reagent));
    }

    let mut reactants: Vec<&Molecule> = Vec::with_capacity(template.groups().len());
    let mut partner_iter = partners.iter();
    for slot in 0..template.groups().len() {
        if slot == parent_slot {
            reactants.push(parent);
        } else if let Some((_, reagent)) = partner_iter.next() {
            reactants.push(&reagent.molecule);
        }
    }

    let molecule = template
        .reaction()
        .run(&reactants, rng)
        .map_err(|e| {
            trace!(reaction = template.name(), error = %e, "Reaction did not yield a product");
            match e {
                ReactionError::ReactantCount { .. }
                | ReactionError::NoMatch(_)
                | ReactionError::Sanitize(SanitizeError::Empty) => AttemptFailure::ReactionFailed,
                ReactionError::Sanitize(_) => AttemptFailure::MalformedProduct,
            }
        })?;

    Ok(MutationProduct {
        molecule,
        reaction: template.name().to_string(),
        reagents: partners.iter().map(|(_, r)| r.name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reactions::library::BuiltinLibrary;
    use crate::core::reagents::Reagent;
    use crate::core::smiles::parse_smiles;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reagent(name: &str, smiles: &str) -> Reagent {
        Reagent {
            name: name.to_string(),
            molecule: parse_smiles(smiles).unwrap(),
        }
    }

    fn canonical(smiles: &str) -> String {
        parse_smiles(smiles).unwrap().canonical_smiles().to_string()
    }

    fn library() -> ReactionLibrary {
        ReactionLibrary::builtin(BuiltinLibrary::All).unwrap()
    }

    #[test]
    fn acid_parent_is_coupled_with_an_amine_or_alcohol() {
        let library = library();
        let mut index = ReagentIndex::default();
        index.insert("Amine", vec![reagent("ethylamine", "CCN")]);
        index.insert("Alcohol", vec![reagent("ethanol", "CCO")]);
        let parent = parse_smiles("OC(=O)c1ccccc1").unwrap();

        let amide = canonical("CCNC(=O)c1ccccc1");
        let ester = canonical("CCOC(=O)c1ccccc1");
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let product = mutate(&parent, &library, &index, &mut rng).unwrap();
            let smiles = product.molecule.canonical_smiles().to_string();
            match product.reaction.as_str() {
                "Amide_Coupling" => {
                    assert_eq!(smiles, amide);
                    assert_eq!(product.reagents, vec!["ethylamine".to_string()]);
                }
                "Ester_Formation" => {
                    assert_eq!(smiles, ester);
                    assert_eq!(product.reagents, vec!["ethanol".to_string()]);
                }
                other => panic!("unexpected reaction {other}"),
            }
        }
    }

    #[test]
    fn molecule_without_reactive_groups_has_no_applicable_reaction() {
        let mut rng = StdRng::seed_from_u64(0);
        let parent = parse_smiles("CCCCCC").unwrap();
        assert_eq!(
            mutate(&parent, &library(), &ReagentIndex::default(), &mut rng).unwrap_err(),
            AttemptFailure::NoApplicableReaction
        );
    }

    #[test]
    fn empty_reagent_group_is_reported() {
        let mut rng = StdRng::seed_from_u64(0);
        let parent = parse_smiles("OC(=O)c1ccccc1").unwrap();
        assert_eq!(
            mutate(&parent, &library(), &ReagentIndex::default(), &mut rng).unwrap_err(),
            AttemptFailure::NoReagentAvailable
        );
    }

    #[test]
    fn unimolecular_template_needs_no_reagents() {
        let library = ReactionLibrary::builtin(BuiltinLibrary::Robust).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let parent = parse_smiles("CCOC(=O)c1ccccc1").unwrap();
        let product = mutate(&parent, &library, &ReagentIndex::default(), &mut rng).unwrap();
        assert_eq!(product.reaction, "Ester_Hydrolysis");
        assert!(product.reagents.is_empty());
        assert_eq!(product.molecule.canonical_smiles(), canonical("OC(=O)c1ccccc1"));
    }
}
