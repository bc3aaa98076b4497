use ligen::engine::config::{DEFAULT_CONVERSION_PROGRAM, DEFAULT_CONVERSION_TIMEOUT};
use ligen::engine::filters::FilterKind;

/// Values used when neither the command line nor the config file sets them.
///
/// Engine-level defaults (round budget, MCS budgets, over-provisioning) are left to
/// the core configuration builder.
pub struct DefaultsConfig {
    pub root_output_folder: String,
    pub num_generations: u32,
    pub number_of_crossovers: usize,
    pub number_of_mutants: usize,
    pub reaction_library: String,
    pub filters: Vec<FilterKind>,
    pub conversion_program: String,
    pub conversion_timeout_secs: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            root_output_folder: "ligen_output".to_string(),
            num_generations: 10,
            number_of_crossovers: 20,
            number_of_mutants: 20,
            reaction_library: "all_rxns".to_string(),
            filters: vec![FilterKind::LipinskiStrict],
            conversion_program: DEFAULT_CONVERSION_PROGRAM.to_string(),
            conversion_timeout_secs: DEFAULT_CONVERSION_TIMEOUT.as_secs_f64(),
        }
    }
}
