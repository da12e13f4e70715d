//! Field names and layout descriptions.
//!
//! Output files use a fixed vocabulary of field names so that the
//! caching layer and downstream tooling agree on what lives where.

/// Simulation time per time index.
pub const TIME: &str = "time";
/// Ancestor indices per time index, one per particle.
pub const ANCESTOR: &str = "ancestor";
/// Log-weights per time index, one per particle.
pub const LOG_WEIGHT: &str = "logweight";
/// Resample flag per time index (0.0 or 1.0).
pub const RESAMPLE: &str = "resample";
/// Log-likelihood per sample (or one per filter pass).
pub const LOG_LIKELIHOOD: &str = "loglikelihood";
/// Log-prior density per sample.
pub const LOG_PRIOR: &str = "logprior";
/// Parameter vector per sample.
pub const PARAMETER: &str = "parameter";

/// Name of the trajectory field for state variable `v`.
pub fn state_var(v: usize) -> String {
    format!("x_{v}")
}

/// Declaration of one store field: a growable 2-D array of
/// `[index, width]` with `width` fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Values per index; 1 for scalar-per-index fields.
    pub width: usize,
}

impl FieldSpec {
    /// Creates a field declaration with the given width.
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width: width.max(1),
        }
    }

    /// Creates a width-1 (scalar-per-index) field declaration.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, 1)
    }
}

/// Layout of a particle-filter output file.
///
/// Per-time fields are indexed by time step; particle-valued fields
/// have one column per particle, state fields one field per variable.
pub fn filter_layout(n_particles: usize, n_vars: usize) -> Vec<FieldSpec> {
    let mut layout = vec![
        FieldSpec::scalar(TIME),
        FieldSpec::scalar(RESAMPLE),
        FieldSpec::scalar(LOG_LIKELIHOOD),
        FieldSpec::new(LOG_WEIGHT, n_particles),
        FieldSpec::new(ANCESTOR, n_particles),
    ];
    for v in 0..n_vars {
        layout.push(FieldSpec::new(state_var(v), n_particles));
    }
    layout
}

/// Layout of an MCMC output file.
///
/// Per-sample fields are indexed by sample id; trajectory fields have
/// one column per time step, one field per state variable.
pub fn mcmc_layout(n_params: usize, n_vars: usize, n_times: usize) -> Vec<FieldSpec> {
    let mut layout = vec![
        FieldSpec::scalar(TIME),
        FieldSpec::scalar(LOG_LIKELIHOOD),
        FieldSpec::scalar(LOG_PRIOR),
        FieldSpec::new(PARAMETER, n_params),
    ];
    for v in 0..n_vars {
        layout.push(FieldSpec::new(state_var(v), n_times));
    }
    layout
}
