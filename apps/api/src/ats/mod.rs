//! ATS analysis core: text normalization, response validation, gap
//! reconciliation and score aggregation.

pub mod aggregator;
pub mod checks;
pub mod gaps;
pub mod normalizer;
pub mod prompts;
pub mod safe_number;
pub mod scorer;
pub mod validator;
