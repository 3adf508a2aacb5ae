// Prompt fragments shared by every service that calls the model.
// Each service keeps its own prompts.rs alongside it.

/// Instruction prepended to prompts that evaluate a candidate's resume.
pub const EVIDENCE_INSTRUCTION: &str = "\
    Judge only what the resume text actually states. \
    Do NOT assume skills, employers, or results that are not written down. \
    If the resume is silent on a requirement, treat it as missing.";
