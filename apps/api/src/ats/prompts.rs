// LLM prompt constants for the ATS module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for ATS scoring.
pub const ATS_SCORE_SYSTEM: &str = "You are an expert Applicant Tracking System (ATS) analyst \
    and technical recruiter. You evaluate resumes the way enterprise ATS software and \
    hiring managers do. Respond with exactly one JSON object wrapped in a ```json fenced \
    code block. Do NOT include commentary outside the code block.";

/// ATS scoring prompt template.
/// Replace: {evidence_instruction}, {job_context}, {resume_text}
pub const ATS_SCORE_PROMPT_TEMPLATE: &str = r#"{evidence_instruction}

{job_context}

Score the resume below and return a JSON object with this schema:
{
  "atsScore": 72,
  "scoreBreakdown": {
    "technicalSkills": 80,
    "experienceRelevance": 70,
    "additionalSkills": 60,
    "formatting": 90
  },
  "matchedKeywords": ["Rust", "PostgreSQL"],
  "missingKeywords": [
    {"keyword": "Kubernetes", "priority": "high", "context": "Listed under required qualifications"}
  ],
  "matchedSkills": ["Rust"],
  "missingSkills": [
    {"skill": "Go", "priority": "medium", "context": "Mentioned as part of the stack"}
  ],
  "skillMatchPercentage": 50,
  "gapAnalysis": "One or two sentences on the most important gaps.",
  "formattingIssues": ["Tables detected in the skills section"],
  "recommendations": ["Add a professional summary"],
  "actionableFeedback": [
    {"priority": "high", "action": "Add Kubernetes deployment work to your latest role", "impact": "+8 points on technical skills"}
  ],
  "sectionScores": {"experience": 75, "education": 80, "skills": 70},
  "sectionCompleteness": {"presentSections": ["experience"], "missingSections": ["summary"], "score": 60},
  "quantifiableMetrics": {"count": 3, "examples": ["Cut latency by 40%"], "suggestions": ["Quantify team size"]},
  "skillsBreakdown": {"hardSkills": ["Rust"], "softSkills": ["Mentoring"]},
  "lengthAnalysis": {"wordCount": 540, "pageEstimate": 1.5, "verdict": "appropriate"},
  "blockingElements": ["Header image"],
  "standardHeaders": {"compliant": true, "nonStandardHeaders": []}
}

SCORING CATEGORIES (each 0-100):
- technicalSkills: required technical skills present in the resume (weight 40%)
- experienceRelevance: how closely past roles match the target role (weight 30%)
- additionalSkills: preferred qualifications and transferable skills (weight 20%)
- formatting: parseability by ATS software (weight 10%)

PRIORITY for missing keywords and skills:
- "high": explicitly required; absence likely means rejection
- "medium": listed but not mandatory
- "low": nice-to-have or implied

If no job description is given, score against general best practice for the candidate's
apparent target role and leave the keyword lists empty.

RESUME:
{resume_text}"#;

/// Job context block when a job description is supplied.
/// Replace: {job_description}
pub const JOB_CONTEXT_TEMPLATE: &str = r#"TARGET JOB DESCRIPTION:
{job_description}"#;

pub const NO_JOB_CONTEXT: &str = "No job description was provided.";

/// System prompt for the section-level advisory pass.
pub const SECTION_ANALYSIS_SYSTEM: &str = "You are a senior resume reviewer. \
    You give short, specific feedback on each entry of a resume. \
    Respond with exactly one JSON object wrapped in a ```json fenced code block.";

/// Section analysis prompt template.
/// Replace: {evidence_instruction}, {work_count}, {education_count}, {skills_count}, {resume_text}
pub const SECTION_ANALYSIS_PROMPT_TEMPLATE: &str = r#"{evidence_instruction}

The resume has {work_count} work entries, {education_count} education entries and
{skills_count} skill groups, in the order shown. Return exactly one feedback object per
entry, in the same order:
{
  "work": [{"score": 70, "strengths": ["..."], "improvements": ["..."]}],
  "education": [{"score": 80, "strengths": ["..."], "improvements": ["..."]}],
  "skills": [{"score": 65, "strengths": ["..."], "improvements": ["..."]}]
}

RESUME:
{resume_text}"#;

/// Fills `{name}` placeholders in a single pass. Substituted values are never
/// rescanned, so a job description or resume containing `{resume_text}` stays
/// literal. Unknown braces (the JSON schema) are copied through.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = vars.iter().find_map(|(name, value)| {
            let token_len = name.len() + 2;
            let matches = tail.len() >= token_len
                && tail[1..].starts_with(name)
                && tail[1 + name.len()..].starts_with('}');
            matches.then_some((token_len, *value))
        });
        match hit {
            Some((token_len, value)) => {
                out.push_str(value);
                rest = &tail[token_len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
