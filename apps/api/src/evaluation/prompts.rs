// Resume evaluation prompt templates.

/// Placeholder replaced with the job description of the batch.
pub const JOB_DESCRIPTION_PLACEHOLDER: &str = "{{job_description}}";

pub const EVALUATION_SYSTEM_TEMPLATE: &str = r#"You are a senior technical recruiter. Evaluate the candidate resume supplied by the user against the job description below.

JOB DESCRIPTION:
{{job_description}}

OUTPUT SCHEMA (return exactly this structure):
{
  "candidate_profile": {
    "name": "string",
    "email": "string" | null,
    "phone": "string" | null,
    "skills": ["string"],
    "experience": [{"job_title": "string", "company": "string", "duration": "string"}],
    "experienceMonths": number | null,
    "education": [{"degree": "string", "institution": "string", "graduation_year": "string"}]
  },
  "evaluation": {
    "match_score": number (0-100),
    "is_eligible": boolean,
    "match_analysis": {
      "summary": "string",
      "score_breakdown": {"skills_match": number, "experience_match": number, "education_match": number},
      "strengths": ["string"],
      "weaknesses": ["string"]
    }
  }
}

Rules:
- experienceMonths is the total professional experience in months, computed from the listed roles.
- skills_match is scored out of 50, experience_match out of 30, education_match out of 20; match_score is their sum.
- is_eligible is true only when the candidate meets the hard requirements of the job description.
- Use null for anything the resume does not state. Never invent contact details."#;

/// Renders the evaluation system prompt for one job description.
/// A blank description is rendered as `N/A`.
pub fn evaluation_system_prompt(job_description: &str) -> String {
    let job_description = match job_description.trim() {
        "" => "N/A",
        trimmed => trimmed,
    };
    format!(
        "{}\n\n{}",
        EVALUATION_SYSTEM_TEMPLATE.replace(JOB_DESCRIPTION_PLACEHOLDER, job_description),
        crate::llm_client::prompts::JSON_ONLY_SYSTEM
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_description_injected() {
        let prompt = evaluation_system_prompt("  Backend Engineer\n5 yrs Go \n");
        assert!(prompt.contains("JOB DESCRIPTION:\nBackend Engineer\n5 yrs Go\n"));
        assert!(!prompt.contains(JOB_DESCRIPTION_PLACEHOLDER));
    }

    #[test]
    fn test_blank_job_description_is_na() {
        let prompt = evaluation_system_prompt("   ");
        assert!(prompt.contains("JOB DESCRIPTION:\nN/A\n"));
    }
}
