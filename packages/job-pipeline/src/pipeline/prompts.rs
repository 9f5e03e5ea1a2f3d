//! LLM prompts for field extraction.

/// System instruction for the extraction call. The user message is the
/// normalized job description.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract structured data from a job description.

Respond with one JSON object with exactly these keys:

{
    "summary": string,
    "industries": [string],
    "soft_skills": [string],
    "hard_skills": [string],
    "tech_stack": [string],
    "programming_languages": [string],
    "education": {"min_degree": string, "fields": [string]},
    "salary": {"min": integer, "max": integer},
    "benefits": [string]
}

Rules:
- "summary": two or three sentences describing the role.
- "industries": infer the industries the employer operates in.
- Skills, tech stack, languages and benefits: one short item per entry.
  Never group items under a heading.
  Bad:  ["Programming languages: Python, R, Java", "Visualization tools: Tableau"]
  Good: ["Python", "R", "Java", "Tableau"]
- "tech_stack" matters most: list every tool, framework, database, cloud
  service and platform mentioned.
- "salary": yearly amounts in whole units as stated in the pay or
  compensation section; use 0 for any bound that is not mentioned.
- Use empty strings and empty lists for anything the description does not
  mention. Do not add keys."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_field() {
        for key in [
            "summary",
            "industries",
            "soft_skills",
            "hard_skills",
            "tech_stack",
            "programming_languages",
            "min_degree",
            "salary",
            "benefits",
        ] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(key), "missing {key}");
        }
    }
}
