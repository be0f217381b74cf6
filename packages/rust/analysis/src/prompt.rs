//! Prompt text sent to the analysis model.

/// System instruction: the reply must be one raw JSON object.
pub const SYSTEM_PROMPT: &str = "You are a software analyst who researches third-party tools. \
Respond with a single raw JSON object and nothing else: no markdown, no code fences, \
no commentary before or after the JSON.";

/// Expected reply shape, embedded verbatim in the user prompt.
const RESPONSE_SHAPE: &str = r#"{
  "name": "string",
  "slug": "lowercase-hyphenated-string",
  "website": "string",
  "tagline": "string",
  "short_description": "string (one sentence)",
  "company": "string",
  "description": "string (two to four paragraphs)",
  "categories": ["string"],
  "features": [{"name": "string", "description": "string"}],
  "integrations": ["string"],
  "pros_cons": {"pros": ["string"], "cons": ["string"]},
  "use_cases": ["string"]
}"#;

/// Build the user prompt for one tool.
pub fn user_prompt(name: &str, url: &str) -> String {
    format!(
        "Analyze the tool \"{name}\" (URL: {url}).\n\n\
         Return ONLY a JSON object with exactly this structure:\n{RESPONSE_SHAPE}\n\n\
         Every field is required. Use empty arrays when you have nothing to list. \
         Do not wrap the JSON in code fences."
    )
}
