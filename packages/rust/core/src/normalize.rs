//! Cleanup, validation and fallback for raw analysis replies.
//!
//! [`normalize`] is total: every input produces a [`ToolProfile`] with a
//! non-empty name and description, a feature list, and a pros/cons structure.
//! Replies that fail validation are replaced by [`fallback_profile`].

use serde::Deserialize;

use toolscout_shared::{Feature, ProsCons, ToolProfile, slugify};

/// Maximum characters of the raw reply quoted in a fallback description.
pub const EXCERPT_CHARS: usize = 500;

/// Outcome of normalizing one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub profile: ToolProfile,
    /// True when the reply could not be validated and the fallback was used.
    pub fallback: bool,
}

/// Why a reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not JSON, or a field had the wrong type.
    Decode(String),
    /// A required field was absent or empty.
    Missing(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode failed: {e}"),
            Self::Missing(field) => write!(f, "missing required field `{field}`"),
        }
    }
}

/// Reply shape as the model is asked to produce it. Required fields are
/// optional here so absence is reported as [`Rejection::Missing`].
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default, alias = "shortDescription")]
    short_description: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    features: Option<Vec<Feature>>,
    #[serde(default)]
    integrations: Option<Vec<String>>,
    #[serde(default, alias = "prosCons")]
    pros_cons: Option<ProsCons>,
    #[serde(default, alias = "useCases")]
    use_cases: Option<Vec<String>>,
}

/// Strip a surrounding code fence (with or without a language tag).
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // Drop the language tag: the rest of the opening line, or a leading word
    // when the fence and the payload share a line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Validate a cleaned reply and convert it into a profile.
///
/// `url` fills in `website` when the reply leaves it empty.
pub fn parse_profile(cleaned: &str, url: &str) -> Result<ToolProfile, Rejection> {
    let payload: AnalysisPayload =
        serde_json::from_str(cleaned).map_err(|e| Rejection::Decode(e.to_string()))?;

    let name = non_empty(payload.name).ok_or(Rejection::Missing("name"))?;
    let description = non_empty(payload.description).ok_or(Rejection::Missing("description"))?;
    let features = payload.features.ok_or(Rejection::Missing("features"))?;
    let pros_cons = payload.pros_cons.ok_or(Rejection::Missing("pros_cons"))?;
    let use_cases = payload.use_cases.ok_or(Rejection::Missing("use_cases"))?;

    let slug = slugify(non_empty(payload.slug).as_deref().unwrap_or(name.as_str()));

    Ok(ToolProfile {
        slug,
        website: non_empty(payload.website).unwrap_or_else(|| url.to_string()),
        tagline: payload.tagline.unwrap_or_default(),
        short_description: payload.short_description.unwrap_or_default(),
        company: payload.company.unwrap_or_default(),
        categories: payload.categories.unwrap_or_default(),
        integrations: payload.integrations.unwrap_or_default(),
        name,
        description,
        features,
        pros_cons,
        use_cases,
    })
}

/// Minimal valid profile for a reply that failed validation.
pub fn fallback_profile(raw: &str, name: &str, url: &str) -> ToolProfile {
    ToolProfile {
        slug: slugify(name),
        name: name.to_string(),
        website: url.to_string(),
        description: format!(
            "Automated analysis could not be parsed. Raw response excerpt: {}",
            raw_excerpt(raw)
        ),
        ..ToolProfile::default()
    }
}

/// Normalize a raw reply for the tool resolved as `name` / `url`.
pub fn normalize(raw: &str, name: &str, url: &str) -> Normalized {
    match parse_profile(strip_fences(raw), url) {
        Ok(profile) => Normalized {
            profile,
            fallback: false,
        },
        Err(rejection) => {
            tracing::warn!(tool = name, %rejection, "analysis reply rejected, using fallback");
            Normalized {
                profile: fallback_profile(raw, name, url),
                fallback: true,
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn raw_excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "(empty response)".to_string();
    }
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
