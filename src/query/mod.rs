//! Query construction: typed parameters rendered into one of two engine query templates.

pub mod template;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use template::Template;

pub const PLAIN_TEMPLATE_FILE: &str = "query.json";
pub const BIAS_TEMPLATE_FILE: &str = "query_location_bias.json";

const PLAIN_REQUIRED: [&str; 3] = ["query", "lang", "should_match"];
const BIAS_REQUIRED: [&str; 5] = ["query", "lang", "should_match", "lon", "lat"];
const KNOWN: [&str; 5] = BIAS_REQUIRED;

/// Template loading and validation failures. Fatal: nothing can be served without templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("cannot access query template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query template {template} uses unknown placeholder ${{{placeholder}}}")]
    UnknownPlaceholder {
        template: &'static str,
        placeholder: String,
    },

    #[error("query template {template} is missing placeholder ${{{placeholder}}}")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("query template {template} does not render to valid JSON: {source}")]
    InvalidJson {
        template: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// How many query terms a hit has to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShouldMatch {
    /// Every term.
    All,
    /// Any term.
    Any,
}

impl ShouldMatch {
    fn render(self) -> &'static str {
        match self {
            Self::All => "\"100%\"",
            Self::Any => "-1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationBias {
    pub lon: f64,
    pub lat: f64,
}

/// Values substituted into a query template.
#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    pub text: &'a str,
    pub lang: &'a str,
    pub should_match: ShouldMatch,
    pub bias: Option<LocationBias>,
}

impl QueryParams<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "query" => Some(escape_json(self.text)),
            "lang" => Some(self.lang.to_string()),
            "should_match" => Some(self.should_match.render().to_string()),
            "lon" => self.bias.map(|b| b.lon.to_string()),
            "lat" => self.bias.map(|b| b.lat.to_string()),
            _ => None,
        }
    }
}

/// Escapes text for embedding between the quotes of a JSON string literal.
fn escape_json(text: &str) -> String {
    let quoted = Value::from(text).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Renders engine queries from the plain and location-biased templates.
///
/// Templates are immutable after loading and shared by all requests.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    plain: Template,
    bias: Template,
}

impl QueryBuilder {
    /// Loads `query.json` and `query_location_bias.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let plain = read_template(&dir.join(PLAIN_TEMPLATE_FILE))?;
        let bias = read_template(&dir.join(BIAS_TEMPLATE_FILE))?;
        let builder = Self::from_sources(&plain, &bias)?;
        info!(dir = %dir.display(), "query templates loaded");
        Ok(builder)
    }

    pub fn from_sources(plain: &str, bias: &str) -> Result<Self, TemplateError> {
        let plain = Template::parse(plain);
        let bias = Template::parse(bias);
        check_template(&plain, PLAIN_TEMPLATE_FILE, &PLAIN_REQUIRED)?;
        check_template(&bias, BIAS_TEMPLATE_FILE, &BIAS_REQUIRED)?;

        let sample = QueryParams {
            text: "sample \"text\"",
            lang: "de",
            should_match: ShouldMatch::All,
            bias: Some(LocationBias {
                lon: 13.4,
                lat: 52.5,
            }),
        };
        for should_match in [ShouldMatch::All, ShouldMatch::Any] {
            let params = QueryParams {
                should_match,
                ..sample.clone()
            };
            check_json(&plain, PLAIN_TEMPLATE_FILE, &params)?;
            check_json(&bias, BIAS_TEMPLATE_FILE, &params)?;
        }

        Ok(Self { plain, bias })
    }

    /// The bias template is used iff both bias coordinates are present.
    pub fn render(&self, params: &QueryParams<'_>) -> String {
        let template = if params.bias.is_some() {
            &self.bias
        } else {
            &self.plain
        };
        let query = template.render(|name| params.lookup(name));
        debug!(
            biased = params.bias.is_some(),
            should_match = ?params.should_match,
            "query rendered"
        );
        query
    }
}

fn read_template(path: &Path) -> Result<String, TemplateError> {
    fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn check_template(
    template: &Template,
    name: &'static str,
    required: &[&'static str],
) -> Result<(), TemplateError> {
    let used = template.placeholders();
    if let Some(unknown) = used.iter().copied().find(|p| !KNOWN.contains(p)) {
        return Err(TemplateError::UnknownPlaceholder {
            template: name,
            placeholder: unknown.to_string(),
        });
    }
    if let Some(missing) = required.iter().copied().find(|p| !used.contains(p)) {
        return Err(TemplateError::MissingPlaceholder {
            template: name,
            placeholder: missing,
        });
    }
    Ok(())
}

fn check_json(
    template: &Template,
    name: &'static str,
    params: &QueryParams<'_>,
) -> Result<(), TemplateError> {
    let rendered = template.render(|p| params.lookup(p));
    serde_json::from_str::<Value>(&rendered)
        .map(|_| ())
        .map_err(|source| TemplateError::InvalidJson {
            template: name,
            source,
        })
}

#[cfg(test)]
pub(crate) fn shipped_templates() -> QueryBuilder {
    QueryBuilder::from_sources(
        include_str!("../../templates/query.json"),
        include_str!("../../templates/query_location_bias.json"),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(text: &str, should_match: ShouldMatch, bias: Option<LocationBias>) -> QueryParams<'_> {
        QueryParams {
            text,
            lang: "en",
            should_match,
            bias,
        }
    }

    fn parse(rendered: &str) -> Value {
        serde_json::from_str(rendered).unwrap()
    }

    #[test]
    fn strict_renders_quoted_percentage() {
        let q = shipped_templates().render(&params("berlin", ShouldMatch::All, None));
        assert!(q.contains(r#""minimum_should_match": "100%""#), "got: {q}");
        assert!(q.contains("name.en"));
        parse(&q);
    }

    #[test]
    fn loose_renders_any_term_sentinel() {
        let q = shipped_templates().render(&params("berlin", ShouldMatch::Any, None));
        assert!(q.contains(r#""minimum_should_match": -1"#), "got: {q}");
        parse(&q);
    }

    #[test]
    fn bias_selects_location_template() {
        let bias = LocationBias {
            lon: 13.5,
            lat: 52.25,
        };
        let q = shipped_templates().render(&params("berlin", ShouldMatch::All, Some(bias)));
        let value = parse(&q);
        assert!(value.get("function_score").is_some(), "got: {q}");
        assert!(q.contains("13.5") && q.contains("52.25"));
    }

    #[test]
    fn plain_template_without_bias() {
        let q = shipped_templates().render(&params("berlin", ShouldMatch::All, None));
        assert!(parse(&q).get("function_score").is_none());
    }

    #[test]
    fn query_text_is_escaped() {
        let text = "Ber\"lin\\ {x}\n";
        let q = shipped_templates().render(&params(text, ShouldMatch::All, None));
        let value = parse(&q);
        let found = value.to_string().contains(r#"Ber\"lin\\ {x}\n"#);
        assert!(found, "escaped text not round-tripped: {q}");
    }

    #[test]
    fn placeholder_syntax_in_query_is_not_expanded() {
        let q = shipped_templates().render(&params("${lang}", ShouldMatch::All, None));
        assert!(q.contains("${lang}"));
        parse(&q);
    }

    #[test]
    fn unknown_placeholder_rejected() {
        let err = QueryBuilder::from_sources(
            r#"{"q": "${query}", "l": "${lang}", "m": ${should_match}, "x": ${radius}}"#,
            include_str!("../../templates/query_location_bias.json"),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder { .. }));
        assert!(err.to_string().contains("${radius}"), "got: {err}");
    }

    #[test]
    fn bias_template_must_reference_coordinates() {
        let err = QueryBuilder::from_sources(
            include_str!("../../templates/query.json"),
            include_str!("../../templates/query.json"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingPlaceholder {
                placeholder: "lon",
                ..
            }
        ));
    }

    #[test]
    fn template_must_render_to_json() {
        let err = QueryBuilder::from_sources(
            r#"{"q": "${query}", "l": "${lang}", "m": ${should_match}"#,
            include_str!("../../templates/query_location_bias.json"),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidJson { .. }));
    }

    #[test]
    fn load_reads_template_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLAIN_TEMPLATE_FILE),
            include_str!("../../templates/query.json"),
        )
        .unwrap();
        fs::write(
            dir.path().join(BIAS_TEMPLATE_FILE),
            include_str!("../../templates/query_location_bias.json"),
        )
        .unwrap();

        let builder = QueryBuilder::load(dir.path()).unwrap();
        let q = builder.render(&params("x", ShouldMatch::Any, None));
        parse(&q);
    }

    #[test]
    fn load_fails_when_template_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLAIN_TEMPLATE_FILE),
            include_str!("../../templates/query.json"),
        )
        .unwrap();

        let err = QueryBuilder::load(dir.path()).unwrap_err();
        match err {
            TemplateError::Read { path, .. } => assert!(path.ends_with(BIAS_TEMPLATE_FILE)),
            other => panic!("expected Read error, got: {other:?}"),
        }
    }
}
