use tracing::debug;

use super::lang::Language;
use crate::config::Config;
use crate::query::LocationBias;

/// Raw request parameters as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Search text (required)
    pub q: Option<String>,
    /// Result language, must be supported (default: configured default language)
    pub lang: Option<String>,
    /// Longitude of the location bias; ignored unless `lat` also parses
    pub lon: Option<String>,
    /// Latitude of the location bias; ignored unless `lon` also parses
    pub lat: Option<String>,
    /// Spatial reference id echoed back with the results (default: 4326)
    pub srid: Option<String>,
    /// Maximum number of results (default: 15, capped at the configured maximum)
    pub limit: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing search term 'q': /?q=berlin")]
    MissingQuery,

    #[error(
        "language {lang} is not supported, supported languages are: {}",
        supported.join(", ")
    )]
    UnsupportedLanguage {
        lang: String,
        supported: Vec<String>,
    },
}

/// A validated search request. Numeric fields are already normalized.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub text: String,
    pub language: Language,
    pub bias: Option<LocationBias>,
    pub srid: i32,
    pub limit: usize,
}

impl SearchParams {
    /// Text and language are validated; malformed numbers fall back to defaults.
    pub fn into_request(self, config: &Config) -> Result<SearchRequest, ValidationError> {
        let text = self
            .q
            .filter(|q| !q.trim().is_empty())
            .ok_or(ValidationError::MissingQuery)?;

        let tag = self
            .lang
            .unwrap_or_else(|| config.default_language.clone());
        let language = Language::parse(&tag, &config.supported_languages).ok_or_else(|| {
            ValidationError::UnsupportedLanguage {
                lang: tag.clone(),
                supported: config.supported_languages.clone(),
            }
        })?;

        let bias = match (parse_degrees(self.lon.as_deref()), parse_degrees(self.lat.as_deref())) {
            (Some(lon), Some(lat)) => Some(LocationBias { lon, lat }),
            _ => None,
        };

        let srid =
            lenient(self.srid.as_deref(), "srid", |_: &i32| true).unwrap_or(config.default_srid);

        let limit = lenient(self.limit.as_deref(), "limit", |v: &usize| *v > 0)
            .unwrap_or(config.default_limit)
            .min(config.max_limit);

        Ok(SearchRequest {
            text,
            language,
            bias,
            srid,
            limit,
        })
    }
}

fn parse_degrees(raw: Option<&str>) -> Option<f64> {
    lenient(raw, "coordinate", |v: &f64| v.is_finite())
}

/// Parses an optional value, treating anything unparsable or rejected by `accept` as absent.
fn lenient<T: std::str::FromStr>(
    raw: Option<&str>,
    field: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Option<T> {
    let raw = raw?.trim();
    match raw.parse::<T>() {
        Ok(value) if accept(&value) => Some(value),
        _ => {
            debug!(field, value = raw, "ignoring malformed parameter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: &str) -> SearchParams {
        SearchParams {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_applied() {
        let req = params("berlin").into_request(&Config::default()).unwrap();
        assert_eq!(req.text, "berlin");
        assert_eq!(req.language.as_str(), "de");
        assert!(req.bias.is_none());
        assert_eq!(req.srid, 4326);
        assert_eq!(req.limit, 15);
    }

    #[test]
    fn missing_or_blank_query_rejected() {
        let config = Config::default();
        assert_eq!(
            SearchParams::default().into_request(&config).unwrap_err(),
            ValidationError::MissingQuery
        );
        assert_eq!(
            params("   ").into_request(&config).unwrap_err(),
            ValidationError::MissingQuery
        );
    }

    #[test]
    fn unsupported_language_rejected_with_supported_list() {
        let err = SearchParams {
            lang: Some("fr".into()),
            ..params("paris")
        }
        .into_request(&Config::default())
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "language fr is not supported, supported languages are: de, en"
        );
    }

    #[test]
    fn bias_requires_both_coordinates() {
        let config = Config::default();
        let both = SearchParams {
            lon: Some("13.4".into()),
            lat: Some("52.5".into()),
            ..params("x")
        }
        .into_request(&config)
        .unwrap();
        assert_eq!(both.bias, Some(LocationBias { lon: 13.4, lat: 52.5 }));

        let lon_only = SearchParams {
            lon: Some("13.4".into()),
            ..params("x")
        }
        .into_request(&config)
        .unwrap();
        assert!(lon_only.bias.is_none());
    }

    #[test]
    fn malformed_bias_is_treated_as_absent() {
        for (lon, lat) in [("abc", "52.5"), ("13.4", ""), ("NaN", "52.5"), ("13.4", "inf")] {
            let req = SearchParams {
                lon: Some(lon.into()),
                lat: Some(lat.into()),
                ..params("x")
            }
            .into_request(&Config::default())
            .unwrap();
            assert!(req.bias.is_none(), "accepted lon={lon} lat={lat}");
        }
    }

    #[test]
    fn negative_coordinates_accepted() {
        let req = SearchParams {
            lon: Some("-71.1".into()),
            lat: Some("-42.3".into()),
            ..params("x")
        }
        .into_request(&Config::default())
        .unwrap();
        assert_eq!(req.bias, Some(LocationBias { lon: -71.1, lat: -42.3 }));
    }

    #[test]
    fn srid_parse_failure_defaults() {
        let config = Config::default();
        let custom = SearchParams {
            srid: Some("3857".into()),
            ..params("x")
        }
        .into_request(&config)
        .unwrap();
        assert_eq!(custom.srid, 3857);

        let bad = SearchParams {
            srid: Some("web-mercator".into()),
            ..params("x")
        }
        .into_request(&config)
        .unwrap();
        assert_eq!(bad.srid, 4326);
    }

    #[test]
    fn limit_is_clamped_and_defaulted() {
        let config = Config::default();
        let limit = |raw: &str| {
            SearchParams {
                limit: Some(raw.into()),
                ..params("x")
            }
            .into_request(&config)
            .unwrap()
            .limit
        };
        assert_eq!(limit("5"), 5);
        assert_eq!(limit("50"), 50);
        assert_eq!(limit("500"), 50);
        assert_eq!(limit("0"), 15);
        assert_eq!(limit("-3"), 15);
        assert_eq!(limit("ten"), 15);
    }
}
