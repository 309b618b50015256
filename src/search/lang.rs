/// A request language, checked against the configured supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language(String);

impl Language {
    pub fn parse(tag: &str, supported: &[String]) -> Option<Self> {
        supported
            .iter()
            .any(|s| s == tag)
            .then(|| Self(tag.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn new(tag: &str) -> Self {
        Self(tag.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins street and house number in local reading order, skipping absent parts.
    /// German puts the street first; everything else leads with the number.
    pub fn street_line(&self, street: Option<&str>, housenumber: Option<&str>) -> String {
        let parts = if self.0 == "de" {
            [street, housenumber]
        } else {
            [housenumber, street]
        };
        parts.into_iter().flatten().collect::<Vec<_>>().join(" ")
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
