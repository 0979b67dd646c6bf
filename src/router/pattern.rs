use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use percent_encoding::percent_decode_str;

use crate::error::RouteError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    Wildcard,
}

/// A route path such as `/users/:id` or `/static/*`.
///
/// Empty segments are ignored on both sides, so `/users/` and `/users` are
/// the same pattern and match the same paths. A trailing `*` captures the
/// rest of the path (possibly empty) under the parameter name `*`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if !raw.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash(raw.to_string()));
        }

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(RouteError::MisplacedWildcard(raw.to_string()));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RouteError::EmptyParamName(raw.to_string()));
                }
                if segments.contains(&Segment::Param(name.to_string())) {
                    return Err(RouteError::DuplicateParamName {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                Segment::Param(name.to_string())
            } else {
                Segment::Static(part.to_string())
            };
            segments.push(segment);
        }

        Ok(PathPattern {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern has no parameters or wildcard.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Static(_)))
    }

    /// Match `path` and return the captured, percent-decoded parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut parts = path.split('/').filter(|s| !s.is_empty());
        let mut params = HashMap::new();

        for segment in &self.segments {
            match segment {
                Segment::Static(expected) => {
                    if parts.next()? != expected.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    params.insert(name.clone(), decode(value));
                }
                Segment::Wildcard => {
                    let rest = parts.by_ref().join("/");
                    params.insert("*".to_string(), decode(&rest));
                    return Some(params);
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// Two patterns are the same route when they match the same paths with the
/// same parameter names, regardless of slashes.
impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for PathPattern {}

impl FromStr for PathPattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
