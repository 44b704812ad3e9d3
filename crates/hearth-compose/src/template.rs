//! Placeholder templates built on `nom`.
//!
//! A template is a string that may defer parts of its value to the
//! environment: `${NAME}` requires `NAME` to be defined in some layer,
//! `${NAME:-fallback}` falls back to the literal `fallback`, and `$$` is a
//! literal dollar sign. A `$` followed by anything else is kept verbatim.

use std::fmt;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{char, satisfy},
    combinator::{cut, map, opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded},
};

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as-is.
    Literal(String),
    /// A deferred value.
    Placeholder {
        /// Variable name to look up.
        key: String,
        /// Literal fallback used when no layer defines the key.
        default: Option<String>,
    },
}

/// A parsed string value that may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn var_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// `${NAME}` or `${NAME:-default}`. Once `${` is seen the rest is mandatory.
fn placeholder(input: &str) -> IResult<&str, Segment> {
    let (input, _) = tag("${").parse(input)?;
    let (input, key) = cut(var_name).parse(input)?;
    let (input, default) = opt(preceded(tag(":-"), take_while(|c: char| c != '}'))).parse(input)?;
    let (input, _) = cut(char('}')).parse(input)?;
    Ok((
        input,
        Segment::Placeholder {
            key: key.to_string(),
            default: default.map(str::to_string),
        },
    ))
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        value(Segment::Literal("$".into()), tag("$$")),
        placeholder,
        map(is_not("$"), |s: &str| Segment::Literal(s.to_string())),
        value(Segment::Literal("$".into()), char('$')),
    ))
    .parse(input)
}

/// Joins adjacent literals so `a$$b` becomes a single `a$b` segment.
fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match (out.last_mut(), seg) {
            (Some(Segment::Literal(prev)), Segment::Literal(next)) => prev.push_str(&next),
            (_, seg) => out.push(seg),
        }
    }
    out
}

impl Template {
    /// Parses a template from its source text.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic naming the byte offset of an unterminated or
    /// otherwise invalid `${...}` placeholder.
    pub fn parse(source: &str) -> Result<Self, String> {
        match many0(segment).parse(source) {
            Ok(("", segments)) => Ok(Self {
                source: source.to_string(),
                segments: coalesce(segments),
            }),
            Ok((rest, _)) => Err(format!(
                "unexpected input at byte {}",
                source.len() - rest.len()
            )),
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                let failed_at = source.len() - e.input.len();
                let start = source[..failed_at].rfind("${").unwrap_or(failed_at);
                Err(format!(
                    "invalid placeholder at byte {start} \
                     (expected `${{NAME}}` or `${{NAME:-default}}`)"
                ))
            }
            Err(nom::Err::Incomplete(_)) => Err("incomplete placeholder".into()),
        }
    }

    /// Creates a template consisting of a single required placeholder.
    #[must_use]
    pub fn placeholder(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            source: format!("${{{key}}}"),
            segments: vec![Segment::Placeholder { key, default: None }],
        }
    }

    /// Returns the original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the variable names referenced by this template, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { key, .. } => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns `true` if the template contains no placeholders.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.keys().next().is_none()
    }

    /// Expands every placeholder using `lookup`.
    ///
    /// # Errors
    ///
    /// Returns the name of the first placeholder that has neither a
    /// value from `lookup` nor a default.
    pub fn render<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String, String> {
        let mut out = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { key, default } => {
                    match lookup(key.as_str()).or(default.as_deref()) {
                        Some(v) => out.push_str(v),
                        None => return Err(key.clone()),
                    }
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(map: &HashMap<&str, &'static str>) -> impl Fn(&str) -> Option<&'static str> {
        move |k| map.get(k).copied()
    }

    #[test]
    fn plain_text_is_literal() {
        let t = Template::parse("jellyfin/jellyfin:10.9").expect("parse");
        assert!(t.is_literal());
        assert_eq!(t.render(|_| None).expect("render"), "jellyfin/jellyfin:10.9");
    }

    #[test]
    fn placeholder_with_default() {
        let t = Template::parse("${PORT:-8888}:8096").expect("parse");
        assert_eq!(
            t.segments(),
            &[
                Segment::Placeholder {
                    key: "PORT".into(),
                    default: Some("8888".into())
                },
                Segment::Literal(":8096".into()),
            ]
        );
        assert_eq!(t.render(|_| None).expect("render"), "8888:8096");
    }

    #[test]
    fn defined_value_wins_over_default() {
        let vars = HashMap::from([("PORT", "8889")]);
        let t = Template::parse("${PORT:-8888}").expect("parse");
        assert_eq!(t.render(lookup_in(&vars)).expect("render"), "8889");
    }

    #[test]
    fn empty_default_is_allowed() {
        let t = Template::parse("x${SUFFIX:-}y").expect("parse");
        assert_eq!(t.render(|_| None).expect("render"), "xy");
    }

    #[test]
    fn missing_required_placeholder_names_key() {
        let t = Template::parse("${TZ}").expect("parse");
        assert_eq!(t.render(|_| None).unwrap_err(), "TZ");
    }

    #[test]
    fn double_dollar_escapes() {
        let t = Template::parse("cost: $$5 and $HOME").expect("parse");
        assert!(t.is_literal());
        assert_eq!(t.render(|_| None).expect("render"), "cost: $5 and $HOME");
    }

    #[test]
    fn multiple_placeholders_listed_in_order() {
        let t = Template::parse("${A}/${B:-b}/${A}").expect("parse");
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["A", "B", "A"]);
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        let err = Template::parse("abc${PORT").unwrap_err();
        assert!(err.contains("byte 3"), "got: {err}");
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(Template::parse("${1PORT}").is_err());
        assert!(Template::parse("${}").is_err());
    }

    #[test]
    fn placeholder_constructor_requires_key() {
        let t = Template::placeholder("TZ");
        assert_eq!(t.source(), "${TZ}");
        assert_eq!(t.render(|_| Some("Europe/Paris")).expect("render"), "Europe/Paris");
    }
}
