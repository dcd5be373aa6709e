//! Formatted name resolution
//!
//! A [`Template`] computes a child's construction suffix from the state of
//! the device that owns it. Evaluation is deferred until the child is first
//! constructed, so it sees fields the owner assigned during its own
//! construction.

use devtree_signal::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Owner state visible to templates
///
/// Implemented by devices; a template only ever reads through this view.
pub trait Owner {
    /// Name of the owner's device type
    fn type_name(&self) -> &str;

    /// Owner's prefix
    fn prefix(&self) -> &str;

    /// Owner's name
    fn name(&self) -> &str;

    /// Instance field, `None` if the owner has no such field
    fn field(&self, key: &str) -> Option<&Value>;
}

type Resolver = dyn Fn(&dyn Owner) -> Result<String, TemplateError> + Send + Sync;

/// Deferred suffix computation
///
/// # Patterns
/// `{prefix}` and `{name}` expand to the owner's prefix and name, any other
/// `{key}` to the owner's field `key`. `{{` and `}}` produce literal braces.
///
/// # Example
/// ```
/// use devtree_component::Template;
///
/// let template = Template::new("{prefix}{ch}");
/// assert!(template.check().is_ok());
/// assert_eq!(template.placeholders().unwrap(), vec!["prefix", "ch"]);
/// ```
#[derive(Clone)]
pub struct Template {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Pattern(String),
    Closure(Arc<Resolver>),
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(String),
    Placeholder(&'a str),
}

impl Template {
    /// Template from a pattern string
    ///
    /// Syntax is checked when the owning device type is registered.
    #[inline]
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            repr: Repr::Pattern(pattern.into()),
        }
    }

    /// Template computed by a closure over the owner
    #[must_use]
    pub fn from_fn<F>(resolve: F) -> Self
    where
        F: Fn(&dyn Owner) -> Result<String, TemplateError> + Send + Sync + 'static,
    {
        Self {
            repr: Repr::Closure(Arc::new(resolve)),
        }
    }

    /// Pattern source, `None` for closures
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        match &self.repr {
            Repr::Pattern(p) => Some(p),
            Repr::Closure(_) => None,
        }
    }

    /// Verify pattern syntax without evaluating anything
    ///
    /// # Errors
    /// Returns error for unbalanced braces or empty/invalid placeholders
    pub fn check(&self) -> Result<(), TemplateError> {
        match &self.repr {
            Repr::Pattern(p) => parse(p).map(|_| ()),
            Repr::Closure(_) => Ok(()),
        }
    }

    /// Placeholder names in order of appearance (closures have none)
    ///
    /// # Errors
    /// Returns error if the pattern is malformed
    pub fn placeholders(&self) -> Result<Vec<&str>, TemplateError> {
        match &self.repr {
            Repr::Pattern(p) => Ok(parse(p)?
                .into_iter()
                .filter_map(|seg| match seg {
                    Segment::Placeholder(key) => Some(key),
                    Segment::Literal(_) => None,
                })
                .collect()),
            Repr::Closure(_) => Ok(Vec::new()),
        }
    }

    /// Evaluate against the owner's current state
    ///
    /// # Errors
    /// Returns [`TemplateError::UnknownAttribute`] if a placeholder names a
    /// field the owner does not have
    pub fn resolve(&self, owner: &dyn Owner) -> Result<String, TemplateError> {
        match &self.repr {
            Repr::Closure(f) => f(owner),
            Repr::Pattern(p) => {
                let mut out = String::with_capacity(p.len());
                for seg in parse(p)? {
                    match seg {
                        Segment::Literal(text) => out.push_str(&text),
                        Segment::Placeholder(key) => out.push_str(&lookup(owner, key)?),
                    }
                }
                Ok(out)
            }
        }
    }
}

fn lookup(owner: &dyn Owner, key: &str) -> Result<String, TemplateError> {
    match key {
        "prefix" => Ok(owner.prefix().to_string()),
        "name" => Ok(owner.name().to_string()),
        _ => match owner.field(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(TemplateError::UnknownAttribute {
                owner: owner.type_name().to_string(),
                attr: key.to_string(),
            }),
        },
    }
}

fn parse(pattern: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let malformed = |reason: &str| TemplateError::Malformed {
        template: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(pos) = rest.find(['{', '}']) {
        literal.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        if after.as_bytes().first() == Some(&brace) {
            // Doubled brace is an escape
            literal.push(char::from(brace));
            rest = &after[1..];
            continue;
        }
        if brace == b'}' {
            return Err(malformed("unmatched '}'"));
        }

        let close = after
            .find(['{', '}'])
            .filter(|&i| after.as_bytes()[i] == b'}')
            .ok_or_else(|| malformed("unclosed '{'"))?;
        let key = &after[..close];
        if key.is_empty() {
            return Err(malformed("empty placeholder"));
        }
        if !crate::path::is_identifier(key) {
            return Err(malformed(&format!("invalid placeholder '{key}'")));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(key));
        rest = &after[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl Debug for Template {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Pattern(p) => f.debug_tuple("Template").field(p).finish(),
            Repr::Closure(_) => f.write_str("Template(<fn>)"),
        }
    }
}

/// Template errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Pattern syntax error
    #[error("malformed template '{template}': {reason}")]
    Malformed { template: String, reason: String },

    /// Placeholder names a field the owner lacks
    #[error("'{owner}' has no attribute '{attr}'")]
    UnknownAttribute { owner: String, attr: String },

    /// Closure-based template failed
    #[error("template evaluation failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    struct TestOwner {
        fields: IndexMap<String, Value>,
    }

    impl Owner for TestOwner {
        fn type_name(&self) -> &str {
            "TestDevice"
        }

        fn prefix(&self) -> &str {
            "XF:31ID:"
        }

        fn name(&self) -> &str {
            "dev"
        }

        fn field(&self, key: &str) -> Option<&Value> {
            self.fields.get(key)
        }
    }

    fn owner() -> TestOwner {
        let mut fields = IndexMap::new();
        fields.insert("ch".to_string(), json!("_test_"));
        fields.insert("index".to_string(), json!(3));
        TestOwner { fields }
    }

    #[test]
    fn resolves_prefix_and_field() {
        let template = Template::new("{prefix}{ch}");
        assert_eq!(template.resolve(&owner()).unwrap(), "XF:31ID:_test_");
    }

    #[test]
    fn resolves_non_string_field() {
        let template = Template::new("{name}:Ch{index}");
        assert_eq!(template.resolve(&owner()).unwrap(), "dev:Ch3");
    }

    #[test]
    fn escaped_braces() {
        let template = Template::new("{prefix}{{Dev}}{ch}");
        assert_eq!(template.resolve(&owner()).unwrap(), "XF:31ID:{Dev}_test_");
    }

    #[test]
    fn unknown_field_fails_at_resolution() {
        let template = Template::new("{prefix}{missing}");
        assert!(template.check().is_ok());
        assert_eq!(
            template.resolve(&owner()),
            Err(TemplateError::UnknownAttribute {
                owner: "TestDevice".into(),
                attr: "missing".into(),
            })
        );
    }

    #[test]
    fn malformed_patterns() {
        for pattern in ["{prefix", "prefix}", "{}", "{a-b}", "{a{b}"] {
            assert!(
                matches!(Template::new(pattern).check(), Err(TemplateError::Malformed { .. })),
                "{pattern} should be rejected"
            );
        }
    }

    #[test]
    fn placeholders_in_order() {
        let template = Template::new("{prefix}:{ch}:{prefix}");
        assert_eq!(template.placeholders().unwrap(), vec!["prefix", "ch", "prefix"]);
    }

    #[test]
    fn closure_template() {
        let template = Template::from_fn(|owner| {
            let ch = owner
                .field("ch")
                .and_then(Value::as_str)
                .ok_or_else(|| TemplateError::Failed("no channel".into()))?;
            Ok(format!("{}{}", owner.prefix(), ch.to_uppercase()))
        });

        assert!(template.pattern().is_none());
        assert_eq!(template.resolve(&owner()).unwrap(), "XF:31ID:_TEST_");
    }

    #[test]
    fn literal_only_pattern() {
        let template = Template::new("plain");
        assert_eq!(template.resolve(&owner()).unwrap(), "plain");
        assert!(template.placeholders().unwrap().is_empty());
    }
}
