//! # Pattern Compiler
//!
//! Turns a URL template such as `/shop/items/<int:id>/<slug>` into an
//! anchored regular expression plus the ordered list of placeholders it
//! captures. Literal text is escaped, so `.` or `+` in a template match
//! themselves.

use crate::error::{Error, Result};
use crate::types::ParamType;
use regex::Regex;

/// One named placeholder in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Placeholder name, unique within its template
    pub name: String,
    /// Declared kind (`String` when untyped)
    pub kind: ParamType,
}

/// A compiled URL template
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
    placeholders: Vec<Placeholder>,
}

impl CompiledPattern {
    /// The template this pattern was compiled from
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholders in template order
    #[must_use]
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Declared kind of a placeholder
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ParamType> {
        self.placeholders
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.kind)
    }

    /// Whether the whole candidate matches
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Raw captured segments, in placeholder order
    ///
    /// Returns `None` when the candidate does not match.
    #[must_use]
    pub fn captures<'c>(&self, candidate: &'c str) -> Option<Vec<(&Placeholder, &'c str)>> {
        let caps = self.regex.captures(candidate)?;
        Some(
            self.placeholders
                .iter()
                .filter_map(|p| caps.name(&p.name).map(|m| (p, m.as_str())))
                .collect(),
        )
    }
}

/// Compile a URL template
///
/// # Errors
///
/// - `Error::UnsupportedPlaceholderKind` for a kind outside `int`, `float`, `bool`
/// - `Error::InvalidRoutePattern` for an unterminated `<`, an empty or
///   non-identifier name, or a name used twice
pub fn compile(template: &str) -> Result<CompiledPattern> {
    let invalid = |reason: String| Error::InvalidRoutePattern {
        pattern: template.to_string(),
        reason,
    };

    let mut source = String::with_capacity(template.len() + 16);
    source.push('^');
    let mut placeholders: Vec<Placeholder> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('<') {
        source.push_str(&regex::escape(&rest[..open]));

        let after = &rest[open + 1..];
        let close = after
            .find('>')
            .ok_or_else(|| invalid("unterminated placeholder".to_string()))?;
        let token = &after[..close];

        let (kind, name) = match token.split_once(':') {
            Some((spec, name)) => {
                let kind = ParamType::from_specifier(spec).ok_or_else(|| {
                    Error::UnsupportedPlaceholderKind {
                        pattern: template.to_string(),
                        kind: spec.to_string(),
                    }
                })?;
                (kind, name)
            }
            None => (ParamType::String, token),
        };

        if !is_identifier(name) {
            return Err(invalid(format!("invalid placeholder name '{name}'")));
        }
        if placeholders.iter().any(|p| p.name == name) {
            return Err(invalid(format!("duplicate placeholder '{name}'")));
        }

        source.push_str("(?P<");
        source.push_str(name);
        source.push('>');
        source.push_str(kind.regex_fragment());
        source.push(')');

        placeholders.push(Placeholder {
            name: name.to_string(),
            kind,
        });
        rest = &after[close + 1..];
    }

    source.push_str(&regex::escape(rest));
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;

    Ok(CompiledPattern {
        template: template.to_string(),
        regex,
        placeholders,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
