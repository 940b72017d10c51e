//! Version constraint expressions
//!
//! Constraints are written the way component publishers tag releases:
//!
//! - `||` separates alternatives; any alternative may match
//! - within an alternative, comparators separated by `,` or spaces must all match
//! - `A - B` is an inclusive range (`>=A, <=B`)
//! - operators: `=`, `!=`, `>`, `<`, `>=`, `=>`, `<=`, `=<`, `~`, `~>`, `^`
//! - `x`, `X` and `*` are wildcards; a leading `v` is ignored
//! - a bare version is an exact match, so `v0.1.x` matches every `0.1` patch
//!
//! Each comparator is lowered onto a [`semver::VersionReq`].

use std::fmt;

use semver::{Version, VersionReq};

use crate::error::{Result, component};

/// Operators, longest first so `>=` wins over `>`
const OPERATORS: [&str; 11] = ["!=", ">=", "=>", "<=", "=<", "~>", ">", "<", "=", "~", "^"];

#[derive(Debug, Clone)]
enum Term {
    Require(VersionReq),
    Exclude(VersionReq),
}

impl Term {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Term::Require(req) => req.matches(version),
            Term::Exclude(req) => !req.matches(version),
        }
    }
}

/// Parsed constraint expression
#[derive(Debug, Clone)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Vec<Term>>,
}

impl Constraint {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(component::invalid_constraint(input, "empty constraint"));
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(component::invalid_constraint(
                    input,
                    "empty alternative around '||'",
                ));
            }
            alternatives.push(parse_alternative(input, alternative)?);
        }

        Ok(Self {
            raw: input.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|terms| terms.iter().all(|term| term.matches(version)))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_alternative(input: &str, alternative: &str) -> Result<Vec<Term>> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut terms = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        if tokens.get(i + 1) == Some(&"-") {
            let high = tokens.get(i + 2).ok_or_else(|| {
                component::invalid_constraint(input, format!("incomplete range '{token} -'"))
            })?;
            terms.push(parse_term(input, ">=", token)?);
            terms.push(parse_term(input, "<=", high)?);
            i += 3;
            continue;
        }

        let (op, rest) = split_operator(token);
        if rest.is_empty() {
            let version = tokens.get(i + 1).ok_or_else(|| {
                component::invalid_constraint(input, format!("operator '{op}' without version"))
            })?;
            terms.push(parse_term(input, op, version)?);
            i += 2;
        } else {
            terms.push(parse_term(input, op, rest)?);
            i += 1;
        }
    }
    Ok(terms)
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn parse_term(input: &str, op: &str, version: &str) -> Result<Term> {
    let op = match op {
        "" | "=" => "=",
        "=>" => ">=",
        "=<" => "<=",
        "~>" => "~",
        other => other,
    };

    let version = version.strip_prefix(['v', 'V']).unwrap_or(version);
    if version.is_empty() {
        return Err(component::invalid_constraint(input, "missing version"));
    }
    let suffix_at = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(suffix_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return Err(component::invalid_constraint(
            input,
            format!("'{version}' has more than three components"),
        ));
    }

    let mut kept = Vec::new();
    let mut wildcard = false;
    for part in &parts {
        let is_wildcard = matches!(*part, "x" | "X" | "*");
        if is_wildcard {
            wildcard = true;
        } else if wildcard {
            return Err(component::invalid_constraint(
                input,
                format!("'{version}' has a number after a wildcard"),
            ));
        } else {
            kept.push(*part);
        }
    }
    if wildcard && !suffix.is_empty() {
        return Err(component::invalid_constraint(
            input,
            format!("'{version}' mixes a wildcard with a pre-release or build"),
        ));
    }

    if kept.is_empty() {
        return match op {
            "=" | ">=" | "<=" | "~" | "^" => Ok(Term::Require(VersionReq::STAR)),
            _ => Err(component::invalid_constraint(
                input,
                format!("'{op}' cannot be combined with a bare wildcard"),
            )),
        };
    }

    let (semver_op, exclude) = if op == "!=" { ("=", true) } else { (op, false) };
    let requirement = format!("{semver_op}{}{suffix}", kept.join("."));
    let req = VersionReq::parse(&requirement)
        .map_err(|e| component::invalid_constraint(input, e.to_string()))?;

    Ok(if exclude {
        Term::Exclude(req)
    } else {
        Term::Require(req)
    })
}

/// Parse a listed version leniently: optional `v` prefix, missing minor/patch read as zero
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let suffix_at = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(suffix_at);

    let padded = match core.split('.').count() {
        _ if core.is_empty() => {
            return Err(component::malformed_version(raw, "empty version"));
        }
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => stripped.to_string(),
    };

    Version::parse(&padded).map_err(|e| component::malformed_version(raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    fn allows(constraint: &str, version: &str) -> bool {
        Constraint::parse(constraint).unwrap().matches(&v(version))
    }

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("V2"), Version::new(2, 0, 0));
        assert_eq!(v("v1.2-rc.1").pre.as_str(), "rc.1");
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        for raw in ["", "v", "latest", "1.2.3.4", "1.x"] {
            assert!(
                matches!(
                    parse_version(raw),
                    Err(BootstrapError::MalformedVersion { .. })
                ),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_bare_version_is_exact() {
        assert!(allows("1.2.3", "1.2.3"));
        assert!(!allows("1.2.3", "1.2.4"));
        assert!(allows("v0.1.x", "v0.1.7"));
        assert!(!allows("v0.1.x", "v0.2.0"));
        assert!(allows("1.2", "1.2.9"));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(allows(">=2.0.0", "2.1.0"));
        assert!(!allows(">2.0.0", "2.0.0"));
        assert!(allows("=>2.0.0", "2.0.0"));
        assert!(allows("<=1.4", "1.4.9"));
        assert!(allows("=<1.4", "1.4.0"));
        assert!(!allows("<1.4", "1.4.0"));
        assert!(allows("!=1.2.3", "1.2.4"));
        assert!(!allows("!=1.2.3", "1.2.3"));
    }

    #[test]
    fn test_tilde_and_caret() {
        assert!(allows("~1.2.3", "1.2.9"));
        assert!(!allows("~1.2.3", "1.3.0"));
        assert!(allows("~>1.2", "1.2.5"));
        assert!(allows("^1.2.3", "1.9.0"));
        assert!(!allows("^1.2.3", "2.0.0"));
        assert!(!allows("^0.1.2", "0.2.0"));
    }

    #[test]
    fn test_and_or_and_ranges() {
        assert!(allows(">= 1.2, < 2.0", "1.5.0"));
        assert!(allows(">=1.2 <2.0", "1.9.9"));
        assert!(!allows(">=1.2 <2.0", "2.0.0"));
        assert!(allows("<1.0 || >=3.0", "3.1.0"));
        assert!(!allows("<1.0 || >=3.0", "2.0.0"));
        assert!(allows("1.2 - 1.4.5", "1.4.5"));
        assert!(!allows("1.2 - 1.4.5", "1.4.6"));
        assert!(allows("*", "7.0.0"));
    }

    #[test]
    fn test_invalid_constraints() {
        for raw in ["", "||", ">=", "1.2 -", "1.x.3", ">x", "abc", "1.2.3.4"] {
            assert!(
                matches!(
                    Constraint::parse(raw),
                    Err(BootstrapError::InvalidConstraint { .. })
                ),
                "{raw:?} should be invalid"
            );
        }
    }
}
