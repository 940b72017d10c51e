//! Version resolution for bootstrap components
//!
//! This module handles:
//! - Parsing version constraints ([`constraint`])
//! - Selecting the version of a component to install
//! - Fetching the selected component version
//!
//! ## Selection policy
//!
//! Every listed version is parsed first; one unparsable entry fails the whole
//! resolution. The result is the **first** version, in the repository's listing
//! order, that satisfies the constraint. There is no highest-wins tie-break.

pub mod constraint;

use semver::Version;
use tracing::{debug, info};

use crate::component::{ComponentRepository, ComponentVersion};
use crate::error::{Result, component};

pub use constraint::{Constraint, parse_version};

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    pub name: String,
    /// Version string exactly as listed by the repository
    pub version: String,
    pub semver: Version,
    pub component_version: ComponentVersion,
}

/// Return the first of `versions` satisfying `constraint`
///
/// Fails with `MalformedVersion` if any entry does not parse, even one listed
/// after the match.
pub fn select_first<'a>(
    versions: &'a [String],
    constraint: &Constraint,
) -> Result<Option<(&'a str, Version)>> {
    let parsed = versions
        .iter()
        .map(|raw| parse_version(raw).map(|v| (raw.as_str(), v)))
        .collect::<Result<Vec<_>>>()?;

    Ok(parsed.into_iter().find(|(_, v)| constraint.matches(v)))
}

/// Resolve `constraint` for component `name` and fetch the selected version
pub fn resolve(
    repository: &dyn ComponentRepository,
    name: &str,
    constraint: &str,
) -> Result<ResolvedComponent> {
    let handle = repository.lookup_component(name)?;
    let versions = handle.list_versions()?;
    let parsed_constraint = Constraint::parse(constraint)?;

    debug!(component = name, %constraint, candidates = versions.len(), "resolving version");

    let (version, semver) = select_first(&versions, &parsed_constraint)?
        .map(|(raw, v)| (raw.to_string(), v))
        .ok_or_else(|| component::version_not_found(name, constraint))?;

    let component_version = handle.lookup_version(&version)?;
    info!(component = name, %constraint, %version, "resolved component version");

    Ok(ResolvedComponent {
        name: name.to_string(),
        version,
        semver,
        component_version,
    })
}
