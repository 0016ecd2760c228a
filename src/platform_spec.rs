//! Loads a `platform_spec` (SPEC_FULL.md §6: "path or structure describing
//! hosts and power states") from YAML into an [`adapter::PlatformDescription`].
//!
//! The core itself never originates a platform description this way during a
//! real run — that comes from the adapter's `SIMULATION_BEGINS` batch — but
//! `start()` accepts `platform_spec` as a path, and something has to turn
//! that path into the structure the adapter expects to be handed back
//! consistently with. This is that something.

use std::fs;
use std::path::Path;

use itertools::Itertools;

use crate::adapter::PlatformDescription;
use crate::utils::prelude::*;

/// Reads and parses a YAML platform spec file.
///
/// Fails with `InvalidArgument` if resource ids are not unique across hosts,
/// since the rest of the crate assumes a resource belongs to exactly one
/// host.
pub fn load(path: impl AsRef<Path>) -> Result<PlatformDescription> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let description: PlatformDescription = serde_yaml::from_str(&raw)
        .map_err(|e| Error::InvalidArgument(format!("{}: {}", path.display(), e)))?;
    validate(&description)?;
    Ok(description)
}

/// Parses a YAML platform spec already held in memory (the "structure"
/// alternative to a path, per SPEC_FULL.md §6).
pub fn parse(yaml: &str) -> Result<PlatformDescription> {
    let description: PlatformDescription =
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidArgument(e.to_string()))?;
    validate(&description)?;
    Ok(description)
}

fn validate(description: &PlatformDescription) -> Result<()> {
    let duplicate = description
        .hosts
        .iter()
        .flat_map(|h| h.resource_ids.iter().copied())
        .sorted()
        .tuple_windows()
        .find(|(a, b)| a == b);

    if let Some((rid, _)) = duplicate {
        return Err(Error::InvalidArgument(format!("resource id {} appears on more than one host", rid)));
    }
    Ok(())
}
