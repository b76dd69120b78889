//! Platform target folders and host compatibility
//!
//! Packages ship one folder per platform target under `lib/`, named
//! `<family><major>[.<minor>]` (`host2.1`, `portable1.0`) or a bare family
//! (`any`). The scanner picks exactly one folder per package.

use std::cmp::Reverse;

use crate::config::ScannerConfig;

/// Parsed platform target folder name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    /// Folder name as found on disk
    pub folder: String,
    /// Lowercased family, e.g. `host`
    pub family: String,
    /// `(major, minor)`, absent for bare families
    pub version: Option<(u32, u32)>,
}

impl PlatformTarget {
    /// Parse a folder name; returns `None` for names that are not targets
    pub fn parse(folder: &str) -> Option<Self> {
        let lowered = folder.trim().to_ascii_lowercase();
        let split = lowered
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(lowered.len());
        let (family, version) = lowered.split_at(split);
        if family.is_empty()
            || !family
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-' || c == '_')
        {
            return None;
        }
        let version = if version.is_empty() {
            None
        } else {
            Some(parse_version(version)?)
        };
        Some(Self {
            folder: folder.to_string(),
            family: family.to_string(),
            version,
        })
    }
}

/// Parse `major[.minor]`
pub fn parse_version(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor))
}

/// Ordering key for a compatible target; smaller is better
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetRank {
    /// 0 for the host family, 1.. for fallback families in configured order
    tier: usize,
    /// Higher versions first within a tier
    version: Reverse<(u32, u32)>,
    /// Ordinal folder name breaks remaining ties
    folder: String,
}

/// Runtime the scanner ranks targets against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRuntime {
    pub family: String,
    pub version: (u32, u32),
    /// Families usable on any host, most preferred first
    pub fallback_families: Vec<String>,
}

impl HostRuntime {
    pub fn new(family: &str, version: (u32, u32), fallback_families: &[String]) -> Self {
        Self {
            family: family.trim().to_ascii_lowercase(),
            version,
            fallback_families: fallback_families
                .iter()
                .map(|f| f.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Build from scanner configuration; an unparsable version means `0.0`
    pub fn from_config(config: &ScannerConfig) -> Self {
        let version = parse_version(&config.host_version).unwrap_or((0, 0));
        Self::new(&config.host_family, version, &config.fallback_families)
    }

    /// Rank `target`, or `None` when it cannot run on this host
    pub fn rank(&self, target: &PlatformTarget) -> Option<TargetRank> {
        let tier = if target.family == self.family {
            match target.version {
                Some(version) if version > self.version => return None,
                _ => 0,
            }
        } else {
            1 + self
                .fallback_families
                .iter()
                .position(|family| *family == target.family)?
        };
        Some(TargetRank {
            tier,
            version: Reverse(target.version.unwrap_or((0, 0))),
            folder: target.folder.clone(),
        })
    }

    /// Most compatible target among `candidates`, independent of their order
    pub fn select_best<'a>(&self, candidates: &'a [PlatformTarget]) -> Option<&'a PlatformTarget> {
        candidates
            .iter()
            .filter_map(|target| self.rank(target).map(|rank| (rank, target)))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, target)| target)
    }
}
