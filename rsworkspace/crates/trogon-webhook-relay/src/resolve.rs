//! Path → `(source, destination, topic)` resolution.

use serde::Deserialize;

const HOSTS_PIVOT: &str = "hosts";
const APPS_PIVOT: &str = "apps";

/// How identifiers are laid out in the path below a route mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingConvention {
    /// `source/destination[/topic]` or `source/hosts/destination[/topic]`.
    SourceFirst,
    /// `destination/source[/topic]` or `destination/apps/source[/topic]`.
    DestinationFirst,
    /// One mount bound to one pairing; the path carries no identifiers.
    Fixed {
        source: String,
        destination: String,
        topic: Option<String>,
    },
}

/// Config-file spelling of a convention, before fixed mounts are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConventionKind {
    SourceFirst,
    DestinationFirst,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub source: String,
    pub destination: String,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPath;

impl AddressingConvention {
    pub fn kind(&self) -> ConventionKind {
        match self {
            Self::SourceFirst => ConventionKind::SourceFirst,
            Self::DestinationFirst => ConventionKind::DestinationFirst,
            Self::Fixed { .. } => ConventionKind::Fixed,
        }
    }

    /// Path patterns accepted below `prefix`, for the `not_found` usage hint.
    pub fn usage(&self, prefix: &str) -> Vec<String> {
        match self {
            Self::SourceFirst => vec![
                format!("POST {prefix}/:source/hosts/:destination"),
                format!("POST {prefix}/:source/:destination"),
            ],
            Self::DestinationFirst => vec![
                format!("POST {prefix}/:destination/apps/:source"),
                format!("POST {prefix}/:destination/:source"),
            ],
            Self::Fixed { .. } => vec![format!("POST {prefix}")],
        }
    }
}

/// Resolves the path remainder below a mount.
///
/// An omitted topic defaults to the source id under every convention, so
/// deployments with one topic per source keep their downstream paths.
pub fn resolve(convention: &AddressingConvention, path: &str) -> Result<ResolvedRoute, InvalidPath> {
    let (pivot, source_first) = match convention {
        AddressingConvention::Fixed {
            source,
            destination,
            topic,
        } => {
            return Ok(ResolvedRoute {
                source: source.clone(),
                destination: destination.clone(),
                topic: topic.clone().unwrap_or_else(|| source.clone()),
            });
        }
        AddressingConvention::SourceFirst => (HOSTS_PIVOT, true),
        AddressingConvention::DestinationFirst => (APPS_PIVOT, false),
    };

    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < 2 {
        return Err(InvalidPath);
    }

    let (first, second, topic) = if segments[1] == pivot {
        if segments.len() < 3 {
            return Err(InvalidPath);
        }
        (segments[0], segments[2], segments.get(3))
    } else {
        (segments[0], segments[1], segments.get(2))
    };

    let (source, destination) = if source_first {
        (first, second)
    } else {
        (second, first)
    };

    Ok(ResolvedRoute {
        source: source.to_string(),
        destination: destination.to_string(),
        topic: topic.copied().unwrap_or(source).to_string(),
    })
}
