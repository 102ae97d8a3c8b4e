//! Version range parsing and containment.
//!
//! Supports `[1.0,2.0)`, `[1.0,]`, `(,2.0)`, `[1.0]` (exact). A bare
//! version (no brackets) is not a range — it is a soft preference the
//! caller must handle separately per §3.

use aether_util::errors::AetherError;

use crate::version::Version;

#[derive(Debug, Clone)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl VersionRange {
    /// Parse a version range string. Returns `InvalidInput` if `spec`
    /// isn't bracketed (bare versions are not ranges).
    pub fn parse(spec: &str) -> miette::Result<Self> {
        let s = spec.trim();
        if s.is_empty() {
            return Err(AetherError::InvalidInput {
                message: "empty version range".to_string(),
            }
            .into());
        }
        if !s.starts_with('[') && !s.starts_with('(') {
            return Err(AetherError::InvalidInput {
                message: format!("not a version range: {spec}"),
            }
            .into());
        }
        if !s.ends_with(']') && !s.ends_with(')') {
            return Err(AetherError::InvalidInput {
                message: format!("unterminated version range: {spec}"),
            }
            .into());
        }

        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            Ok(VersionRange {
                lower: if lower.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::parse(lower),
                        inclusive: open_inclusive,
                    })
                },
                upper: if upper.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::parse(upper),
                        inclusive: close_inclusive,
                    })
                },
            })
        } else {
            let inner = inner.trim();
            if inner.is_empty() {
                return Err(AetherError::InvalidInput {
                    message: format!("empty version range bound: {spec}"),
                }
                .into());
            }

            // `[v.*]` prefix shorthand: equal to `[v.min, v.max]`, i.e.
            // every version whose dotted prefix is `v`.
            if let Some(prefix) = inner.strip_suffix(".*") {
                if prefix.is_empty() {
                    return Err(AetherError::InvalidInput {
                        message: format!("empty version prefix in range: {spec}"),
                    }
                    .into());
                }
                return Ok(VersionRange {
                    lower: Some(Bound {
                        version: Version::parse(prefix),
                        inclusive: true,
                    }),
                    upper: Some(Bound {
                        version: Version::parse(&format!("{prefix}.{}", u64::MAX)),
                        inclusive: false,
                    }),
                });
            }

            // Exact version: [1.0] means exactly 1.0.
            let v = Version::parse(inner);
            Ok(VersionRange {
                lower: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
                upper: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            })
        }
    }

    /// `true` if `spec` looks like a range (starts with a bracket) rather
    /// than a soft version preference.
    pub fn looks_like_range(spec: &str) -> bool {
        let s = spec.trim();
        s.starts_with('[') || s.starts_with('(')
    }

    pub fn contains(&self, version: &Version) -> bool {
        use std::cmp::Ordering;

        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// Intersection of two ranges, or `None` if they don't overlap
    /// (used by the conflict resolver when merging constraints from
    /// multiple paths to the same conflict group).
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let lower = tighter_lower(&self.lower, &other.lower);
        let upper = tighter_upper(&self.upper, &other.upper);
        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            let cmp = lo.version.cmp(&hi.version);
            if cmp == std::cmp::Ordering::Greater {
                return None;
            }
            if cmp == std::cmp::Ordering::Equal && !(lo.inclusive && hi.inclusive) {
                return None;
            }
        }
        Some(VersionRange { lower, upper })
    }
}

fn tighter_lower(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => {
            let cmp = x.version.cmp(&y.version);
            Some(match cmp {
                std::cmp::Ordering::Greater => x.clone(),
                std::cmp::Ordering::Less => y.clone(),
                std::cmp::Ordering::Equal => Bound {
                    version: x.version.clone(),
                    inclusive: x.inclusive && y.inclusive,
                },
            })
        }
    }
}

fn tighter_upper(a: &Option<Bound>, b: &Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => {
            let cmp = x.version.cmp(&y.version);
            Some(match cmp {
                std::cmp::Ordering::Less => x.clone(),
                std::cmp::Ordering::Greater => y.clone(),
                std::cmp::Ordering::Equal => Bound {
                    version: x.version.clone(),
                    inclusive: x.inclusive && y.inclusive,
                },
            })
        }
    }
}
