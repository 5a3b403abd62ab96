//! Address construction and inbound address matching

use std::fmt;

use crate::core::error::{Result, TickwireError};
use crate::core::types::GeneratorId;

/// Address of one output region's value (`index` is 1-based)
pub fn output_region_address(generator_name: &str, index: usize) -> String {
    format!("/{}/output/{}/float", generator_name, index)
}

/// Address of the list of all output region values
pub fn output_list_address(generator_name: &str) -> String {
    format!("/{}/output", generator_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
    Name,
}

/// Generator referenced by an inbound address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundTarget {
    Id(GeneratorId),
    Name(String),
}

impl fmt::Display for InboundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundTarget::Id(id) => write!(f, "id {}", id),
            InboundTarget::Name(name) => write!(f, "name {:?}", name),
        }
    }
}

/// Parsed inbound address pattern such as `/{id}` or `/{name}/input`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPattern {
    segments: Vec<Segment>,
}

impl InboundPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let body = pattern.strip_prefix('/').ok_or_else(|| {
            TickwireError::Config(format!("inbound address {:?} must start with '/'", pattern))
        })?;

        let segments: Vec<Segment> = body
            .split('/')
            .map(|seg| match seg {
                "{id}" => Segment::Id,
                "{name}" => Segment::Name,
                other => Segment::Literal(other.to_string()),
            })
            .collect();

        let placeholders = segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count();
        if placeholders != 1 {
            return Err(TickwireError::Config(format!(
                "inbound address {:?} needs exactly one {{id}} or {{name}} segment, found {}",
                pattern, placeholders
            )));
        }

        Ok(Self { segments })
    }

    /// Match an address against the pattern
    ///
    /// Returns `None` when the shape differs or an `{id}` segment is not
    /// a number.
    pub fn match_address(&self, address: &str) -> Option<InboundTarget> {
        let body = address.strip_prefix('/')?;
        let parts: Vec<&str> = body.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut target = None;
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Id => target = Some(InboundTarget::Id(GeneratorId(part.parse().ok()?))),
                Segment::Name if !part.is_empty() => {
                    target = Some(InboundTarget::Name(part.to_string()))
                }
                Segment::Name => return None,
            }
        }
        target
    }
}

impl Default for InboundPattern {
    fn default() -> Self {
        Self {
            segments: vec![Segment::Id],
        }
    }
}
