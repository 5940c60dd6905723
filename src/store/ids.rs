use crate::store::{PointId, StoreError};
use serde_json::Value;
use uuid::Uuid;

/// Outcome of reading a caller-supplied identifier before any fallback is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Integer(u64),
    Uuid(String),
    Unresolved,
}

/// The identifier a record is stored under, and whether it had to be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedId {
    pub id: PointId,
    pub generated: bool,
}

/// Precedence: positive integer, then a string holding a positive integer,
/// then a string that validates as a UUID (kept verbatim). Anything else is unresolved.
pub fn resolve_identifier(raw: Option<&Value>) -> Identifier {
    match raw {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(id) if id > 0 => Identifier::Integer(id),
            _ => Identifier::Unresolved,
        },
        Some(Value::String(s)) => {
            if let Ok(parsed) = s.trim().parse::<i128>() {
                // integer-looking strings never fall through to the UUID space
                return match u64::try_from(parsed) {
                    Ok(id) if id > 0 => Identifier::Integer(id),
                    _ => Identifier::Unresolved,
                };
            }
            if Uuid::parse_str(s).is_ok() {
                Identifier::Uuid(s.clone())
            } else {
                Identifier::Unresolved
            }
        }
        _ => Identifier::Unresolved,
    }
}

impl Identifier {
    pub fn assign(self) -> AssignedId {
        match self {
            Identifier::Integer(id) => AssignedId {
                id: PointId::Num(id),
                generated: false,
            },
            Identifier::Uuid(id) => AssignedId {
                id: PointId::Uuid(id),
                generated: false,
            },
            Identifier::Unresolved => AssignedId {
                id: fresh_point_id(),
                generated: true,
            },
        }
    }
}

pub fn fresh_point_id() -> PointId {
    PointId::Uuid(Uuid::new_v4().to_string())
}

/// Pagination offsets arrive as strings: UUID-looking first, then integer.
pub fn parse_offset(raw: &str) -> Result<PointId, StoreError> {
    let raw = raw.trim();
    if Uuid::parse_str(raw).is_ok() {
        return Ok(PointId::Uuid(raw.to_string()));
    }
    raw.parse::<u64>().map(PointId::Num).map_err(|_| {
        StoreError::Validation(
            "Invalid offset format. Must be a valid UUID or integer string.".to_string(),
        )
    })
}

/// Deletion ids: anything that parses as an integer addresses the integer space.
pub fn parse_delete_id(raw: &str) -> Result<PointId, StoreError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = trimmed.parse::<i128>() {
        return u64::try_from(parsed).map(PointId::Num).map_err(|_| {
            StoreError::Validation(format!(
                "Point ID '{}' is not a valid unsigned integer id.",
                raw
            ))
        });
    }
    if Uuid::parse_str(trimmed).is_ok() {
        return Ok(PointId::Uuid(trimmed.to_string()));
    }
    Err(StoreError::Validation(format!(
        "Point ID '{}' must be an integer or a string (UUID).",
        raw
    )))
}

/// Text form of a caller-supplied id, kept as provenance metadata.
pub fn id_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
