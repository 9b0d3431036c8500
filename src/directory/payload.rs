use super::Listing;
use crate::error::{Error, Result};
use crate::model::{ObservedSensor, Structure};
use serde_json::Value;
use tracing::{debug, warn};

/// Decode a structure listing body.
///
/// Accepts a bare array or a `{ "values": [...] }` envelope. Each entry needs
/// a string or numeric `id` (or `_id`) and a non-blank string `name`.
pub fn parse_structures(body: &Value) -> Result<Listing<Structure>> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("values") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(Error::MalformedResponse(
                    "structure listing object has no 'values' array".to_string(),
                ))
            }
        },
        _ => {
            return Err(Error::MalformedResponse(
                "structure listing is neither an array nor an object".to_string(),
            ))
        }
    };

    let mut listing = Listing::default();
    for entry in entries {
        let id = entry.get("id").or_else(|| entry.get("_id")).and_then(id_string);
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty());

        match (id, name) {
            (Some(id), Some(name)) => listing.items.push(Structure {
                id,
                name: name.to_string(),
            }),
            _ => {
                warn!(entry = %entry, "Skipping structure with missing id or name");
                listing.malformed += 1;
            }
        }
    }

    Ok(listing)
}

/// Decode a structure detail body into observed sensors.
///
/// A body without a `sensors` key is a structure with no sensors. Each sensor
/// needs a string `eui`, a boolean `online`, and a string `userConfig.name`.
pub fn parse_sensors(structure: &Structure, body: &Value) -> Result<Listing<ObservedSensor>> {
    let entries = match body.get("sensors") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => {
            debug!(structure_id = %structure.id, "Structure payload has no sensors");
            return Ok(Listing::default());
        }
        Some(_) => {
            return Err(Error::MalformedResponse(format!(
                "structure {} has a non-array 'sensors' field",
                structure.id
            )))
        }
    };

    let mut listing = Listing::default();
    for entry in entries {
        let eui = entry.get("eui").and_then(Value::as_str);
        let online = entry.get("online").and_then(Value::as_bool);
        let name = entry
            .get("userConfig")
            .and_then(|config| config.get("name"))
            .and_then(Value::as_str);

        match (eui, online, name) {
            (Some(eui), Some(online), Some(name)) if !eui.is_empty() => {
                listing.items.push(ObservedSensor {
                    eui: eui.to_string(),
                    name: name.to_string(),
                    online,
                    structure_id: structure.id.clone(),
                    structure_name: structure.name.clone(),
                })
            }
            _ => {
                warn!(
                    structure_id = %structure.id,
                    eui = eui.unwrap_or("<missing>"),
                    "Skipping sensor with missing eui, online flag, or name"
                );
                listing.malformed += 1;
            }
        }
    }

    Ok(listing)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
