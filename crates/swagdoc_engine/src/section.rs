/* 📖 # Why a closed enum of sections?

A `@Swagger<Name>` tag decides how its payload is merged into the document. The set of names is
fixed, so it is an enum: an unknown name fails once, at lookup, with `UnknownSection`, and every
merge path is checked by the compiler instead of being looked up by name at runtime.
*/

use serde::Deserialize;
use serde_json::{Map, Value};

use swagdoc_base::{ErrorKind, SwagdocError, SwagdocResult};

/// The document sections an annotation can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Header,
    Tag,
    Path,
    Definitions,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Header,
        SectionKind::Tag,
        SectionKind::Path,
        SectionKind::Definitions,
    ];

    /// Look up the section for a tag name such as `SwaggerPath`.
    pub fn from_tag_name(name: &str) -> SwagdocResult<SectionKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag_name() == name)
            .ok_or_else(|| {
                Box::new(SwagdocError::new(ErrorKind::UnknownSection {
                    name: name.to_string(),
                }))
            })
    }

    pub fn tag_name(&self) -> &'static str {
        match self {
            SectionKind::Header => "SwaggerHeader",
            SectionKind::Tag => "SwaggerTag",
            SectionKind::Path => "SwaggerPath",
            SectionKind::Definitions => "SwaggerDefinitions",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag_name())
    }
}

pub(crate) fn malformed(section: SectionKind, message: impl Into<String>) -> Box<SwagdocError> {
    Box::new(SwagdocError::new(ErrorKind::MalformedPayload {
        section: section.tag_name().to_string(),
        message: message.into(),
    }))
}

/// Decode a payload as a stream of YAML documents, one mapping per document.
///
/// An empty payload yields a single empty mapping, so that merging it still counts as a merge.
pub fn decode_payload(section: SectionKind, raw: &str) -> SwagdocResult<Vec<Map<String, Value>>> {
    let mut mappings = Vec::new();
    for document in serde_yaml::Deserializer::from_str(raw) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| malformed(section, e.to_string()))?;
        match yaml_to_json(section, value)? {
            Value::Object(map) => mappings.push(map),
            Value::Null => mappings.push(Map::new()),
            other => {
                return Err(malformed(
                    section,
                    format!("expected a mapping, found {}", json_type_name(&other)),
                ));
            }
        }
    }
    if mappings.is_empty() {
        mappings.push(Map::new());
    }
    Ok(mappings)
}

/// YAML allows non-string keys (`200:` under `responses`); JSON keys are strings.
fn yaml_to_json(section: SectionKind, value: serde_yaml::Value) -> SwagdocResult<Value> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => number_to_json(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(|item| yaml_to_json(section, item))
                .collect::<SwagdocResult<_>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(mapping_key(section, key)?, yaml_to_json(section, value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(section, tagged.value)?,
    })
}

fn mapping_key(section: SectionKind, key: serde_yaml::Value) -> SwagdocResult<String> {
    use serde_yaml::Value as Yaml;
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => mapping_key(section, tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => {
            Err(malformed(section, "mapping keys must be scalars"))
        }
    }
}

fn number_to_json(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
