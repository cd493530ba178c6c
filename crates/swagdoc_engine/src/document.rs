/* 📖 # How do annotations from many files become one document?

Every section has its own merge rule:

- `SwaggerHeader` is merged shallowly into the root; a later key replaces an earlier one whole.
- `SwaggerTag` registers tags by name, and the first registration of a name wins.
- `SwaggerPath` is merged recursively into `paths`, so different files can contribute different
  routes and methods; colliding leaves take the last value.
- `SwaggerDefinitions` is merged shallowly into `definitions`.

Each merge bumps the epoch and drops the cached validity, even when nothing changed. The
validity cache compares epochs to know whether a result it computed is still current.
*/

use serde_json::{Map, Value, json};
use tracing::trace;

use swagdoc_base::{ResultExt, SwagdocResult};

use crate::annotation::AnnotationFragment;
use crate::section::{SectionKind, decode_payload, json_type_name, malformed};
use crate::validator::Validity;

/// The assembled API description plus its mutation bookkeeping.
#[derive(Debug, Clone)]
pub struct AggregateDocument {
    root: Map<String, Value>,
    epoch: u64,
    validity: Validity,
}

impl AggregateDocument {
    /// Empty Swagger 2.0 skeleton.
    pub fn new() -> Self {
        let root = match json!({
            "swagger": "2.0",
            "info": {"title": null, "version": null},
            "paths": {},
        }) {
            Value::Object(root) => root,
            _ => Map::new(),
        };
        Self {
            root,
            epoch: 0,
            validity: Validity::Unknown,
        }
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Deep copy of the document as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Number of merges applied so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub(crate) fn set_validity(&mut self, validity: Validity) {
        self.validity = validity;
    }

    /// Decode a fragment's payload and merge every document it contains, in order.
    pub fn apply_fragment(&mut self, fragment: &AnnotationFragment) -> SwagdocResult<()> {
        let section = SectionKind::from_tag_name(&fragment.tag_name)?;
        for payload in decode_payload(section, &fragment.raw_payload)? {
            self.merge(section, payload)
                .with_context(|| format!("Failed to merge {} section", section))?;
        }
        Ok(())
    }

    /// Merge one decoded mapping into the section it belongs to.
    pub fn merge(
        &mut self,
        section: SectionKind,
        payload: Map<String, Value>,
    ) -> SwagdocResult<()> {
        match section {
            SectionKind::Header => self.merge_header(payload),
            SectionKind::Tag => self.merge_tags(payload)?,
            SectionKind::Path => self.merge_paths(payload),
            SectionKind::Definitions => self.merge_definitions(payload),
        }
        self.epoch += 1;
        self.validity = Validity::Unknown;
        trace!(%section, epoch = self.epoch, "merged section");
        Ok(())
    }

    fn merge_header(&mut self, payload: Map<String, Value>) {
        for (key, value) in payload {
            self.root.insert(key, value);
        }
    }

    fn merge_tags(&mut self, payload: Map<String, Value>) -> SwagdocResult<()> {
        let mut additions = Vec::with_capacity(payload.len());
        for (name, definition) in payload {
            let definition = match definition {
                Value::Object(definition) => definition,
                Value::Null => Map::new(),
                other => {
                    return Err(malformed(
                        SectionKind::Tag,
                        format!(
                            "tag '{}' must be a mapping, found {}",
                            name,
                            json_type_name(&other)
                        ),
                    ));
                }
            };
            let mut tag = Map::new();
            tag.insert("name".to_string(), Value::String(name.clone()));
            tag.extend(definition.into_iter().filter(|(key, _)| key != "name"));
            additions.push((name, tag));
        }

        let tags = self.object_child_array("tags");
        for (name, tag) in additions {
            let registered = tags
                .iter()
                .any(|existing| existing.get("name").and_then(Value::as_str) == Some(&name));
            if !registered {
                tags.push(Value::Object(tag));
            }
        }
        Ok(())
    }

    fn merge_paths(&mut self, payload: Map<String, Value>) {
        let paths = self.object_child_map("paths");
        for (route, item) in payload {
            match paths.get_mut(&route) {
                Some(existing) => deep_merge(existing, item),
                None => {
                    paths.insert(route, item);
                }
            }
        }
    }

    fn merge_definitions(&mut self, payload: Map<String, Value>) {
        let definitions = self.object_child_map("definitions");
        for (name, schema) in payload {
            definitions.insert(name, schema);
        }
    }

    /// Root entry `key` as an object, replacing anything that is not one.
    fn object_child_map(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just replaced with an object"),
        }
    }

    /// Root entry `key` as an array, replacing anything that is not one.
    fn object_child_array(&mut self, key: &str) -> &mut Vec<Value> {
        let entry = self.root.entry(key).or_insert_with(|| Value::Array(vec![]));
        if !entry.is_array() {
            *entry = Value::Array(vec![]);
        }
        match entry {
            Value::Array(items) => items,
            _ => unreachable!("entry was just replaced with an array"),
        }
    }
}

impl Default for AggregateDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Objects merge key by key, any other value replaces the target.
pub(crate) fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
