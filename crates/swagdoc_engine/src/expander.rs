/* 📖 # What does expansion add to the served document?

The stored document holds exactly what the annotations said. Before it is rendered for a
request, a copy is expanded: `basePath` defaults to `/`, `host` defaults to the host the request
was addressed to, and operation tags written as plain names are replaced by the full tag objects
registered under `tags`. Expansion works on a copy and never fails; anything it does not
understand is left as it is.
*/

use std::collections::HashMap;

use serde_json::{Map, Value};

use swagdoc_base::pal::http::HttpRequest;

/// The parts of a request that expansion depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Host name the request was sent to, without the port.
    pub hostname: Option<String>,
}

impl RequestContext {
    pub fn from_request(request: &HttpRequest) -> Self {
        let hostname = request
            .header("Host")
            .map(strip_port)
            .filter(|host| !host.is_empty())
            .map(str::to_string);
        Self { hostname }
    }
}

fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8000
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

/// Expanded copy of `document` for one request.
pub fn expand(document: &Value, context: &RequestContext) -> Value {
    let mut expanded = document.clone();
    let Some(root) = expanded.as_object_mut() else {
        return expanded;
    };

    root.entry("basePath")
        .or_insert_with(|| Value::String("/".to_string()));
    if let Some(hostname) = &context.hostname {
        root.entry("host")
            .or_insert_with(|| Value::String(hostname.clone()));
    }

    let Some(tags) = root.get("tags").and_then(Value::as_array) else {
        return expanded;
    };
    let registered: HashMap<String, Value> = tags
        .iter()
        .filter_map(|tag| {
            let name = tag.get("name")?.as_str()?;
            Some((name.to_string(), tag.clone()))
        })
        .collect();

    if let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) {
        for item in paths.values_mut().filter_map(Value::as_object_mut) {
            for operation in item.values_mut().filter_map(Value::as_object_mut) {
                resolve_operation_tags(operation, &registered);
            }
        }
    }
    expanded
}

fn resolve_operation_tags(operation: &mut Map<String, Value>, registered: &HashMap<String, Value>) {
    let Some(tags) = operation.get_mut("tags").and_then(Value::as_array_mut) else {
        return;
    };
    for tag in tags.iter_mut() {
        if let Value::String(name) = tag {
            *tag = registered.get(name.as_str()).cloned().unwrap_or_else(|| {
                let mut synthesized = Map::new();
                synthesized.insert("name".to_string(), Value::String(name.clone()));
                Value::Object(synthesized)
            });
        }
    }
}
