//! Model-name tagging and operation-id assignment on raw description documents.
//!
//! Named definitions and inline body shapes receive an `x-model` tag so every
//! body shape reaches the model registry under a readable, stable name.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::types::HttpMethod;

/// Vendor extension carrying a shape's model name
pub const MODEL_MARKER: &str = "x-model";

/// Suffix appended to synthesized body model names
pub const MODEL_NAME_SUFFIX: &str = "Body";

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").expect("static regex"));

/// Upper-cases the first letter of every `_`-separated word.
///
/// ```
/// use apibind::spec::tagging::camelize;
///
/// assert_eq!(camelize("ipam_vlans_partial_update"), "IpamVlansPartialUpdate");
/// assert_eq!(camelize("findPetsByStatus"), "FindPetsByStatus");
/// ```
pub fn camelize(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect()
}

/// Converts an API path to a humanized model-name fragment.
///
/// ```
/// use apibind::spec::tagging::humanize_api_path;
///
/// assert_eq!(humanize_api_path("/api/vlan/{id}"), "ApiVlanId");
/// ```
pub fn humanize_api_path(api_path: &str) -> String {
    api_path
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect()
}

/// Collapses every run of non-word characters and underscores to one `_`, trimming the ends.
pub fn sanitize_identifier(s: &str) -> String {
    NON_WORD.replace_all(s, "_").trim_matches('_').to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Tags every named definition with its own name unless it already has a tag.
pub fn tag_definitions(definitions: &mut Map<String, Value>) {
    for (name, schema) in definitions.iter_mut() {
        if let Some(obj) = schema.as_object_mut() {
            obj.entry(MODEL_MARKER.to_string())
                .or_insert_with(|| Value::String(name.clone()));
        }
    }
}

/// Tags inline body shapes (no `$ref`, no tag yet) with a synthesized model name.
///
/// The name is the camelized `operationId` plus `Body`; without an id it is the
/// upper-cased method followed by the humanized path, plus `Body`.
pub fn modeltag_nonref_schemas(document: &mut Value) {
    let Some(paths) = document.get_mut("paths").and_then(Value::as_object_mut) else {
        return;
    };

    for (path_name, path_item) in paths.iter_mut() {
        for method in HttpMethod::all() {
            let Some(op) = path_item
                .get_mut(method.as_str())
                .and_then(Value::as_object_mut)
            else {
                continue;
            };

            let model_name = format!(
                "{}{}",
                op.get("operationId")
                    .and_then(Value::as_str)
                    .map(camelize)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!(
                        "{}{}",
                        method.as_str().to_uppercase(),
                        humanize_api_path(path_name)
                    )),
                MODEL_NAME_SUFFIX
            );

            if let Some(params) = op.get_mut("parameters").and_then(Value::as_array_mut) {
                for param in params.iter_mut() {
                    if param.get("in").and_then(Value::as_str) != Some("body") {
                        continue;
                    }
                    if let Some(schema) = param.get_mut("schema") {
                        tag_inline(schema, &model_name);
                    }
                }
            }

            // OpenAPI 3 request bodies
            if let Some(schema) = op
                .get_mut("requestBody")
                .and_then(|rb| rb.get_mut("content"))
                .and_then(Value::as_object_mut)
                .and_then(|content| {
                    content
                        .iter_mut()
                        .find(|(media, _)| media.contains("json"))
                        .map(|(_, media)| media)
                })
                .and_then(|media| media.get_mut("schema"))
            {
                tag_inline(schema, &model_name);
            }
        }
    }
}

fn tag_inline(schema: &mut Value, model_name: &str) {
    if let Some(obj) = schema.as_object_mut() {
        if !obj.contains_key("$ref") && !obj.contains_key(MODEL_MARKER) {
            obj.insert(
                MODEL_MARKER.to_string(),
                Value::String(model_name.to_string()),
            );
        }
    }
}

/// Writes caller-provided operation ids (path -> method -> id) into a document.
pub fn assign_operation_ids(
    document: &mut Value,
    operation_ids: &HashMap<String, HashMap<String, String>>,
) {
    let Some(paths) = document.get_mut("paths").and_then(Value::as_object_mut) else {
        return;
    };

    for (path_name, path_item) in paths.iter_mut() {
        let Some(by_method) = operation_ids.get(path_name) else {
            continue;
        };
        let Some(path_obj) = path_item.as_object_mut() else {
            continue;
        };
        for (method, op) in path_obj.iter_mut() {
            if let (Some(oper_id), Some(op_obj)) = (by_method.get(method), op.as_object_mut()) {
                op_obj.insert("operationId".to_string(), Value::String(oper_id.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("ipam_vlans_list"), "IpamVlansList");
        assert_eq!(camelize("findPets"), "FindPets");
        assert_eq!(camelize("__leading"), "Leading");
    }

    #[test]
    fn test_humanize_api_path() {
        assert_eq!(humanize_api_path("/api/vlan/{id}"), "ApiVlanId");
        assert_eq!(
            humanize_api_path("/api/resources/vlan-pools/{id}"),
            "ApiResourcesVlanPoolsId"
        );
        assert_eq!(humanize_api_path("/API/HCL"), "ApiHcl");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("get_/pets/{id}"), "get_pets_id");
        assert_eq!(sanitize_identifier("ipam.vlans-list"), "ipam_vlans_list");
    }

    #[test]
    fn test_tag_definitions_keeps_existing_tags() {
        let mut defs = json!({
            "Vlan": {"type": "object"},
            "Pool": {"type": "object", "x-model": "ResourcePool"}
        });
        tag_definitions(defs.as_object_mut().unwrap());

        assert_eq!(defs["Vlan"]["x-model"], "Vlan");
        assert_eq!(defs["Pool"]["x-model"], "ResourcePool");
    }

    #[test]
    fn test_modeltag_nonref_schemas() {
        let mut doc = json!({
            "paths": {
                "/api/vlan/{id}": {
                    "put": {
                        "parameters": [
                            {"name": "id", "in": "path", "type": "string"},
                            {"name": "data", "in": "body", "schema": {"type": "object"}}
                        ]
                    },
                    "patch": {
                        "operationId": "vlan_partial_update",
                        "parameters": [
                            {"name": "data", "in": "body", "schema": {"type": "object"}}
                        ]
                    },
                    "post": {
                        "parameters": [
                            {"name": "data", "in": "body", "schema": {"$ref": "#/definitions/Vlan"}}
                        ]
                    }
                }
            }
        });

        modeltag_nonref_schemas(&mut doc);

        let item = &doc["paths"]["/api/vlan/{id}"];
        assert_eq!(
            item["put"]["parameters"][1]["schema"]["x-model"],
            "PUTApiVlanIdBody"
        );
        assert_eq!(
            item["patch"]["parameters"][0]["schema"]["x-model"],
            "VlanPartialUpdateBody"
        );
        assert!(item["post"]["parameters"][0]["schema"].get("x-model").is_none());
        assert!(item["put"]["parameters"][0].get("x-model").is_none());
    }

    #[test]
    fn test_modeltag_request_body() {
        let mut doc = json!({
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": {
                            "content": {"application/json": {"schema": {"type": "object"}}}
                        }
                    }
                }
            }
        });

        modeltag_nonref_schemas(&mut doc);

        assert_eq!(
            doc["paths"]["/pets"]["post"]["requestBody"]["content"]["application/json"]["schema"]
                ["x-model"],
            "CreatePetBody"
        );
    }

    #[test]
    fn test_assign_operation_ids() {
        let mut doc = json!({
            "paths": {
                "/api/hcl": {"get": {}, "post": {"operationId": "old"}},
                "/api/other": {"get": {}}
            }
        });
        let mut ids = HashMap::new();
        ids.insert(
            "/api/hcl".to_string(),
            HashMap::from([
                ("get".to_string(), "hcl_list".to_string()),
                ("post".to_string(), "hcl_create".to_string()),
            ]),
        );

        assign_operation_ids(&mut doc, &ids);

        assert_eq!(doc["paths"]["/api/hcl"]["get"]["operationId"], "hcl_list");
        assert_eq!(doc["paths"]["/api/hcl"]["post"]["operationId"], "hcl_create");
        assert!(doc["paths"]["/api/other"]["get"].get("operationId").is_none());
    }
}
