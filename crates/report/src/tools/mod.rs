//! Tool adapter for the external reasoning agent.
//!
//! Each tool declares a typed parameter schema that is validated
//! structurally before its executor runs; the agent never reaches an
//! executor with missing or mistyped parameters.

pub mod catalog;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub use catalog::build_registry;

/// Tool adapter errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    UnknownTool(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("query must include the account scope filter: account_id == \"{0}\"")]
    MissingAccountScope(i64),

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Parameter value kinds a tool can declare.
#[derive(Debug, Clone)]
pub enum ParamKind {
    String,
    Number,
    Array { items: Box<ParamKind> },
    Object { properties: Vec<ToolParam> },
}

/// One declared tool parameter.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ToolParam {
    pub fn required(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
        }
    }
}

/// Validates a parameter object against a declared schema.
pub fn validate_params(declared: &[ToolParam], params: &Value) -> Result<(), ToolError> {
    let object = params
        .as_object()
        .ok_or_else(|| ToolError::InvalidParams("parameters must be an object".into()))?;

    for param in declared {
        match object.get(param.name) {
            None if param.required => {
                return Err(ToolError::InvalidParams(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            None => {}
            Some(value) => check_kind(&param.kind, value, param.name)?,
        }
    }
    Ok(())
}

fn check_kind(kind: &ParamKind, value: &Value, path: &str) -> Result<(), ToolError> {
    match kind {
        ParamKind::String => {
            if !value.is_string() {
                return Err(ToolError::InvalidParams(format!(
                    "'{}' must be a string",
                    path
                )));
            }
        }
        ParamKind::Number => {
            if !value.is_number() {
                return Err(ToolError::InvalidParams(format!(
                    "'{}' must be a number",
                    path
                )));
            }
        }
        ParamKind::Array { items } => {
            let array = value.as_array().ok_or_else(|| {
                ToolError::InvalidParams(format!("'{}' must be an array", path))
            })?;
            for (index, item) in array.iter().enumerate() {
                check_kind(items, item, &format!("{}[{}]", path, index))?;
            }
        }
        ParamKind::Object { properties } => {
            let object = value.as_object().ok_or_else(|| {
                ToolError::InvalidParams(format!("'{}' must be an object", path))
            })?;
            for property in properties {
                match object.get(property.name) {
                    None if property.required => {
                        return Err(ToolError::InvalidParams(format!(
                            "missing required field '{}.{}'",
                            path, property.name
                        )));
                    }
                    None => {}
                    Some(nested) => {
                        check_kind(&property.kind, nested, &format!("{}.{}", path, property.name))?
                    }
                }
            }
        }
    }
    Ok(())
}

fn kind_to_schema(kind: &ParamKind, description: &str) -> Value {
    let mut schema = match kind {
        ParamKind::String => json!({"type": "string"}),
        ParamKind::Number => json!({"type": "number"}),
        ParamKind::Array { items } => json!({
            "type": "array",
            "items": kind_to_schema(items, ""),
        }),
        ParamKind::Object { properties } => params_to_schema(properties),
    };
    if !description.is_empty() {
        schema["description"] = Value::from(description);
    }
    schema
}

/// Renders a declared parameter list as a JSON schema object, the shape
/// the reasoning agent consumes for function calling.
pub fn params_to_schema(declared: &[ToolParam]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in declared {
        properties.insert(
            param.name.to_string(),
            kind_to_schema(&param.kind, param.description),
        );
        if param.required {
            required.push(Value::from(param.name));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Executable body of one tool.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, params: Value) -> Result<String, ToolError>;
}

/// One named tool: schema plus executor.
pub struct Tool {
    pub name: &'static str,
    pub description: String,
    pub params: Vec<ToolParam>,
    executor: Arc<dyn ToolExecutor>,
}

impl Tool {
    pub fn new(
        name: &'static str,
        description: impl Into<String>,
        params: Vec<ToolParam>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            params,
            executor,
        }
    }
}

/// A tool's listing entry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry of the named tools exposed to the reasoning agent.
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    /// Lists every tool with its parameter schema.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.clone(),
                parameters: params_to_schema(&tool.params),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Validates parameters against the tool's schema, then executes.
    pub async fn execute(&self, name: &str, params: Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_params(&tool.params, &params)?;
        tool.executor.execute(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, params: Value) -> Result<String, ToolError> {
            Ok(params.to_string())
        }
    }

    fn user_params() -> Vec<ToolParam> {
        vec![
            ToolParam::required("orgName", "Organization name", ParamKind::String),
            ToolParam::required("orgId", "Organization id", ParamKind::Number),
            ToolParam::required(
                "users",
                "Users to include",
                ParamKind::Array {
                    items: Box::new(ParamKind::Object {
                        properties: vec![
                            ToolParam::required("id", "", ParamKind::Number),
                            ToolParam::required("name", "", ParamKind::String),
                        ],
                    }),
                },
            ),
        ]
    }

    fn valid_params() -> Value {
        json!({
            "orgName": "Turbo",
            "orgId": 3,
            "users": [{"id": 1, "name": "ben"}]
        })
    }

    #[test]
    fn test_validate_accepts_well_formed_params() {
        assert!(validate_params(&user_params(), &valid_params()).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let mut params = valid_params();
        params.as_object_mut().unwrap().remove("orgId");
        let err = validate_params(&user_params(), &params).unwrap_err();
        assert!(err.to_string().contains("orgId"));
    }

    #[test]
    fn test_validate_rejects_wrong_scalar_type() {
        let mut params = valid_params();
        params["orgId"] = json!("three");
        let err = validate_params(&user_params(), &params).unwrap_err();
        assert!(err.to_string().contains("'orgId' must be a number"));
    }

    #[test]
    fn test_validate_rejects_bad_array_element() {
        let mut params = valid_params();
        params["users"] = json!([{"id": "one", "name": "ben"}]);
        let err = validate_params(&user_params(), &params).unwrap_err();
        assert!(err.to_string().contains("users[0].id"));
    }

    #[test]
    fn test_validate_rejects_missing_nested_field() {
        let mut params = valid_params();
        params["users"] = json!([{"id": 1}]);
        let err = validate_params(&user_params(), &params).unwrap_err();
        assert!(err.to_string().contains("users[0].name"));
    }

    #[test]
    fn test_validate_rejects_non_object_params() {
        assert!(validate_params(&user_params(), &json!("nope")).is_err());
    }

    #[test]
    fn test_optional_param_may_be_absent() {
        let declared = vec![ToolParam {
            name: "limit",
            description: "",
            kind: ParamKind::Number,
            required: false,
        }];
        assert!(validate_params(&declared, &json!({})).is_ok());
        assert!(validate_params(&declared, &json!({"limit": 5})).is_ok());
        assert!(validate_params(&declared, &json!({"limit": "5"})).is_err());
    }

    #[test]
    fn test_params_to_schema_shape() {
        let schema = params_to_schema(&user_params());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["orgName"]["type"], "string");
        assert_eq!(schema["properties"]["users"]["type"], "array");
        assert_eq!(
            schema["required"],
            json!(["orgName", "orgId", "users"])
        );
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let registry = ToolRegistry::new(vec![Tool::new(
            "echo",
            "Echoes parameters",
            vec![ToolParam::required("message", "", ParamKind::String)],
            Arc::new(Echo),
        )]);

        let result = registry
            .execute("echo", json!({"message": "hi"}))
            .await
            .unwrap();
        assert!(result.contains("hi"));
    }

    #[tokio::test]
    async fn test_registry_unknown_tool() {
        let registry = ToolRegistry::new(vec![]);
        let err = registry.execute("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_registry_validates_before_dispatch() {
        let registry = ToolRegistry::new(vec![Tool::new(
            "echo",
            "Echoes parameters",
            vec![ToolParam::required("message", "", ParamKind::String)],
            Arc::new(Echo),
        )]);

        let err = registry.execute("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
