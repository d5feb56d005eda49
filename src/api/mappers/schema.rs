// OpenAI tool declarations -> Gemini function declarations

use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::openai::{ParameterSchema, Tool as OpenAiTool};
use crate::gemini::{
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, Schema, SchemaType, Tool,
    ToolConfig,
};

/// Groups every function declaration into a single backend tool.
///
/// Zero declared functions yield no tool at all.
pub fn translate_tools(tools: &[OpenAiTool]) -> Vec<Tool> {
    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .filter_map(|tool| {
            if tool.kind != "function" {
                tracing::warn!("Skipping unsupported tool type '{}'", tool.kind);
                return None;
            }
            let function = &tool.function;
            Some(FunctionDeclaration {
                name: function.name.clone(),
                description: function.description.clone(),
                parameters: function.parameters.as_ref().map(|params| {
                    let mut schema = translate_schema(params);
                    if params.schema_type.is_none() {
                        schema.schema_type = SchemaType::Object;
                    }
                    schema
                }),
            })
        })
        .collect();

    if declarations.is_empty() {
        return Vec::new();
    }
    vec![Tool {
        function_declarations: declarations,
    }]
}

/// Recursive schema translation. Never fails: unknown or missing types become
/// `STRING`.
pub fn translate_schema(schema: &ParameterSchema) -> Schema {
    let schema_type = schema
        .schema_type
        .as_ref()
        .and_then(type_name)
        .map(to_schema_type)
        .unwrap_or(SchemaType::String);

    let mut out = Schema::new(schema_type);
    out.description = schema.description.clone();
    out.required = schema.required.clone();
    out.properties = schema
        .properties
        .iter()
        .map(|(name, prop)| (name.clone(), translate_schema(prop)))
        .collect::<BTreeMap<_, _>>();
    out.items = schema
        .items
        .as_ref()
        .map(|items| Box::new(translate_schema(items)));

    // The backend only accepts enums on string schemas.
    if schema_type == SchemaType::String && !schema.enum_values.is_empty() {
        out.enum_values = schema
            .enum_values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        out.format = Some("enum".to_string());
    }
    out
}

/// `"integer"` -> `INTEGER`, and so on. Anything unrecognized is a string.
pub fn to_schema_type(name: &str) -> SchemaType {
    match name.to_ascii_lowercase().as_str() {
        "string" => SchemaType::String,
        "object" => SchemaType::Object,
        "array" => SchemaType::Array,
        "boolean" => SchemaType::Boolean,
        "integer" => SchemaType::Integer,
        "number" => SchemaType::Number,
        _ => SchemaType::String,
    }
}

// JSON Schema allows `"type": ["string", "null"]`; take the first concrete one.
fn type_name(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| *s != "null"),
        _ => None,
    }
}

/// Maps `tool_choice` onto the backend's function-calling config.
pub fn translate_tool_choice(choice: Option<&Value>) -> Option<ToolConfig> {
    let (mode, allowed) = match choice? {
        Value::String(s) => match s.as_str() {
            "none" => (FunctionCallingMode::Disabled, None),
            "auto" => (FunctionCallingMode::Auto, None),
            "required" => (FunctionCallingMode::Any, None),
            other => {
                tracing::warn!("Ignoring unknown tool_choice '{}'", other);
                return None;
            }
        },
        Value::Object(obj) => {
            let name = obj
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)?;
            (FunctionCallingMode::Any, Some(vec![name.to_string()]))
        }
        _ => return None,
    };

    Some(ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names: allowed,
        },
    })
}
