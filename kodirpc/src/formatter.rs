use colored::*;
use kodirpc_core::client::CallError;
use kodirpc_core::introspection::{
    Catalogue, MethodDescription, NotificationDescription, ParameterSchema, Schema,
};
use kodirpc_core::transport::TransportError;
use serde_json::Value;
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

/// A titled list of names.
pub struct NameList(pub &'static str, pub Vec<String>);

pub struct GroupedMethods(pub Catalogue<Vec<String>>);

pub struct MethodView<'a>(pub &'a str, pub &'a MethodDescription);

pub struct NotificationView<'a>(pub &'a str, pub &'a NotificationDescription);

pub struct TypeView<'a>(pub &'a str, pub &'a Schema);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<Value> for FormattedString {
    fn from(value: Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        let title = match &err {
            CallError::UnknownMethod(_) | CallError::UnknownNamespace(_) => "Lookup Failed:",
            CallError::Arity { .. } | CallError::Validation(_) => "Invalid Call:",
            CallError::Transport(TransportError::Remote { .. }) => "Service Error:",
            CallError::Transport(_) => "Connection Error:",
            CallError::Introspection(_) | CallError::ClientDropped => "Call Failed:",
        };

        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl From<TransportError> for FormattedString {
    fn from(err: TransportError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Connection Error:".red().bold(), err))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<NameList> for FormattedString {
    fn from(NameList(title, names): NameList) -> Self {
        if names.is_empty() {
            return FormattedString(format!("No {} found.", title.to_lowercase()).yellow().to_string());
        }

        let mut out = format!("{title}:\n");
        for name in names {
            out.push_str(&format!("  - {}\n", name.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<GroupedMethods> for FormattedString {
    fn from(GroupedMethods(groups): GroupedMethods) -> Self {
        if groups.is_empty() {
            return FormattedString("No methods found.".yellow().to_string());
        }

        let mut out = String::new();
        for (namespace, methods) in groups.iter() {
            out.push_str(&format!("{} {{\n", namespace.cyan()));
            for method in methods {
                out.push_str(&format!("  {}\n", method.green()));
            }
            out.push_str("}\n\n");
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<MethodView<'_>> for FormattedString {
    fn from(MethodView(name, method): MethodView<'_>) -> Self {
        let returns = method
            .returns
            .as_ref()
            .map_or_else(|| "none".to_string(), type_label);

        let mut out = describe_header(method.description.as_deref());
        out.push_str(&format!(
            "{} {}({}) {} {};",
            "method".cyan(),
            name.green(),
            signature(&method.params),
            "returns".cyan(),
            returns.yellow()
        ));
        out.push_str(&describe_params(&method.params));

        FormattedString(out)
    }
}

impl From<NotificationView<'_>> for FormattedString {
    fn from(NotificationView(name, notification): NotificationView<'_>) -> Self {
        let mut out = describe_header(notification.description.as_deref());
        out.push_str(&format!(
            "{} {}({});",
            "notification".cyan(),
            name.green(),
            signature(&notification.params)
        ));
        out.push_str(&describe_params(&notification.params));

        FormattedString(out)
    }
}

impl From<TypeView<'_>> for FormattedString {
    fn from(TypeView(name, schema): TypeView<'_>) -> Self {
        let body = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());

        FormattedString(format!(
            "{} {} = {}",
            "type".cyan(),
            name.green(),
            body
        ))
    }
}

fn describe_header(description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => {
            format!("{}\n", format!("// {description}").dimmed())
        }
        _ => String::new(),
    }
}

fn signature(params: &[ParameterSchema]) -> String {
    params
        .iter()
        .map(|param| format!("{}: {}", param.name, type_label(&param.schema).yellow()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_params(params: &[ParameterSchema]) -> String {
    let mut out = String::new();

    for param in params {
        let required = if param.schema["required"] == Value::Bool(true) {
            format!(" {}", "(required)".red())
        } else {
            String::new()
        };

        let default = param
            .schema
            .get("default")
            .map(|default| format!(" = {default}"))
            .unwrap_or_default();

        out.push_str(&format!(
            "\n  {}: {}{}{}",
            param.name.green(),
            type_label(&param.schema).yellow(),
            default,
            required
        ));
    }

    out
}

/// A short human readable name for the type a schema describes.
fn type_label(schema: &Schema) -> String {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return reference.to_string();
    }

    match schema.get("type") {
        Some(Value::String(kind)) if kind == "array" => {
            let items = schema.get("items").map_or_else(|| "any".to_string(), type_label);
            format!("{items}[]")
        }
        Some(Value::String(kind)) => kind.clone(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .map(|kind| match kind {
                Value::String(kind) => kind.clone(),
                schema => type_label(schema),
            })
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_schemas() {
        assert_eq!(type_label(&json!({"type": "string"})), "string");
        assert_eq!(type_label(&json!({"$ref": "Player.Id"})), "Player.Id");
        assert_eq!(
            type_label(&json!({"type": "array", "items": {"$ref": "Demo.Property"}})),
            "Demo.Property[]"
        );
        assert_eq!(
            type_label(&json!({"type": ["null", {"$ref": "Player.Id"}]})),
            "null | Player.Id"
        );
        assert_eq!(type_label(&json!({})), "any");
    }
}
