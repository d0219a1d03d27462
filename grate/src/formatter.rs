use colored::*;
use grate_core::{
    catalog::CatalogEntry,
    path::BodyBinding,
    prost_reflect::{DynamicMessage, ReflectMessage},
};
use http::StatusCode;
use std::sync::Arc;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

/// The routes of a catalog, in matching order.
pub struct RouteTable(pub Vec<Arc<CatalogEntry>>);

/// The outcome of a transcoded call: the HTTP status and every JSON document of the body.
pub struct Exchange(pub StatusCode, pub Vec<serde_json::Value>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<DynamicMessage> for FormattedString {
    fn from(message: DynamicMessage) -> Self {
        let header = format!(
            "{} {}",
            "message".cyan(),
            message.descriptor().full_name().green()
        );
        match serde_json::to_string_pretty(&message) {
            Ok(json) => FormattedString(format!("{header}\n{json}")),
            Err(err) => FormattedString(format!(
                "{header}\n{} '{}'",
                "Failed to serialize:".red().bold(),
                err
            )),
        }
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}

impl From<Exchange> for FormattedString {
    fn from(Exchange(status, documents): Exchange) -> Self {
        let status_line = if status.is_success() {
            status.to_string().green().bold()
        } else {
            status.to_string().red().bold()
        };

        let mut out = format!("{} {}", "HTTP".cyan(), status_line);
        for document in documents {
            out.push('\n');
            out.push_str(&FormattedString::from(document).0);
        }
        FormattedString(out)
    }
}

impl From<RouteTable> for FormattedString {
    fn from(RouteTable(entries): RouteTable) -> Self {
        if entries.is_empty() {
            return FormattedString("No annotated methods found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Routes:\n");
        for entry in entries {
            out.push_str(&format!(
                "  {} {} {} {}",
                format!("{:<7}", entry.verb().as_str()).green(),
                entry.template().as_str(),
                "->".cyan(),
                entry.method().full_name().yellow()
            ));

            if entry.is_server_streaming() {
                out.push_str(&format!(" {}", "(stream)".cyan()));
            }

            let body = match entry.body() {
                None => None,
                Some(BodyBinding::WholeMessage) => Some(entry.method().input().full_name().to_string()),
                Some(BodyBinding::Field { path, list }) => Some(if *list {
                    format!("{path} (repeated)")
                } else {
                    path.to_string()
                }),
            };
            if let Some(body) = body {
                out.push_str(&format!("\n          {} {}", "body:".purple(), body));
            }

            if let Some(field) = entry.response_body() {
                out.push_str(&format!("\n          {} {}", "response:".purple(), field.name()));
            }
            out.push('\n');
        }
        FormattedString(out.trim_end().to_string())
    }
}
