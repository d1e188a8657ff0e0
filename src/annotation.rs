use serde_json::{json, Map, Value};

const METRIC_WIDGET: &str = "metric";

/// A time marker to draw on every metric graph of a dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Point { label: String, at: String },
    Range { label: String, start: String, end: String },
}

impl Marker {
    /// Range when `end` is given, single point otherwise. Timestamps are
    /// expected to be normalized already.
    pub fn new(label: impl Into<String>, start: String, end: Option<String>) -> Self {
        let label = label.into();
        match end {
            Some(end) => Marker::Range { label, start, end },
            None => Marker::Point { label, at: start },
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Marker::Point { label, .. } | Marker::Range { label, .. } => label,
        }
    }

    /// The element appended to each `vertical` list.
    ///
    /// A range is a single element holding the START/END pair, which the
    /// dashboard renders as a band between the two times.
    pub fn payload(&self) -> Value {
        match self {
            Marker::Point { label, at } => json!({ "label": label, "value": at }),
            Marker::Range { label, start, end } => json!([
                { "label": format!("START {label}"), "value": start },
                { "label": format!("END {label}"), "value": end },
            ]),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dashboard body is not a JSON object")]
    NotAnObject,
    #[error("`widgets` is missing or not an array")]
    MissingWidgets,
    #[error("widget {index}: `{field}` is not {expected}")]
    UnexpectedShape {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug)]
pub struct Merged {
    pub document: Value,
    /// Number of metric widgets that received the marker.
    pub annotated: usize,
}

pub fn parse_document(body: &str) -> Result<Value, DocumentError> {
    let document: Value = serde_json::from_str(body)?;
    if !document.is_object() {
        return Err(DocumentError::NotAnObject);
    }
    Ok(document)
}

/// Appends `marker` to the vertical annotations of every metric widget.
///
/// Everything else in the document, including non-metric widgets and
/// existing annotations, is left as it was.
pub fn merge(mut document: Value, marker: &Marker) -> Result<Merged, DocumentError> {
    let payload = marker.payload();
    let widgets = document
        .as_object_mut()
        .ok_or(DocumentError::NotAnObject)?
        .get_mut("widgets")
        .and_then(Value::as_array_mut)
        .ok_or(DocumentError::MissingWidgets)?;

    let mut annotated = 0;
    for (index, widget) in widgets.iter_mut().enumerate() {
        let Some(widget) = widget.as_object_mut() else {
            continue;
        };
        if widget.get("type").and_then(Value::as_str) != Some(METRIC_WIDGET) {
            continue;
        }

        vertical_annotations(widget, index)?.push(payload.clone());
        annotated += 1;
    }

    tracing::debug!(annotated, label = marker.label(), "merged marker into widgets");
    Ok(Merged { document, annotated })
}

fn vertical_annotations(
    widget: &mut Map<String, Value>,
    index: usize,
) -> Result<&mut Vec<Value>, DocumentError> {
    let properties = child_object(widget, "properties", index)?;
    let annotations = child_object(properties, "annotations", index)?;
    annotations
        .entry("vertical")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or(DocumentError::UnexpectedShape {
            index,
            field: "vertical",
            expected: "an array",
        })
}

fn child_object<'a>(
    parent: &'a mut Map<String, Value>,
    field: &'static str,
    index: usize,
) -> Result<&'a mut Map<String, Value>, DocumentError> {
    parent
        .entry(field)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(DocumentError::UnexpectedShape {
            index,
            field,
            expected: "an object",
        })
}
