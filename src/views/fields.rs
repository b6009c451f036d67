use std::sync::Arc;

use super::MonitorView;
use crate::bus::MonitorEvent;
use crate::models::Field;

pub const NO_FIELDS_MESSAGE: &str = "No fields found";

/// One line of the field list
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub field_id: String,
    pub name: String,
    pub area: String,
    pub crop: String,
}

impl FieldRow {
    pub fn display_text(&self) -> String {
        format!("{} | {} | {}", self.name, self.area, self.crop)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldListing {
    Empty(String),
    Rows(Vec<FieldRow>),
}

/// Projects a field list for display; an empty list is an explicit message.
pub fn display_fields(fields: &[Field]) -> FieldListing {
    if fields.is_empty() {
        return FieldListing::Empty(NO_FIELDS_MESSAGE.to_string());
    }
    FieldListing::Rows(
        fields
            .iter()
            .map(|f| FieldRow {
                field_id: f.field_id.clone(),
                name: f.display_name().to_string(),
                area: f.area_label(),
                crop: f.crop_label().to_string(),
            })
            .collect(),
    )
}

pub fn field_details(field: &Field) -> Vec<(&'static str, String)> {
    vec![
        ("Name", field.display_name().to_string()),
        ("Area", field.area_label()),
        ("Crop", field.crop_label().to_string()),
        ("Soil", field.soil_label().to_string()),
        ("Growth stage", field.growth_stage_label().to_string()),
    ]
}

/// Field list with a cursor, kept in step with the registry through events.
#[derive(Debug, Default)]
pub struct FieldListPanel {
    fields: Arc<Vec<Field>>,
    selected: Option<Field>,
    error: Option<String>,
    cursor: usize,
}

impl FieldListPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(&self) -> FieldListing {
        display_fields(&self.fields)
    }

    /// Load failure text; the previous list stays visible underneath.
    pub fn status(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("Failed to load fields: {}", e))
    }

    pub fn selected(&self) -> Option<&Field> {
        self.selected.as_ref()
    }

    pub fn cursor(&self) -> Option<usize> {
        if self.fields.is_empty() {
            None
        } else {
            Some(self.cursor.min(self.fields.len() - 1))
        }
    }

    pub fn field_under_cursor(&self) -> Option<&Field> {
        self.cursor().and_then(|i| self.fields.get(i))
    }

    pub fn next(&mut self) {
        if !self.fields.is_empty() {
            self.cursor = (self.cursor + 1) % self.fields.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.fields.is_empty() {
            self.cursor = match self.cursor {
                0 => self.fields.len() - 1,
                i => i.min(self.fields.len()) - 1,
            };
        }
    }
}

impl MonitorView for FieldListPanel {
    fn on_event(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::FieldsLoaded(fields) => {
                self.fields = Arc::clone(fields);
                self.error = None;
                if let Some(selected) = &self.selected {
                    self.selected = fields.iter().find(|f| f.field_id == selected.field_id).cloned();
                }
            }
            MonitorEvent::FieldsFailed(message) => self.error = Some(message.clone()),
            MonitorEvent::FieldSelected(field) => {
                if let Some(i) = self.fields.iter().position(|f| f.field_id == field.field_id) {
                    self.cursor = i;
                }
                self.selected = Some(field.clone());
            }
            MonitorEvent::SelectionCleared => self.selected = None,
            MonitorEvent::SignedOut => *self = Self::default(),
            _ => {}
        }
    }
}
