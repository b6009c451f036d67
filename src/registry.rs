use std::sync::Arc;

use tracing::{info, warn};

use crate::client::FieldBackend;
use crate::error::{MonitorError, Result};
use crate::models::Field;

/// Owns the last-loaded field list and the single selected field.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: Arc<Vec<Field>>,
    selected: Option<Field>,
    last_error: Option<String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list with a fresh backend load. On failure the prior list is kept.
    pub async fn load_fields(&mut self, backend: &dyn FieldBackend) -> Result<Arc<Vec<Field>>> {
        match backend.list_fields().await {
            Ok(fields) => Ok(self.replace(fields)),
            Err(e) => {
                warn!("Failed to load fields: {}", e);
                self.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn replace(&mut self, fields: Vec<Field>) -> Arc<Vec<Field>> {
        info!("Loaded {} fields", fields.len());
        self.fields = Arc::new(fields);
        self.last_error = None;

        // A selected field is replaced by its refreshed copy, or dropped if gone
        if let Some(selected) = self.selected.take() {
            self.selected = self.find(&selected.field_id).cloned();
        }
        Arc::clone(&self.fields)
    }

    /// Looks `field_id` up in the last-loaded list and makes it the selection.
    pub fn select_field(&mut self, field_id: &str) -> Result<Field> {
        let field = self
            .find(field_id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(field_id.to_string()))?;
        self.selected = Some(field.clone());
        Ok(field)
    }

    pub fn clear_selection(&mut self) -> Option<Field> {
        self.selected.take()
    }

    pub fn find(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    pub fn fields(&self) -> &Arc<Vec<Field>> {
        &self.fields
    }

    pub fn selected(&self) -> Option<&Field> {
        self.selected.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_missing_field_is_not_found() {
        let mut registry = FieldRegistry::new();
        registry.replace(vec![Field::new("f1", "North Plot")]);
        assert_eq!(registry.select_field("f1").unwrap().name, "North Plot");
        assert!(registry.select_field("f9").unwrap_err().is_not_found());
        // Failed lookup leaves the selection alone
        assert_eq!(registry.selected().map(|f| f.field_id.as_str()), Some("f1"));
    }

    #[test]
    fn test_refresh_drops_vanished_selection() {
        let mut registry = FieldRegistry::new();
        registry.replace(vec![Field::new("f1", "North"), Field::new("f2", "South")]);
        registry.select_field("f2").unwrap();

        registry.replace(vec![Field::new("f2", "South (renamed)")]);
        assert_eq!(registry.selected().unwrap().name, "South (renamed)");

        registry.replace(vec![Field::new("f1", "North")]);
        assert!(registry.selected().is_none());
    }
}
