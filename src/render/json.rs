//! JSON renderer: structured output for tooling integration.
//!
//! Serializes the entity model directly; key order follows the model.

use crate::error::EmitError;
use crate::model::DocumentedEntity;
use crate::render::{RenderContext, Renderer};

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_entity(
        &self,
        entity: &DocumentedEntity,
        _ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let mut out = serde_json::to_string_pretty(entity).map_err(|e| EmitError::Serialize {
            symbol: entity.name.clone(),
            source: e,
        })?;
        out.push('\n');
        Ok(out)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
