use chrono::{DateTime, Utc};

use crate::api::{ModelInfo, ModelsResponse};
use crate::core::model::Model;

/// Convert a listing response into installed models, newest first.
pub fn installed_models(response: ModelsResponse) -> Vec<Model> {
    let mut models: Vec<Model> = response
        .models
        .into_iter()
        .filter(|info| !info.name.trim().is_empty())
        .map(to_model)
        .collect();
    sort_models(&mut models);
    models
}

fn to_model(info: ModelInfo) -> Model {
    let modified_at = info
        .modified_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let details = info.details.unwrap_or_default();
    Model {
        name: info.name,
        size: info.size,
        modified_at,
        installed: true,
        family: details.family,
        format: details.format,
        parameter_size: details.parameter_size,
    }
}

pub fn sort_models(models: &mut [Model]) {
    // Newest first; models without a timestamp sort after dated ones, by name.
    models.sort_by(|a, b| match (&a.modified_at, &b.modified_at) {
        (Some(a_modified), Some(b_modified)) => b_modified
            .cmp(a_modified)
            .then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
}
