//! Label lookup by display name.

use tracing::info;

use awaybot_core::types::Label;

use crate::error::MailError;
use crate::traits::MailService;

/// Find a label by name (case-insensitive), or by id for system labels.
pub fn find_label<'a>(labels: &'a [Label], name: &str) -> Option<&'a Label> {
    labels
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name) || l.id == name)
}

/// Resolve a label name to its id, creating the label when it is missing
/// and `create` is set.
pub async fn resolve_label_id(
    service: &dyn MailService,
    name: &str,
    create: bool,
) -> Result<String, MailError> {
    let labels = service.list_labels().await?;
    if let Some(label) = find_label(&labels, name) {
        return Ok(label.id.clone());
    }

    if !create {
        return Err(MailError::Other(format!("label '{name}' not found")));
    }

    let label = service.create_label(name).await?;
    info!(name = %label.name, id = %label.id, "created label");
    Ok(label.id)
}
