//! Admin console commands.
//!
//! Each invocation starts with an empty queue cache, so read commands
//! refresh what they print.

use std::collections::BTreeMap;
use std::path::PathBuf;

use realty_client::{Attachment, PhaseDraft, Portal, RefreshOutcome};
use realty_core::{EntityId, EntityKind, QueueId};

fn describe(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Updated { count } => format!("{count} entities"),
        RefreshOutcome::Skipped => "skipped (not signed into the admin console)".to_string(),
        RefreshOutcome::Failed(message) => format!("failed: {message}"),
        RefreshOutcome::Expired => "session expired".to_string(),
        RefreshOutcome::Discarded => "discarded".to_string(),
    }
}

pub async fn refresh(portal: &Portal, queues: &[QueueId]) -> Result<(), Box<dyn std::error::Error>> {
    let outcomes = if queues.is_empty() {
        portal.console().refresh_all().await
    } else {
        portal.console().refresh_many(queues).await
    };
    for (queue, outcome) in &outcomes {
        println!("{queue}: {}", describe(outcome));
    }
    Ok(())
}

pub async fn show_queue(portal: &Portal, queue: QueueId) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = portal.console().refresh(queue).await;
    if !outcome.is_updated() {
        return Err(format!("{queue}: {}", describe(&outcome)).into());
    }
    super::print_json(&portal.console().queue(queue).await)?;
    Ok(())
}

pub async fn stats(portal: &Portal) -> Result<(), Box<dyn std::error::Error>> {
    portal.console().refresh_all().await;
    super::print_json(&portal.console().stats().await)?;
    Ok(())
}

pub async fn company_stats(portal: &Portal) -> Result<(), Box<dyn std::error::Error>> {
    let stats = portal.console().company_statistics().await?;
    super::print_json(&stats)?;
    Ok(())
}

pub async fn documents(
    portal: &Portal,
    kind: EntityKind,
    id: EntityId,
) -> Result<(), Box<dyn std::error::Error>> {
    let documents = portal.console().fetch_documents(kind, id).await?;
    super::print_json(&documents)?;
    Ok(())
}

pub async fn approve(
    portal: &Portal,
    kind: EntityKind,
    id: EntityId,
    notes: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    portal.console().approve(kind, id, notes).await?;
    Ok(())
}

pub async fn reject(
    portal: &Portal,
    kind: EntityKind,
    id: EntityId,
    reason: &str,
    details: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    portal.console().reject(kind, id, reason, details).await?;
    Ok(())
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn mime_for(path: &std::path::Path) -> Option<String> {
    let mime = match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

pub async fn add_phase(
    portal: &Portal,
    project: EntityId,
    name: String,
    description: Option<String>,
    fields: &[String],
    files: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = fields
        .iter()
        .map(|raw| parse_field(raw))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let mut attachments = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        attachments.push(Attachment {
            field_name: "files".to_string(),
            file_name,
            mime_type: mime_for(path),
            bytes,
        });
    }

    let draft = PhaseDraft {
        name,
        description,
        fields,
        attachments,
    };
    portal.console().create_project_phase(project, draft).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("floors=12"),
            Ok(("floors".to_string(), "12".to_string()))
        );
        assert_eq!(
            parse_field("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_field("=x").is_err());
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(
            mime_for(std::path::Path::new("plan.PDF")).as_deref(),
            Some("application/pdf")
        );
        assert_eq!(mime_for(std::path::Path::new("notes")), None);
    }
}
