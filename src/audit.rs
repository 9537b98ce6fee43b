//! Contribution audit trail: who changed which contact, how, and when.

use std::fmt;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;

/// What a resolver write did to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionAction {
    /// A new contact was created
    Created,
    /// The actor was linked to an existing contact
    Linked,
    /// The actor already owned the matched contact
    AlreadyLinked,
}

impl ContributionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionAction::Created => "created",
            ContributionAction::Linked => "linked",
            ContributionAction::AlreadyLinked => "already_linked",
        }
    }
}

impl fmt::Display for ContributionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub contribution_id: String,
    pub actor_id: String,
    pub contact_id: i64,
    pub action: String,
    pub changes_json: Option<String>,
    pub created_at: String,
}

/// Record a contribution on an open connection (usually inside the
/// resolver's transaction). Returns the generated contribution id.
pub fn record_contribution(
    conn: &Connection,
    actor_id: &str,
    contact_id: i64,
    action: ContributionAction,
    changes: &serde_json::Value,
) -> Result<String> {
    let contribution_id = Uuid::new_v4().to_string();
    conn.execute(
        r#"
        INSERT INTO contributions (
            contribution_id, actor_id, contact_id, action, changes_json, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            contribution_id,
            actor_id,
            contact_id,
            action.as_str(),
            changes.to_string(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(contribution_id)
}

/// Contributions for one contact, oldest first.
pub async fn list_contributions(db: &Db, contact_id: i64) -> Result<Vec<Contribution>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT contribution_id, actor_id, contact_id, action, changes_json, created_at \
             FROM contributions WHERE contact_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![contact_id], |row| {
                Ok(Contribution {
                    contribution_id: row.get(0)?,
                    actor_id: row.get(1)?,
                    contact_id: row.get(2)?,
                    action: row.get(3)?,
                    changes_json: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    })
    .await
}
