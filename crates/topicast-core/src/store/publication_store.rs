use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::PipelineError;
use crate::models::ContentChannel;
use crate::publish::{Platform, PublishReceipt};

/// A content item that was pushed to an external platform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub id: String,
    pub session_id: String,
    pub channel: String,
    pub item_index: usize,
    pub platform: String,
    pub post_id: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

pub struct PublicationStore {
    db: Database,
}

impl PublicationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        session_id: &str,
        channel: ContentChannel,
        item_index: usize,
        platform: Platform,
        receipt: &PublishReceipt,
    ) -> Result<Publication, PipelineError> {
        let publication = Publication {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            channel: channel.as_str().to_string(),
            item_index,
            platform: platform.as_str().to_string(),
            post_id: receipt.post_id.clone(),
            url: receipt.url.clone(),
            published_at: receipt.published_at,
        };
        let p = publication.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO publications
                        (id, session_id, channel, item_index, platform, post_id, url, published_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        p.id,
                        p.session_id,
                        p.channel,
                        p.item_index as i64,
                        p.platform,
                        p.post_id,
                        p.url,
                        p.published_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(publication)
    }

    pub async fn list_for_session(&self, session_id: &str) -> Result<Vec<Publication>, PipelineError> {
        let id = session_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, channel, item_index, platform, post_id, url, published_at
                     FROM publications WHERE session_id = ?1 ORDER BY published_at ASC",
                )?;
                let rows = stmt
                    .query_map([&id], |row| {
                        let published_at: i64 = row.get(7)?;
                        Ok(Publication {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            channel: row.get(2)?,
                            item_index: row.get::<_, i64>(3)? as usize,
                            platform: row.get(4)?,
                            post_id: row.get(5)?,
                            url: row.get(6)?,
                            published_at: Utc
                                .timestamp_millis_opt(published_at)
                                .single()
                                .unwrap_or_else(Utc::now),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checkpoint, ResearchState};
    use crate::store::CheckpointStore;
    use crate::workflow::NodeId;

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::open_in_memory().unwrap();
        let checkpoints = CheckpointStore::new(db.clone());
        checkpoints
            .save(&Checkpoint::new("s1".to_string(), ResearchState::new("t"), NodeId::End))
            .await
            .unwrap();

        let store = PublicationStore::new(db);
        let receipt = PublishReceipt {
            post_id: "1789".to_string(),
            url: Some("https://x.com/i/web/status/1789".to_string()),
            published_at: Utc::now(),
        };
        store
            .record("s1", ContentChannel::ShortForm, 3, Platform::X, &receipt)
            .await
            .unwrap();

        let rows = store.list_for_session("s1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].post_id, "1789");
        assert_eq!(rows[0].item_index, 3);
        assert_eq!(rows[0].platform, "x");
        assert_eq!(rows[0].channel, "short_form");
    }
}
