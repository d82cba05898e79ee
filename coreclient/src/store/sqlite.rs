// SPDX-FileCopyrightText: 2026 DNA Messenger Contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A [`Store`] backed by `sqlx::SqlitePool`.
//!
//! Uses runtime `sqlx::query`/`.bind()` rather than the `query!`/`query_as!`
//! compile-time macros, which require a reachable `DATABASE_URL` or a
//! checked-in `.sqlx` offline cache generated by actually running the
//! crate's test suite against a live database (see DESIGN.md).

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use dna_common::Fingerprint;

use super::{ContactRecord, Store, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spillway_send_seq (
                peer TEXT PRIMARY KEY,
                seq INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spillway_recv_seq (
                peer TEXT PRIMARY KEY,
                seq INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_recv_seq (
                group_uuid TEXT NOT NULL,
                sender TEXT NOT NULL,
                seq INTEGER NOT NULL,
                PRIMARY KEY (group_uuid, sender)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                group_uuid TEXT PRIMARY KEY,
                blob BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gsk_table (
                group_uuid TEXT NOT NULL,
                version INTEGER NOT NULL,
                blob BLOB NOT NULL,
                PRIMARY KEY (group_uuid, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                fingerprint TEXT PRIMARY KEY,
                note TEXT,
                added_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                fingerprint TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dismissed_requests (
                fingerprint TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                peer TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                outgoing INTEGER NOT NULL,
                plaintext BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn fp_hex(fp: Fingerprint) -> String {
    fp.to_hex()
}

fn parse_fp(s: &str) -> Result<Fingerprint, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid fingerprint {s}")))
}

#[async_trait]
impl Store for SqliteStore {
    async fn incr_send_seq(&self, peer: Fingerprint) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let peer_hex = fp_hex(peer);
        let current: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM spillway_send_seq WHERE peer = ?")
                .bind(&peer_hex)
                .fetch_optional(&mut *tx)
                .await?;
        let next = current.unwrap_or(0) + 1;
        sqlx::query(
            "INSERT INTO spillway_send_seq (peer, seq) VALUES (?, ?)
             ON CONFLICT(peer) DO UPDATE SET seq = excluded.seq",
        )
        .bind(&peer_hex)
        .bind(next)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(next as u64)
    }

    async fn get_recv_seq(&self, peer: Fingerprint) -> Result<u64, StoreError> {
        let seq: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM spillway_recv_seq WHERE peer = ?")
                .bind(fp_hex(peer))
                .fetch_optional(&self.pool)
                .await?;
        Ok(seq.unwrap_or(0) as u64)
    }

    async fn set_recv_seq(&self, peer: Fingerprint, seq: u64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO spillway_recv_seq (peer, seq) VALUES (?, ?)
             ON CONFLICT(peer) DO UPDATE SET seq = excluded.seq",
        )
        .bind(fp_hex(peer))
        .bind(seq as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_group_recv_seq(&self, group: Uuid, sender: Fingerprint) -> Result<u64, StoreError> {
        let seq: Option<i64> = sqlx::query_scalar(
            "SELECT seq FROM group_recv_seq WHERE group_uuid = ? AND sender = ?",
        )
        .bind(group.to_string())
        .bind(fp_hex(sender))
        .fetch_optional(&self.pool)
        .await?;
        Ok(seq.unwrap_or(0) as u64)
    }

    async fn set_group_recv_seq(
        &self,
        group: Uuid,
        sender: Fingerprint,
        seq: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_recv_seq (group_uuid, sender, seq) VALUES (?, ?, ?)
             ON CONFLICT(group_uuid, sender) DO UPDATE SET seq = excluded.seq",
        )
        .bind(group.to_string())
        .bind(fp_hex(sender))
        .bind(seq as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_group_blob(&self, group: Uuid, bytes: Vec<u8>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO groups (group_uuid, blob) VALUES (?, ?)
             ON CONFLICT(group_uuid) DO UPDATE SET blob = excluded.blob",
        )
        .bind(group.to_string())
        .bind(bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_group_blob(&self, group: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT blob FROM groups WHERE group_uuid = ?")
            .bind(group.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("blob")))
    }

    async fn list_group_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query("SELECT group_uuid FROM groups")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                let s: String = r.get("group_uuid");
                Uuid::parse_str(&s).map_err(|_| StoreError::Corrupt(format!("invalid uuid {s}")))
            })
            .collect()
    }

    async fn put_gsk_blob(&self, group: Uuid, version: u32, blob: Vec<u8>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO gsk_table (group_uuid, version, blob) VALUES (?, ?, ?)
             ON CONFLICT(group_uuid, version) DO UPDATE SET blob = excluded.blob",
        )
        .bind(group.to_string())
        .bind(version as i64)
        .bind(blob)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_gsk_blob(&self, group: Uuid, version: u32) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT blob FROM gsk_table WHERE group_uuid = ? AND version = ?")
            .bind(group.to_string())
            .bind(version as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("blob")))
    }

    async fn max_gsk_version(&self, group: Uuid) -> Result<Option<u32>, StoreError> {
        let v: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM gsk_table WHERE group_uuid = ?")
                .bind(group.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(v.map(|v| v as u32))
    }

    async fn list_gsk_versions(&self, group: Uuid) -> Result<Vec<u32>, StoreError> {
        let rows = sqlx::query("SELECT version FROM gsk_table WHERE group_uuid = ?")
            .bind(group.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("version") as u32).collect())
    }

    async fn add_contact(
        &self,
        fp: Fingerprint,
        note: Option<String>,
        added_at: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO contacts (fingerprint, note, added_at) VALUES (?, ?, ?)
             ON CONFLICT(fingerprint) DO UPDATE SET note = excluded.note, added_at = excluded.added_at",
        )
        .bind(fp_hex(fp))
        .bind(note)
        .bind(added_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_contact(&self, fp: Fingerprint) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM contacts WHERE fingerprint = ?")
            .bind(fp_hex(fp))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_contact(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM contacts WHERE fingerprint = ?")
            .bind(fp_hex(fp))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, StoreError> {
        let rows = sqlx::query("SELECT fingerprint, note, added_at FROM contacts")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                let fp_s: String = r.get("fingerprint");
                Ok(ContactRecord {
                    fingerprint: parse_fp(&fp_s)?,
                    note: r.get::<Option<String>, _>("note"),
                    added_at: r.get::<i64, _>("added_at") as u64,
                })
            })
            .collect()
    }

    async fn block(&self, fp: Fingerprint) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO blocks (fingerprint) VALUES (?)")
            .bind(fp_hex(fp))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unblock(&self, fp: Fingerprint) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blocks WHERE fingerprint = ?")
            .bind(fp_hex(fp))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_blocked(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM blocks WHERE fingerprint = ?")
            .bind(fp_hex(fp))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn dismiss_request(&self, fp: Fingerprint) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO dismissed_requests (fingerprint) VALUES (?)")
            .bind(fp_hex(fp))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_dismissed(&self, fp: Fingerprint) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM dismissed_requests WHERE fingerprint = ?")
            .bind(fp_hex(fp))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn save_message(
        &self,
        peer: Fingerprint,
        timestamp: u64,
        outgoing: bool,
        plaintext: Vec<u8>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (peer, timestamp, outgoing, plaintext) VALUES (?, ?, ?, ?)",
        )
        .bind(fp_hex(peer))
        .bind(timestamp as i64)
        .bind(outgoing)
        .bind(plaintext)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes(&[b; 64]).unwrap()
    }

    #[tokio::test]
    async fn send_seq_persists_across_calls() {
        let store = store().await;
        let peer = fp(9);
        assert_eq!(store.incr_send_seq(peer).await.unwrap(), 1);
        assert_eq!(store.incr_send_seq(peer).await.unwrap(), 2);
        assert_eq!(store.get_recv_seq(peer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn group_blob_round_trip() {
        let store = store().await;
        let group = Uuid::new_v4();
        assert_eq!(store.load_group_blob(group).await.unwrap(), None);
        store.save_group_blob(group, vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.load_group_blob(group).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.list_group_ids().await.unwrap(), vec![group]);
    }

    #[tokio::test]
    async fn gsk_versions_and_dismissal_round_trip() {
        let store = store().await;
        let group = Uuid::new_v4();
        store.put_gsk_blob(group, 1, vec![1]).await.unwrap();
        store.put_gsk_blob(group, 2, vec![2]).await.unwrap();
        let mut versions = store.list_gsk_versions(group).await.unwrap();
        versions.sort_unstable();
        assert_eq!(versions, vec![1, 2]);

        let proposer = fp(3);
        assert!(!store.is_dismissed(proposer).await.unwrap());
        store.dismiss_request(proposer).await.unwrap();
        assert!(store.is_dismissed(proposer).await.unwrap());
    }

    #[tokio::test]
    async fn contacts_list_round_trip() {
        let store = store().await;
        let a = fp(1);
        let b = fp(2);
        store.add_contact(a, None, 10).await.unwrap();
        store.add_contact(b, Some("note".into()), 20).await.unwrap();
        let mut contacts = store.list_contacts().await.unwrap();
        contacts.sort_by_key(|c| c.added_at);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[1].note.as_deref(), Some("note"));
    }
}
