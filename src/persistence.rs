use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;

use crate::nested_set::TreeNode;
use crate::results::AnalysisResult;

/// SQLite store for flattened trees and their aggregate results
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = ResultStore { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = ResultStore { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_nodes (
                dfrc_id INTEGER NOT NULL,
                cfg_id TEXT NOT NULL,
                lft INTEGER NOT NULL,
                rgt INTEGER NOT NULL,
                move TEXT NOT NULL,
                cpl INTEGER,
                mate INTEGER,
                pv BLOB,
                PRIMARY KEY (dfrc_id, cfg_id, lft)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                dfrc_id INTEGER NOT NULL,
                cfg_id TEXT NOT NULL,
                white_id INTEGER NOT NULL,
                black_id INTEGER NOT NULL,
                white TEXT NOT NULL,
                black TEXT NOT NULL,
                analyzer TEXT NOT NULL,
                threads INTEGER NOT NULL,
                hash_size INTEGER NOT NULL,
                starting_pos_cpl INTEGER,
                starting_pos_mate INTEGER,
                white_sharpness REAL,
                black_sharpness REAL,
                total_sharpness REAL,
                balance_score REAL NOT NULL,
                playability_score REAL,
                mirrored INTEGER NOT NULL,
                flipped INTEGER NOT NULL,
                swapped_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (dfrc_id, cfg_id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tree_nodes_rgt ON tree_nodes(dfrc_id, cfg_id, rgt)",
            [],
        )?;

        Ok(())
    }

    /// Replace the stored tree of every `(dfrc_id, cfg_id)` present in `nodes`.
    pub fn save_tree(&self, nodes: &[TreeNode]) -> SqlResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut cleared: Vec<(u32, &str)> = Vec::new();
            let mut delete = tx.prepare("DELETE FROM tree_nodes WHERE dfrc_id = ?1 AND cfg_id = ?2")?;
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO tree_nodes (dfrc_id, cfg_id, lft, rgt, move, cpl, mate, pv)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for node in nodes {
                let key = (node.dfrc_id, node.cfg_id.as_str());
                if !cleared.contains(&key) {
                    delete.execute(params![node.dfrc_id, node.cfg_id])?;
                    cleared.push(key);
                }

                let pv_bytes = node
                    .pv
                    .as_ref()
                    .map(bincode::serialize)
                    .transpose()
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

                insert.execute(params![
                    node.dfrc_id,
                    node.cfg_id,
                    node.lft,
                    node.rgt,
                    node.mv,
                    node.cpl,
                    node.mate,
                    pv_bytes
                ])?;
            }
        }
        tx.commit()
    }

    /// Stored tree rows ordered by `lft`
    pub fn load_tree(&self, dfrc_id: u32, cfg_id: &str) -> SqlResult<Vec<TreeNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT dfrc_id, cfg_id, lft, rgt, move, cpl, mate, pv
             FROM tree_nodes WHERE dfrc_id = ?1 AND cfg_id = ?2 ORDER BY lft",
        )?;

        let rows = stmt.query_map(params![dfrc_id, cfg_id], |row| {
            let pv = match row.get::<_, Option<Vec<u8>>>(7)? {
                Some(bytes) => Some(bincode::deserialize(&bytes).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Blob, Box::new(e))
                })?),
                None => None,
            };

            Ok(TreeNode {
                dfrc_id: row.get(0)?,
                cfg_id: row.get(1)?,
                lft: row.get(2)?,
                rgt: row.get(3)?,
                mv: row.get(4)?,
                cpl: row.get(5)?,
                mate: row.get(6)?,
                pv,
            })
        })?;

        rows.collect()
    }

    pub fn save_result(&self, result: &AnalysisResult) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO analysis_results (
                dfrc_id, cfg_id, white_id, black_id, white, black, analyzer, threads, hash_size,
                starting_pos_cpl, starting_pos_mate, white_sharpness, black_sharpness,
                total_sharpness, balance_score, playability_score, mirrored, flipped,
                swapped_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                result.dfrc_id,
                result.cfg_id,
                result.white_id,
                result.black_id,
                result.white,
                result.black,
                result.analyzer,
                result.threads,
                result.hash_size,
                result.starting_pos_cpl,
                result.starting_pos_mate,
                result.white_sharpness,
                result.black_sharpness,
                result.total_sharpness,
                result.balance_score,
                result.playability_score,
                result.mirrored,
                result.flipped,
                result.swapped_id,
                result.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn load_result(&self, dfrc_id: u32, cfg_id: &str) -> SqlResult<Option<AnalysisResult>> {
        self.conn
            .query_row(
                "SELECT dfrc_id, cfg_id, white_id, black_id, white, black, analyzer, threads,
                        hash_size, starting_pos_cpl, starting_pos_mate, white_sharpness,
                        black_sharpness, total_sharpness, balance_score, playability_score,
                        mirrored, flipped, swapped_id, created_at
                 FROM analysis_results WHERE dfrc_id = ?1 AND cfg_id = ?2",
                params![dfrc_id, cfg_id],
                result_from_row,
            )
            .optional()
    }

    pub fn result_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM analysis_results", [], |row| row.get(0))
    }
}

fn result_from_row(row: &Row<'_>) -> SqlResult<AnalysisResult> {
    let created_at: String = row.get(19)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(AnalysisResult {
        dfrc_id: row.get(0)?,
        cfg_id: row.get(1)?,
        white_id: row.get(2)?,
        black_id: row.get(3)?,
        white: row.get(4)?,
        black: row.get(5)?,
        analyzer: row.get(6)?,
        threads: row.get(7)?,
        hash_size: row.get(8)?,
        starting_pos_cpl: row.get(9)?,
        starting_pos_mate: row.get(10)?,
        white_sharpness: row.get(11)?,
        black_sharpness: row.get(12)?,
        total_sharpness: row.get(13)?,
        balance_score: row.get(14)?,
        playability_score: row.get(15)?,
        mirrored: row.get(16)?,
        flipped: row.get(17)?,
        swapped_id: row.get(18)?,
        created_at,
    })
}
