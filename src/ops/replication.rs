//! Replica sync compatibility shim.
//!
//! Answers CONFIG GET/SET over a fixed parameter set and PSYNC with a full
//! resync header plus an all-tenants snapshot. Nothing is streamed after
//! the snapshot and no consistency guarantee is made; this only lets
//! Redis-style tooling bootstrap a copy.

use crate::core::config::ReplicationConfig;
use crate::core::error::{CofferError, CofferResult};
use crate::snapshot::codec::SnapshotCodec;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Parameters visible through CONFIG GET/SET.
pub const CONFIG_PARAMS: [&str; 6] = [
    "dir",
    "dbfilename",
    "port",
    "replicaof",
    "master_replid",
    "master_repl_offset",
];

/// Reply to PSYNC.
#[derive(Debug, Clone)]
pub struct PsyncReply {
    /// `FULLRESYNC <replid> <offset>`.
    pub header: String,
    /// Full all-tenants snapshot.
    pub snapshot: Bytes,
}

#[derive(Debug, Clone)]
struct ReplicationParams {
    dir: String,
    dbfilename: String,
    port: String,
    replicaof: String,
    master_replid: String,
    master_repl_offset: u64,
}

/// CONFIG and PSYNC handler.
#[derive(Debug)]
pub struct ReplicationShim {
    params: RwLock<ReplicationParams>,
    codec: Arc<SnapshotCodec>,
}

impl ReplicationShim {
    /// Create the shim from configuration.
    pub fn new(config: &ReplicationConfig, codec: Arc<SnapshotCodec>) -> Self {
        Self {
            params: RwLock::new(ReplicationParams {
                dir: config.dir.clone(),
                dbfilename: config.dbfilename.clone(),
                port: config.port.clone(),
                replicaof: config.replicaof.clone(),
                master_replid: config.master_replid.clone(),
                master_repl_offset: 0,
            }),
            codec,
        }
    }

    /// Read a parameter.
    pub fn config_get(&self, param: &str) -> CofferResult<String> {
        let params = self.params.read();
        let value = match param {
            "dir" => params.dir.clone(),
            "dbfilename" => params.dbfilename.clone(),
            "port" => params.port.clone(),
            "replicaof" => params.replicaof.clone(),
            "master_replid" => params.master_replid.clone(),
            "master_repl_offset" => params.master_repl_offset.to_string(),
            other => return Err(unknown_param(other)),
        };
        Ok(value)
    }

    /// Write a parameter.
    pub fn config_set(&self, param: &str, value: &str) -> CofferResult<()> {
        let mut params = self.params.write();
        match param {
            "dir" => params.dir = value.to_string(),
            "dbfilename" => params.dbfilename = value.to_string(),
            "port" => params.port = value.to_string(),
            "replicaof" => params.replicaof = value.to_string(),
            "master_replid" => params.master_replid = value.to_string(),
            "master_repl_offset" => {
                params.master_repl_offset = value.parse().map_err(|_| {
                    CofferError::invalid_request(format!(
                        "master_repl_offset must be an integer, got '{}'",
                        value
                    ))
                })?
            }
            other => return Err(unknown_param(other)),
        }
        info!(param = %param, value = %value, "replication parameter set");
        Ok(())
    }

    /// Answer a replica's PSYNC with a full resync.
    pub fn psync(&self, replica_id: &str, offset: i64) -> CofferResult<PsyncReply> {
        let (replid, repl_offset) = {
            let params = self.params.read();
            (params.master_replid.clone(), params.master_repl_offset)
        };
        let snapshot = self.codec.export(None)?;
        info!(
            replica_id = %replica_id,
            requested_offset = offset,
            bytes = snapshot.len(),
            "full resync"
        );
        Ok(PsyncReply {
            header: format!("FULLRESYNC {} {}", replid, repl_offset),
            snapshot,
        })
    }
}

fn unknown_param(param: &str) -> CofferError {
    CofferError::invalid_request(format!("unknown config parameter '{}'", param))
}
