use std::env;

use ipc::StatusResponse;

use crate::status_provider::StatusSnapshot;

/// Build a StatusResponse from a provider snapshot.
pub fn make_status_response(id: uuid::Uuid, snap: StatusSnapshot) -> StatusResponse {
    StatusResponse {
        id,
        index_entries: snap.index.entries as u64,
        dimension: snap.index.dimension.map(|d| d as u32),
        index_location: snap.index.location,
        provider: snap.index.provider,
        last_reload_ts: snap.index.last_reload_ts,
        metrics: snap.metrics,
        served_by: Some(host_label()),
    }
}

pub(crate) fn host_label() -> String {
    env::var("COMPUTERNAME")
        .or_else(|_| env::var("HOSTNAME"))
        .unwrap_or_else(|_| "logsightd".into())
}
