//! Poll cycle: one tick of the acquisition loop.

use std::time::Duration;

use tracing::debug;

use crate::client::ModbusClient;
use crate::codec::interpret;
use crate::error::ModbusResult;
use crate::planner::{AddressTable, ReadPlan};
use crate::value::Sample;

/// Read every group of `plan` once and merge the results into one sample.
///
/// Groups are issued function code by function code (FC01 to FC04) and in
/// plan order within a code. The first failing read aborts the tick, so a
/// partial sample is never returned. An empty plan yields a sample holding
/// only the timestamps.
pub async fn poll_once<C: ModbusClient>(client: &mut C, plan: &ReadPlan) -> ModbusResult<Sample> {
    poll_once_with_delay(client, plan, None).await
}

/// [`poll_once`] with an optional pause between consecutive requests.
pub async fn poll_once_with_delay<C: ModbusClient>(
    client: &mut C,
    plan: &ReadPlan,
    inter_request_delay: Option<Duration>,
) -> ModbusResult<Sample> {
    let mut sample = Sample::now();
    let empty = AddressTable::new();

    for (index, (function, group)) in plan.iter_groups().enumerate() {
        if index > 0 {
            if let Some(delay) = inter_request_delay {
                tokio::time::sleep(delay).await;
            }
        }

        let raw = client
            .read(function, group.start_address, group.register_count)
            .await?;
        debug!(
            "{} start={} count={} -> {} values",
            function.label(),
            group.start_address,
            group.register_count,
            raw.len()
        );

        let table = plan.address_table(function).unwrap_or(&empty);
        sample.merge(interpret(&raw, function, group.start_address, table));
    }

    Ok(sample)
}
