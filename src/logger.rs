//! # Acquisition session
//!
//! [`DataLogger`] owns one client, one compiled plan and an optional log
//! buffer, and runs the poll loop until it is cancelled or a tick fails.
//!
//! Shutdown is one-shot in both cases: whatever is buffered is flushed with
//! [`LogBuffer::flush_now`], the connection is closed, and `run` returns.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::ModbusClient;
use crate::error::DataLoggerError;
use crate::log_buffer::LogBuffer;
use crate::planner::ReadPlan;
use crate::poll::poll_once_with_delay;
use crate::value::Sample;

/// Poll loop over one Modbus connection.
pub struct DataLogger<C: ModbusClient> {
    client: C,
    plan: ReadPlan,
    buffer: Option<LogBuffer>,
    poll_interval: Duration,
    inter_request_delay: Option<Duration>,
}

impl<C: ModbusClient> DataLogger<C> {
    /// Session without data logging: samples are only handed to the caller.
    pub fn new(client: C, plan: ReadPlan, poll_interval: Duration) -> Self {
        Self {
            client,
            plan,
            buffer: None,
            poll_interval,
            inter_request_delay: None,
        }
    }

    pub fn with_log_buffer(mut self, buffer: LogBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_inter_request_delay(mut self, delay: Option<Duration>) -> Self {
        self.inter_request_delay = delay;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn plan(&self) -> &ReadPlan {
        &self.plan
    }

    pub fn buffer(&self) -> Option<&LogBuffer> {
        self.buffer.as_ref()
    }

    /// Poll once and buffer the resulting sample.
    pub async fn tick(&mut self) -> Result<Sample, DataLoggerError> {
        let sample = poll_once_with_delay(&mut self.client, &self.plan, self.inter_request_delay).await?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.append(sample.clone())?;
        }
        Ok(sample)
    }

    /// Run until `token` is cancelled or a tick fails.
    ///
    /// Returns the number of completed ticks.
    pub async fn run(&mut self, token: CancellationToken) -> Result<u64, DataLoggerError> {
        self.run_with(token, |_| {}).await
    }

    /// [`run`](Self::run), handing every sample to `on_sample`.
    ///
    /// Ticks start every `poll_interval`; a tick that overruns the interval
    /// is followed immediately by the next one. Cancellation interrupts the
    /// wait; an in-flight tick completes or fails before the shutdown flush.
    pub async fn run_with<F>(
        &mut self,
        token: CancellationToken,
        mut on_sample: F,
    ) -> Result<u64, DataLoggerError>
    where
        F: FnMut(&Sample) + Send,
    {
        info!(
            "Polling {} read groups every {:?}",
            self.plan.request_count(),
            self.poll_interval
        );
        let mut ticks = 0u64;

        let outcome = loop {
            if token.is_cancelled() {
                break Ok(());
            }
            let started = Instant::now();
            match self.tick().await {
                Ok(sample) => {
                    ticks += 1;
                    on_sample(&sample);
                }
                Err(e) => {
                    error!("Poll tick failed, stopping: {}", e);
                    break Err(e);
                }
            }

            let wait = self.poll_interval.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = token.cancelled() => break Ok(()),
                _ = sleep(wait) => {}
            }
        };

        info!("Stopping after {} ticks", ticks);
        let shutdown = self.shutdown().await;
        match (outcome, shutdown) {
            (Ok(()), Ok(())) => Ok(ticks),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(shutdown_error)) => {
                warn!("Shutdown after failed tick also failed: {}", shutdown_error);
                Err(e)
            }
        }
    }

    /// Flush and rotate the log, then close the connection.
    async fn shutdown(&mut self) -> Result<(), DataLoggerError> {
        let flushed = match self.buffer.as_mut() {
            Some(buffer) => buffer.flush_now().map(|rotated| {
                if let Some(path) = rotated {
                    info!("Final log file: {}", path.display());
                }
            }),
            None => Ok(()),
        };
        let closed = self.client.close().await;
        flushed?;
        closed?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{create_register_response, MockTransport};
    use crate::client::GenericModbusClient;
    use crate::error::ModbusError;
    use crate::log_buffer::{LogFormat, LogSettings};
    use crate::planner::TemplateRow;
    use crate::protocol::ModbusFunction;
    use crate::value::TagValue;
    use tempfile::TempDir;

    fn client_with(responses: usize) -> GenericModbusClient<MockTransport> {
        let mock = MockTransport::new();
        for i in 0..responses {
            mock.add_response(Ok(create_register_response(
                1,
                ModbusFunction::ReadHoldingRegisters,
                &[i as u16],
            )));
        }
        GenericModbusClient::new(mock, 1)
    }

    fn plan() -> ReadPlan {
        ReadPlan::compile(&[TemplateRow::new(0, "HR", "uint16", "level")])
    }

    fn buffer(dir: &TempDir) -> LogBuffer {
        LogBuffer::new(
            dir.path(),
            LogSettings {
                file_name: "session".to_string(),
                format: LogFormat::Csv,
                in_memory_records: 10,
                max_file_records: 100,
            },
        )
    }

    fn logged_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_flushes_and_closes() {
        let dir = TempDir::new().unwrap();
        let mut logger = DataLogger::new(client_with(10), plan(), Duration::from_secs(1))
            .with_log_buffer(buffer(&dir));

        let token = CancellationToken::new();
        let stopper = token.clone();
        let mut seen = 0;
        let ticks = logger
            .run_with(token, |_| {
                seen += 1;
                if seen == 3 {
                    stopper.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(ticks, 3);
        assert!(!logger.client().is_connected());
        assert_eq!(logger.buffer().unwrap().in_memory_count(), 0);

        let files = logged_files(&dir);
        assert_eq!(files.len(), 1);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_is_fatal_but_flushes() {
        let dir = TempDir::new().unwrap();
        let client = client_with(2);
        client
            .transport()
            .add_response(Err(ModbusError::connection("connection reset")));
        let mut logger =
            DataLogger::new(client, plan(), Duration::from_secs(1)).with_log_buffer(buffer(&dir));

        let err = logger.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DataLoggerError::Modbus(ref e) if e.is_connection_error()));
        assert!(!logger.client().is_connected());

        let files = logged_files(&dir);
        assert_eq!(files.len(), 1);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_tick_keeps_the_sample() {
        let dir = TempDir::new().unwrap();
        let rows = [
            TemplateRow::new(0, "HR", "uint16", "level"),
            TemplateRow::new(5, "HR", "uint16", "flow"),
        ];
        let plan = ReadPlan::compile(&rows);
        assert_eq!(plan.request_count(), 2);
        let mut logger = DataLogger::new(client_with(4), plan, Duration::from_secs(10))
            .with_inter_request_delay(Some(Duration::from_secs(1)))
            .with_log_buffer(buffer(&dir));

        // fires between the two reads of the first tick
        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            stopper.cancel();
        });

        let mut samples = Vec::new();
        let ticks = logger
            .run_with(token, |sample| samples.push(sample.clone()))
            .await
            .unwrap();

        assert_eq!(ticks, 1);
        assert_eq!(logger.client().transport().get_requests().len(), 2);
        assert_eq!(samples[0].get("flow"), Some(&TagValue::U16(1)));

        let files = logged_files(&dir);
        assert_eq!(files.len(), 1);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut logger = DataLogger::new(client_with(1), plan(), Duration::from_secs(1));
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(logger.run(token).await.unwrap(), 0);
        assert!(logger.client().transport().get_requests().is_empty());
    }
}
