//! Link back to the physical device.
//!
//! Every processed line is echoed to the device, which must acknowledge it
//! within a bounded time.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::errors::DeviceError;

/// Default wait for a device acknowledgement
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Acknowledgement token the device sends back
pub const ACK: &str = "OK";

#[async_trait]
pub trait DeviceLink: Send {
    /// Write one line to the device
    async fn send(&mut self, line: &str) -> anyhow::Result<()>;

    /// Wait for the next acknowledgement line
    async fn recv_ack(&mut self) -> anyhow::Result<String>;
}

/// Echo `line` and wait up to `timeout` for the device to acknowledge it
pub async fn echo_with_ack(
    device: &mut dyn DeviceLink,
    line: &str,
    timeout: Duration,
) -> Result<(), DeviceError> {
    device.send(line).await?;

    let ack = tokio::time::timeout(timeout, device.recv_ack())
        .await
        .map_err(|_| DeviceError::AckTimeout(timeout))??;

    if ack.trim() != ACK {
        return Err(DeviceError::UnexpectedAck {
            sent: line.to_string(),
            got: ack,
        });
    }
    Ok(())
}

/// Device link for deployments without a writable port. Lines are logged
/// and acknowledged immediately.
#[derive(Debug, Default)]
pub struct LoggingDevice {
    sent: u64,
}

impl LoggingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[async_trait]
impl DeviceLink for LoggingDevice {
    async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.sent += 1;
        debug!("device <<< {}", line);
        Ok(())
    }

    async fn recv_ack(&mut self) -> anyhow::Result<String> {
        Ok(ACK.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl DeviceLink for Silent {
        async fn send(&mut self, _line: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn recv_ack(&mut self) -> anyhow::Result<String> {
            std::future::pending().await
        }
    }

    struct Garbled;

    #[async_trait]
    impl DeviceLink for Garbled {
        async fn send(&mut self, _line: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn recv_ack(&mut self) -> anyhow::Result<String> {
            Ok("NAK".to_string())
        }
    }

    #[tokio::test]
    async fn test_logging_device_acks() {
        let mut device = LoggingDevice::new();
        echo_with_ack(&mut device, "*X;2", DEFAULT_ACK_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(device.sent(), 1);
    }

    #[tokio::test]
    async fn test_ack_timeout() {
        let result = echo_with_ack(&mut Silent, "*X;2", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(DeviceError::AckTimeout(_))));
    }

    #[tokio::test]
    async fn test_unexpected_ack() {
        let result = echo_with_ack(&mut Garbled, "*X;2", DEFAULT_ACK_TIMEOUT).await;
        assert!(matches!(result, Err(DeviceError::UnexpectedAck { .. })));
    }
}
