//! Serial device access.

use crate::errors::DcError;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{error, info};

/// Open the modem's serial device at `baud_rate`, 8 data bits, no parity,
/// one stop bit.
pub fn open_serial(path: &str, baud_rate: u32) -> Result<SerialStream, DcError> {
    let stream = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| {
            error!(target: "dc.modem", path = %path, error = %e, "Failed to open serial device");
            DcError::Device(format!("cannot open {path}: {e}"))
        })?;

    info!(target: "dc.modem", path = %path, baud_rate, "Serial device opened");
    Ok(stream)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_device_is_a_device_error() {
        let result = open_serial("/dev/door-controller-test-does-not-exist", 115_200);
        let err = result.err().expect("opening a missing device must fail");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("does-not-exist"));
    }
}
