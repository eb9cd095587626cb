//! Hayes-style modem driver for the buzzer line.
//!
//! The modem is used only to pick up a ringing line and pulse DTMF digits:
//!
//! ```text
//! Closed --initialize--> Idle --trigger_dial--> Triggering --hangup--> Idle
//!    \__________________________ write error ____________________/--> Failed
//! ```
//!
//! # Modules
//!
//! - [`dial`] - `DialSequence`, the validated digits-and-pauses string
//! - [`line`] - `ModemLine`, the command side and its state machine
//! - [`reader`] - line classification and the reader task feeding the service
//! - [`serial`] - opening the serial device

pub mod dial;
pub mod line;
pub mod reader;
pub mod serial;

pub use dial::{DialSequence, InvalidDialSequence};
pub use line::{ModemCommand, ModemLine, ModemState};
pub use reader::{classify_line, spawn_line_reader, LineEvent, ModemEvent};
pub use serial::open_serial;
