//! Per-device runtime sessions

mod device;

pub use device::{DeviceSession, SessionTiming, TvState};
