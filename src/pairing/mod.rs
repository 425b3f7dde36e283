//! Setup-time pairing
//!
//! Produces the device configuration for a new TV, running the PIN
//! exchange when the TV demands encrypted credentials.

mod flow;

pub use flow::{
    manual_entry_form, InputField, PairingFlow, PairingPhase, SetupError, SetupInput,
    SetupOutcome, UserInputRequest,
};
