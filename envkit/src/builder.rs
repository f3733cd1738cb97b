//! Consuming a builder's control channel.
//!
//! [`attach_builder`] forwards plain output and executes tagged invocations
//! through the capability facade. [`read_builder`] only collects text.

use tracing::{debug, instrument};

use crate::app::Application;
use crate::core::capability::{Capability, DisplayStyle};
use crate::core::protocol::ControlMessage;
use crate::error::Failure;
use crate::io::process::BuilderProcess;

/// Forward a builder's output and honor its requests until it exits.
///
/// Lines are handled strictly in arrival order. An `abort` request drains
/// the builder's remaining output and waits for it before taking effect.
#[instrument(skip_all)]
pub fn attach_builder(app: &Application, mut process: BuilderProcess) -> Result<(), Failure> {
    let facade = app.safe_application();
    while let Some(message) = process.next_message()? {
        match message {
            ControlMessage::Plain(text) => {
                app.terminal().display_styled(DisplayStyle::Info, &text, "");
            }
            ControlMessage::Invocation(procedure) => {
                let capability = Capability::from_procedure(&procedure)?;
                if matches!(capability, Capability::Abort { .. }) {
                    let code = process.drain()?;
                    debug!(code, "builder drained before abort");
                }
                facade.dispatch(capability)?;
            }
        }
    }

    let code = process.finish()?;
    if code != 0 {
        return Err(Failure::Exit {
            code,
            message: None,
        });
    }
    Ok(())
}

/// Collect a builder's text output.
///
/// Plain lines are kept verbatim; a tagged line contributes only its first
/// positional argument. A non-zero exit fails with the collected text.
#[instrument(skip_all)]
pub fn read_builder(mut process: BuilderProcess) -> Result<String, Failure> {
    let mut output = String::new();
    while let Some(message) = process.next_message()? {
        match message {
            ControlMessage::Plain(text) => output.push_str(&text),
            ControlMessage::Invocation(procedure) => output.push_str(&procedure.captured_text()?),
        }
    }

    let code = process.finish()?;
    if code != 0 {
        return Err(Failure::Exit {
            code,
            message: (!output.is_empty()).then_some(output),
        });
    }
    Ok(output)
}
