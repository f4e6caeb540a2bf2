//! Desktop executors: `click-ui-element`, `type-text` and `speak`.
//!
//! Input is driven through `xdotool`, speech through an `espeak`-compatible
//! program. Both are configurable.

use std::sync::Arc;

use tracing::info;

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
    execution::StepResult,
};
use ghosthand_core::traits::ActionExecutor;

use crate::{
    command::{run_checked, CommandRunner},
    params,
};

fn button_number(kind: &str, button: Option<&str>) -> GhosthandResult<&'static str> {
    match button.map(str::to_ascii_lowercase).as_deref() {
        None | Some("left") => Ok("1"),
        Some("middle") => Ok("2"),
        Some("right") => Ok("3"),
        Some(other) => Err(GhosthandError::executor(
            kind,
            format!("unknown mouse button '{}'", other),
        )),
    }
}

/// `click-ui-element`: move the pointer to (x, y) and click.
pub struct ClickExecutor {
    runner: Arc<dyn CommandRunner>,
    xdotool: String,
}

impl ClickExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, xdotool: impl Into<String>) -> Self {
        Self {
            runner,
            xdotool: xdotool.into(),
        }
    }
}

impl ActionExecutor for ClickExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::ClickUiElement.as_str();
        let x = params::required_int(kind, parameters, "x")?;
        let y = params::required_int(kind, parameters, "y")?;
        if x < 0 || y < 0 {
            let reason = format!("coordinates ({}, {}) are off screen", x, y);
            return Err(GhosthandError::executor(kind, reason));
        }
        let button = button_number(kind, params::optional_str(parameters, "button"))?;

        let args = vec![
            "mousemove".to_string(),
            x.to_string(),
            y.to_string(),
            "click".to_string(),
            button.to_string(),
        ];
        run_checked(self.runner.as_ref(), kind, &self.xdotool, args)?;

        info!(x, y, button, "clicked");
        Ok(StepResult::success(format!("clicked at ({}, {})", x, y)))
    }
}

/// `type-text`: type into the focused window.
pub struct TypeTextExecutor {
    runner: Arc<dyn CommandRunner>,
    xdotool: String,
}

impl TypeTextExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, xdotool: impl Into<String>) -> Self {
        Self {
            runner,
            xdotool: xdotool.into(),
        }
    }
}

impl ActionExecutor for TypeTextExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::TypeText.as_str();
        let text = params::required_str(kind, parameters, "text")?;

        let args = vec![
            "type".to_string(),
            "--delay".to_string(),
            "40".to_string(),
            "--".to_string(),
            text.to_string(),
        ];
        run_checked(self.runner.as_ref(), kind, &self.xdotool, args)?;

        info!(chars = text.chars().count(), "text typed");
        Ok(StepResult::success(format!("typed {} characters", text.chars().count())))
    }
}

/// `speak`: read text aloud.
pub struct SpeakExecutor {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl SpeakExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl ActionExecutor for SpeakExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::Speak.as_str();
        let text = params::required_str(kind, parameters, "text")?;
        // Text starting with '-' must not be read as a speech-program option.
        let args = vec!["--".to_string(), text.to_string()];
        run_checked(self.runner.as_ref(), kind, &self.program, args)?;
        info!(chars = text.chars().count(), "text spoken");
        Ok(StepResult::success("spoken"))
    }
}
