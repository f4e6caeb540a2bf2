//! The closed action set and its static parameter schema.
//!
//! Every action kind the runtime knows about is listed in `ActionKind`, and
//! each kind has exactly one `ActionSchema` describing the parameters it
//! accepts. The table is fixed at build time: executors are bound per
//! deployment, but the set of kinds they can be bound to never grows at
//! runtime.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GhosthandError, GhosthandResult};

/// Parameter name → value. Ordered so serialized plans are deterministic.
pub type Parameters = BTreeMap<String, Value>;

/// One member of the closed action set.
///
/// The wire form is kebab-case, e.g. `"send-email"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    LocateFile,
    RedactImage,
    SendEmail,
    SendWebhook,
    ClickUiElement,
    TypeText,
    OcrRead,
    Speak,
    EnrollUser,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActionKind; 9] = [
        ActionKind::LocateFile,
        ActionKind::RedactImage,
        ActionKind::SendEmail,
        ActionKind::SendWebhook,
        ActionKind::ClickUiElement,
        ActionKind::TypeText,
        ActionKind::OcrRead,
        ActionKind::Speak,
        ActionKind::EnrollUser,
    ];

    /// The kebab-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::LocateFile => "locate-file",
            ActionKind::RedactImage => "redact-image",
            ActionKind::SendEmail => "send-email",
            ActionKind::SendWebhook => "send-webhook",
            ActionKind::ClickUiElement => "click-ui-element",
            ActionKind::TypeText => "type-text",
            ActionKind::OcrRead => "ocr-read",
            ActionKind::Speak => "speak",
            ActionKind::EnrollUser => "enroll-user",
        }
    }

    /// The static schema for this kind.
    pub fn schema(&self) -> &'static ActionSchema {
        match self {
            ActionKind::LocateFile => &LOCATE_FILE,
            ActionKind::RedactImage => &REDACT_IMAGE,
            ActionKind::SendEmail => &SEND_EMAIL,
            ActionKind::SendWebhook => &SEND_WEBHOOK,
            ActionKind::ClickUiElement => &CLICK_UI_ELEMENT,
            ActionKind::TypeText => &TYPE_TEXT,
            ActionKind::OcrRead => &OCR_READ,
            ActionKind::Speak => &SPEAK,
            ActionKind::EnrollUser => &ENROLL_USER,
        }
    }

    /// True for kinds that touch communications or system state and so
    /// require a satisfied identity check before execution.
    pub fn is_privileged(&self) -> bool {
        self.schema().privileged
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = GhosthandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GhosthandError::UnknownActionKind {
                kind: s.to_string(),
            })
    }
}

/// The value type a parameter must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    StringList,
}

impl ParamType {
    /// Return true if `value` has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::StringList => "list of strings",
        }
    }
}

/// One named parameter slot in an `ActionSchema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    const fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// The fixed parameter contract of one action kind.
#[derive(Debug, PartialEq, Eq)]
pub struct ActionSchema {
    pub kind: ActionKind,
    pub params: &'static [ParamSpec],
    pub privileged: bool,
}

impl ActionSchema {
    /// Parameters that must always be present.
    pub fn required(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// Look up a parameter slot by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check `parameters` against this schema.
    ///
    /// Every required key must be present, every key must be declared, and
    /// every value must have its declared type. There are no silent
    /// defaults: optional parameters are simply absent.
    pub fn validate(&self, parameters: &Parameters) -> GhosthandResult<()> {
        let invalid = |reason: String| GhosthandError::InvalidParameters {
            kind: self.kind.as_str().to_string(),
            reason,
        };

        for spec in self.required() {
            if !parameters.contains_key(spec.name) {
                return Err(invalid(format!("missing required parameter '{}'", spec.name)));
            }
        }

        for (name, value) in parameters {
            let spec = self
                .param(name)
                .ok_or_else(|| invalid(format!("unknown parameter '{name}'")))?;
            if !spec.ty.accepts(value) {
                return Err(invalid(format!(
                    "parameter '{name}' must be of type {}, got {value}",
                    spec.ty.name()
                )));
            }
        }

        Ok(())
    }
}

// ── Schema table ─────────────────────────────────────────────────────────────

static LOCATE_FILE: ActionSchema = ActionSchema {
    kind: ActionKind::LocateFile,
    params: &[
        ParamSpec::required("pattern", ParamType::String),
        ParamSpec::optional("directory", ParamType::String),
    ],
    privileged: false,
};

static REDACT_IMAGE: ActionSchema = ActionSchema {
    kind: ActionKind::RedactImage,
    params: &[
        ParamSpec::required("target", ParamType::String),
        ParamSpec::optional("terms", ParamType::StringList),
    ],
    privileged: false,
};

static SEND_EMAIL: ActionSchema = ActionSchema {
    kind: ActionKind::SendEmail,
    params: &[
        ParamSpec::required("to", ParamType::String),
        ParamSpec::required("subject", ParamType::String),
        ParamSpec::optional("body", ParamType::String),
        ParamSpec::optional("attachment", ParamType::String),
    ],
    privileged: true,
};

static SEND_WEBHOOK: ActionSchema = ActionSchema {
    kind: ActionKind::SendWebhook,
    params: &[
        ParamSpec::required("url", ParamType::String),
        ParamSpec::required("message", ParamType::String),
    ],
    privileged: true,
};

static CLICK_UI_ELEMENT: ActionSchema = ActionSchema {
    kind: ActionKind::ClickUiElement,
    params: &[
        ParamSpec::required("x", ParamType::Integer),
        ParamSpec::required("y", ParamType::Integer),
        ParamSpec::optional("button", ParamType::String),
    ],
    privileged: true,
};

static TYPE_TEXT: ActionSchema = ActionSchema {
    kind: ActionKind::TypeText,
    params: &[ParamSpec::required("text", ParamType::String)],
    privileged: true,
};

static OCR_READ: ActionSchema = ActionSchema {
    kind: ActionKind::OcrRead,
    params: &[ParamSpec::required("image_path", ParamType::String)],
    privileged: false,
};

static SPEAK: ActionSchema = ActionSchema {
    kind: ActionKind::Speak,
    params: &[ParamSpec::required("text", ParamType::String)],
    privileged: false,
};

static ENROLL_USER: ActionSchema = ActionSchema {
    kind: ActionKind::EnrollUser,
    params: &[
        ParamSpec::required("user", ParamType::String),
        ParamSpec::required("sample_path", ParamType::String),
    ],
    privileged: true,
};

/// Look up the schema for a kind given by name.
///
/// Returns `UnknownActionKind` for names outside the closed set.
pub fn schema_for(kind: &str) -> GhosthandResult<&'static ActionSchema> {
    kind.parse::<ActionKind>().map(|k| k.schema())
}

/// Whether the named kind is privileged.
pub fn is_privileged(kind: &str) -> GhosthandResult<bool> {
    schema_for(kind).map(|s| s.privileged)
}

// ── Action ───────────────────────────────────────────────────────────────────

/// One typed, parameterized unit of work.
///
/// Fields are private: the only ways to obtain an `Action` are `new`,
/// `parse`, and deserialization, all of which validate against the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawAction", try_from = "RawAction")]
pub struct Action {
    kind: ActionKind,
    parameters: Parameters,
    is_privileged: bool,
}

impl Action {
    /// Build an action, validating `parameters` against `kind`'s schema.
    pub fn new(kind: ActionKind, parameters: Parameters) -> GhosthandResult<Self> {
        kind.schema().validate(&parameters)?;
        Ok(Self {
            kind,
            parameters,
            is_privileged: kind.is_privileged(),
        })
    }

    /// Build an action from a kind name, as found in plan text or rule files.
    pub fn parse(kind: &str, parameters: Parameters) -> GhosthandResult<Self> {
        Self::new(kind.parse()?, parameters)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_privileged(&self) -> bool {
        self.is_privileged
    }
}

/// Wire form of an `Action`. `is_privileged` is derived, never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    kind: String,
    #[serde(default)]
    parameters: Parameters,
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        Self {
            kind: action.kind.as_str().to_string(),
            parameters: action.parameters,
        }
    }
}

impl TryFrom<RawAction> for Action {
    type Error = GhosthandError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        Action::parse(&raw.kind, raw.parameters)
    }
}
