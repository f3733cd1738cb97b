//! Closed set of parent-side operations reachable from a tagged line.
//!
//! Decoded procedures are bound into a [`Capability`] before anything runs.
//! Names outside [`CAPABILITY_NAMES`] are rejected, as are arguments of the
//! wrong type or unexpected keywords.

use serde_json::{Map, Value};

use crate::core::protocol::{Procedure, ProtocolError};

/// Presentation variant of a display call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStyle {
    Plain,
    Critical,
    Info,
    Error,
    Success,
    Waiting,
    Warning,
    MiniHeader,
}

/// What a facade name binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Abort,
    Display(DisplayStyle),
    Debug,
    Prompt,
    Confirm,
    Status,
    StatusIf,
    ReadBuilder,
}

/// The facade: every reachable name and what it binds to, in table order.
const MEMBERS: [(&str, Member); 15] = [
    ("abort", Member::Abort),
    ("display", Member::Display(DisplayStyle::Plain)),
    ("display_critical", Member::Display(DisplayStyle::Critical)),
    ("display_info", Member::Display(DisplayStyle::Info)),
    ("display_error", Member::Display(DisplayStyle::Error)),
    ("display_success", Member::Display(DisplayStyle::Success)),
    ("display_waiting", Member::Display(DisplayStyle::Waiting)),
    ("display_warning", Member::Display(DisplayStyle::Warning)),
    ("display_debug", Member::Debug),
    ("display_mini_header", Member::Display(DisplayStyle::MiniHeader)),
    ("prompt", Member::Prompt),
    ("confirm", Member::Confirm),
    ("status", Member::Status),
    ("status_if", Member::StatusIf),
    ("read_builder", Member::ReadBuilder),
];

/// Every name the facade exposes, in table order.
pub const CAPABILITY_NAMES: [&str; MEMBERS.len()] = {
    let mut names = [""; MEMBERS.len()];
    let mut index = 0;
    while index < MEMBERS.len() {
        names[index] = MEMBERS[index].0;
        index += 1;
    }
    names
};

fn member(method: &str) -> Option<Member> {
    MEMBERS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, member)| *member)
}

/// A bound, typed invocation of a facade operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    Abort { text: String, code: i32 },
    Display { style: DisplayStyle, text: String, end: String },
    Debug { text: String, level: u8, end: String },
    Prompt { text: String, default: Option<String> },
    Confirm { text: String, default: Option<bool> },
    Status { text: String },
    StatusIf { text: String, condition: bool },
}

impl Capability {
    pub fn from_procedure(procedure: &Procedure) -> Result<Self, ProtocolError> {
        let method = procedure.method.as_str();
        let Some(member) = member(method) else {
            return Err(ProtocolError::UnknownMethod(method.to_string()));
        };
        let mut call = CallArgs::new(procedure);
        let capability = match member {
            Member::Abort => Self::Abort {
                text: call.string(0, "text")?.unwrap_or_default(),
                code: call.int(1, "code")?.unwrap_or(1),
            },
            Member::Debug => Self::Debug {
                text: call.required_string(0, "text")?,
                level: call.level(1, "level")?,
                end: call.string(2, "end")?.unwrap_or_else(|| "\n".to_string()),
            },
            Member::Display(style @ DisplayStyle::MiniHeader) => Self::Display {
                style,
                text: call.required_string(0, "text")?,
                end: "\n".to_string(),
            },
            Member::Display(style) => Self::Display {
                style,
                text: call.string(0, "text")?.unwrap_or_default(),
                end: call.string(1, "end")?.unwrap_or_else(|| "\n".to_string()),
            },
            Member::Prompt => Self::Prompt {
                text: call.required_string(0, "text")?,
                default: call.string(1, "default")?,
            },
            Member::Confirm => Self::Confirm {
                text: call.required_string(0, "text")?,
                default: call.bool(1, "default")?,
            },
            Member::Status => Self::Status {
                text: call.required_string(0, "text")?,
            },
            Member::StatusIf => Self::StatusIf {
                text: call.required_string(0, "text")?,
                condition: call.bool(1, "condition")?.unwrap_or(false),
            },
            Member::ReadBuilder => return Err(ProtocolError::NotRemote(method.to_string())),
        };
        call.finish()?;
        Ok(capability)
    }

    /// Facade name this capability was bound from.
    pub fn name(&self) -> &'static str {
        let wanted = match self {
            Self::Abort { .. } => Member::Abort,
            Self::Display { style, .. } => Member::Display(*style),
            Self::Debug { .. } => Member::Debug,
            Self::Prompt { .. } => Member::Prompt,
            Self::Confirm { .. } => Member::Confirm,
            Self::Status { .. } => Member::Status,
            Self::StatusIf { .. } => Member::StatusIf,
        };
        MEMBERS
            .iter()
            .find(|(_, member)| *member == wanted)
            .map_or("", |(name, _)| *name)
    }
}

/// Positional-or-keyword argument binding: a parameter is taken positionally when
/// present, otherwise by keyword.
struct CallArgs<'a> {
    method: &'a str,
    args: &'a [Value],
    kwargs: Map<String, Value>,
    bound: usize,
}

impl<'a> CallArgs<'a> {
    fn new(procedure: &'a Procedure) -> Self {
        Self {
            method: &procedure.method,
            args: &procedure.args,
            kwargs: procedure.kwargs.clone(),
            bound: 0,
        }
    }

    fn take(&mut self, index: usize, name: &str) -> Result<Option<Value>, ProtocolError> {
        self.bound = self.bound.max(index + 1);
        let keyword = self.kwargs.remove(name);
        match (self.args.get(index), keyword) {
            (Some(_), Some(_)) => Err(self.invalid(format!("multiple values for `{name}`"))),
            (Some(value), None) => Ok(Some(value.clone())),
            (None, keyword) => Ok(keyword),
        }
    }

    fn string(&mut self, index: usize, name: &str) -> Result<Option<String>, ProtocolError> {
        match self.take(index, name)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(self.invalid(format!("`{name}` must be a string, got {other}"))),
        }
    }

    fn required_string(&mut self, index: usize, name: &str) -> Result<String, ProtocolError> {
        self.string(index, name)?
            .ok_or_else(|| self.invalid(format!("missing `{name}`")))
    }

    fn int(&mut self, index: usize, name: &str) -> Result<Option<i32>, ProtocolError> {
        match self.take(index, name)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(format!("`{name}` is out of range: {number}"))),
            Some(other) => Err(self.invalid(format!("`{name}` must be an integer, got {other}"))),
        }
    }

    fn bool(&mut self, index: usize, name: &str) -> Result<Option<bool>, ProtocolError> {
        match self.take(index, name)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(flag)),
            Some(other) => Err(self.invalid(format!("`{name}` must be a boolean, got {other}"))),
        }
    }

    fn level(&mut self, index: usize, name: &str) -> Result<u8, ProtocolError> {
        match self.int(index, name)? {
            None => Ok(1),
            Some(level @ 1..=3) => Ok(level as u8),
            Some(level) => Err(self.invalid(format!("`{name}` must be 1-3, got {level}"))),
        }
    }

    fn finish(self) -> Result<(), ProtocolError> {
        if self.args.len() > self.bound {
            return Err(self.invalid(format!(
                "takes at most {} positional arguments, got {}",
                self.bound,
                self.args.len()
            )));
        }
        if let Some(name) = self.kwargs.keys().next() {
            return Err(self.invalid(format!("unexpected keyword `{name}`")));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> ProtocolError {
        ProtocolError::Arguments {
            method: self.method.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(procedure: Procedure) -> Result<Capability, ProtocolError> {
        Capability::from_procedure(&procedure)
    }

    #[test]
    fn every_display_name_binds() {
        for name in CAPABILITY_NAMES
            .iter()
            .filter(|name| name.starts_with("display") && **name != "display_debug")
        {
            let capability = bind(Procedure::new(*name).arg("text")).expect(name);
            assert!(matches!(capability, Capability::Display { .. }), "{name}");
        }
    }

    #[test]
    fn bound_capabilities_report_their_table_name() {
        for name in CAPABILITY_NAMES.iter().filter(|name| **name != "read_builder") {
            let procedure = match *name {
                "status_if" => Procedure::new(*name).arg("x").arg(true),
                _ => Procedure::new(*name).arg("x"),
            };
            assert_eq!(bind(procedure).expect(name).name(), *name);
        }
    }

    #[test]
    fn abort_defaults_match_signature() {
        assert_eq!(
            bind(Procedure::new("abort")).expect("bind"),
            Capability::Abort {
                text: String::new(),
                code: 1,
            }
        );
        assert_eq!(
            bind(Procedure::new("abort").arg("boom").kwarg("code", 3)).expect("bind"),
            Capability::Abort {
                text: "boom".to_string(),
                code: 3,
            }
        );
    }

    #[test]
    fn keyword_arguments_bind_by_name() {
        assert_eq!(
            bind(Procedure::new("display_info").kwarg("text", "x").kwarg("end", "")).expect("bind"),
            Capability::Display {
                style: DisplayStyle::Info,
                text: "x".to_string(),
                end: String::new(),
            }
        );
        assert_eq!(
            bind(Procedure::new("status_if").arg("busy").kwarg("condition", true)).expect("bind"),
            Capability::StatusIf {
                text: "busy".to_string(),
                condition: true,
            }
        );
    }

    #[test]
    fn debug_level_is_bounded() {
        assert!(matches!(
            bind(Procedure::new("display_debug").arg("x")).expect("bind"),
            Capability::Debug { level: 1, .. }
        ));
        assert!(bind(Procedure::new("display_debug").arg("x").arg(4)).is_err());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            bind(Procedure::new("__class__")).unwrap_err(),
            ProtocolError::UnknownMethod("__class__".to_string())
        );
    }

    #[test]
    fn read_builder_is_not_remote() {
        assert_eq!(
            bind(Procedure::new("read_builder")).unwrap_err(),
            ProtocolError::NotRemote("read_builder".to_string())
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(bind(Procedure::new("abort").kwarg("code", "three")).is_err());
        assert!(bind(Procedure::new("display").arg("a").arg("b").arg("c")).is_err());
        assert!(bind(Procedure::new("display").arg("a").kwarg("style", "bold")).is_err());
        assert!(bind(Procedure::new("display").arg("a").kwarg("text", "b")).is_err());
        assert!(bind(Procedure::new("prompt")).is_err());
    }
}
