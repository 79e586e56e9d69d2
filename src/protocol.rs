use crate::prelude::*;

// reserved by the raw framing: the server promises never to send this as a
// chunk of terminal output
pub const EXIT_SENTINEL: &str = "__exit__";

const KNOWN_TYPES: &[&str] = &["resize", "input", "data", "exit", "cwd"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command { command: String },
    Resize { size: crate::term::Size },
    Input { data: String },
    Data { data: String },
    Exit { code: Option<i32> },
    Cwd { path: String },
    Unhandled { ty: String },
}

impl Message {
    pub fn command(command: &str) -> Self {
        Self::Command {
            command: command.to_string(),
        }
    }

    pub fn resize(size: crate::term::Size) -> Self {
        Self::Resize { size }
    }

    pub fn input(data: &str) -> Self {
        Self::Input {
            data: data.to_string(),
        }
    }

    pub fn data(data: &str) -> Self {
        Self::Data {
            data: data.to_string(),
        }
    }

    pub fn exit(code: Option<i32>) -> Self {
        Self::Exit { code }
    }

    pub fn log(&self, id: &str) {
        match self {
            Self::Data { data } => {
                log::trace!(
                    "{}: message(Data {{ data: ({} bytes) }})",
                    id,
                    data.len()
                );
            }
            // keystrokes can be passwords
            Self::Input { data } => {
                log::trace!(
                    "{}: message(Input {{ data: ({} bytes) }})",
                    id,
                    data.len()
                );
            }
            message => {
                log::debug!("{}: message({:?})", id, message);
            }
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Envelope {
    Resize {
        cols: u16,
        rows: u16,
    },
    Input {
        data: String,
    },
    Data {
        data: String,
    },
    Exit {
        #[serde(
            rename = "exitCode",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        code: Option<i32>,
    },
    Cwd {
        path: String,
    },
}

// the launch request is the one structured message without a type field
#[derive(serde::Serialize, serde::Deserialize)]
struct CommandEnvelope {
    command: String,
}

impl Envelope {
    fn from_message(msg: &Message) -> Option<Self> {
        Some(match msg {
            Message::Resize { size } => Self::Resize {
                cols: size.cols,
                rows: size.rows,
            },
            Message::Input { data } => Self::Input { data: data.clone() },
            Message::Data { data } => Self::Data { data: data.clone() },
            Message::Exit { code } => Self::Exit { code: *code },
            Message::Cwd { path } => Self::Cwd { path: path.clone() },
            Message::Command { .. } | Message::Unhandled { .. } => {
                return None
            }
        })
    }

    fn into_message(self) -> Result<Message> {
        Ok(match self {
            Self::Resize { cols, rows } => {
                Message::resize(crate::term::Size::new(cols, rows)?)
            }
            Self::Input { data } => Message::Input { data },
            Self::Data { data } => Message::Data { data },
            Self::Exit { code } => Message::Exit { code },
            Self::Cwd { path } => Message::Cwd { path },
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FramingType {
    Structured,
    Raw,
}

impl FramingType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Raw => "raw",
        }
    }

    pub fn default_path(self) -> &'static str {
        match self {
            Self::Structured => "/api/terminal/ws",
            Self::Raw => "/ws/terminal",
        }
    }
}

impl std::convert::TryFrom<&str> for FramingType {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Ok(match s {
            s if Self::Structured.name() == s => Self::Structured,
            s if Self::Raw.name() == s => Self::Raw,
            _ => return Err(Error::ParseFraming { ty: s.to_string() }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    // typed json envelopes, the session starts by naming the program to run
    Structured { command: String },
    // unframed text, termination signalled by EXIT_SENTINEL
    Raw,
}

impl Framing {
    pub fn new(ty: FramingType, command: &str) -> Self {
        match ty {
            FramingType::Structured => Self::structured(command),
            FramingType::Raw => Self::raw(),
        }
    }

    pub fn structured(command: &str) -> Self {
        Self::Structured {
            command: command.to_string(),
        }
    }

    pub fn raw() -> Self {
        Self::Raw
    }

    pub fn framing_type(&self) -> FramingType {
        match self {
            Self::Structured { .. } => FramingType::Structured,
            Self::Raw => FramingType::Raw,
        }
    }

    pub fn handshake(&self) -> Option<Message> {
        match self {
            Self::Structured { command } => Some(Message::command(command)),
            Self::Raw => None,
        }
    }

    // Ok(None) means the message has no representation in this framing
    pub fn encode(&self, msg: &Message) -> Result<Option<String>> {
        match self {
            Self::Structured { .. } => encode_structured(msg),
            Self::Raw => Ok(encode_raw(msg)),
        }
    }

    pub fn decode(&self, payload: &str) -> Result<Message> {
        match self {
            Self::Structured { .. } => decode_structured(payload),
            Self::Raw => Ok(decode_raw(payload)),
        }
    }
}

fn encode_structured(msg: &Message) -> Result<Option<String>> {
    let json = if let Message::Command { command } = msg {
        serde_json::to_string(&CommandEnvelope {
            command: command.clone(),
        })
    } else if let Some(envelope) = Envelope::from_message(msg) {
        serde_json::to_string(&envelope)
    } else {
        return Ok(None);
    };
    json.map(Some).context(crate::error::SerializeMessage)
}

fn decode_structured(payload: &str) -> Result<Message> {
    let value: serde_json::Value =
        serde_json::from_str(payload).context(crate::error::ParseMessage)?;
    let ty = match value.get("type") {
        Some(serde_json::Value::String(ty)) => Some(ty.clone()),
        Some(ty) => {
            return Err(Error::InvalidMessageType { ty: ty.to_string() })
        }
        None => None,
    };

    match ty {
        Some(ty) if KNOWN_TYPES.contains(&ty.as_str()) => {
            serde_json::from_value::<Envelope>(value)
                .context(crate::error::ParseMessage)?
                .into_message()
        }
        Some(ty) => Ok(Message::Unhandled { ty }),
        None => serde_json::from_value::<CommandEnvelope>(value)
            .map(|envelope| Message::Command {
                command: envelope.command,
            })
            .map_err(|_| Error::MissingMessageType),
    }
}

fn encode_raw(msg: &Message) -> Option<String> {
    match msg {
        Message::Input { data } | Message::Data { data } => {
            Some(data.clone())
        }
        Message::Exit { .. } => Some(EXIT_SENTINEL.to_string()),
        Message::Command { .. }
        | Message::Resize { .. }
        | Message::Cwd { .. }
        | Message::Unhandled { .. } => None,
    }
}

fn decode_raw(payload: &str) -> Message {
    if payload == EXIT_SENTINEL {
        Message::exit(None)
    } else {
        Message::data(payload)
    }
}
