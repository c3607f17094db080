//! Typed messages carried in frames.

use crate::{Frame, PROTOCOL_VERSION, ProtocolError};

/// Opcode numbers.
///
/// Reply opcodes are listed separately as [`ReplyCode`].
pub mod opcode {
    /// Empty frame; ignored by the receiver.
    pub const KEEP_ALIVE: u32 = 0;
    /// Request: create an account.
    pub const CREATE_ACCOUNT: u32 = 1;
    /// Request: bind this connection to an account.
    pub const LOG_IN: u32 = 2;
    /// Request: send a message to another account.
    pub const SEND_MESSAGE: u32 = 3;
    /// Request: drain queued messages.
    pub const CHECK_MESSAGE: u32 = 4;
    /// Request: delete the logged-in account.
    pub const DELETE_ACCOUNT: u32 = 5;
    /// Request: list account names matching a pattern.
    pub const LIST_ACCOUNT: u32 = 6;
    /// Request: log out without closing the connection.
    pub const QUIT: u32 = 7;
    /// Server push: a message delivered directly to an online account.
    pub const DELIVERY: u32 = 17;
    /// Server push: proof-of-work challenge.
    pub const CHALLENGE: u32 = 20;
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Opcode 0, carries nothing.
    KeepAlive,
    /// Create an account with this name.
    CreateAccount {
        /// Account name.
        name: String,
    },
    /// Log in to an existing account.
    LogIn {
        /// Account name.
        name: String,
    },
    /// Send `text` to `receiver`.
    SendMessage {
        /// Recipient account name.
        receiver: String,
        /// Message body.
        text: String,
    },
    /// Fetch and clear the queued messages of the logged-in account.
    CheckMessage,
    /// Delete the logged-in account.
    DeleteAccount,
    /// List accounts matching a glob pattern (`_` is a single-char wildcard).
    ListAccount {
        /// Pattern; empty matches everything.
        pattern: String,
    },
    /// Log out.
    Quit,
}

impl Request {
    /// Opcode for this request.
    pub fn opcode(&self) -> u32 {
        match self {
            Self::KeepAlive => opcode::KEEP_ALIVE,
            Self::CreateAccount { .. } => opcode::CREATE_ACCOUNT,
            Self::LogIn { .. } => opcode::LOG_IN,
            Self::SendMessage { .. } => opcode::SEND_MESSAGE,
            Self::CheckMessage => opcode::CHECK_MESSAGE,
            Self::DeleteAccount => opcode::DELETE_ACCOUNT,
            Self::ListAccount { .. } => opcode::LIST_ACCOUNT,
            Self::Quit => opcode::QUIT,
        }
    }

    /// Build the frame for this request.
    pub fn to_frame(&self) -> Frame {
        let fields = match self {
            Self::CreateAccount { name } | Self::LogIn { name } => vec![name.clone()],
            Self::SendMessage { receiver, text } => vec![receiver.clone(), text.clone()],
            Self::ListAccount { pattern } => vec![pattern.clone()],
            Self::KeepAlive | Self::CheckMessage | Self::DeleteAccount | Self::Quit => Vec::new(),
        };
        Frame::new(PROTOCOL_VERSION, self.opcode(), fields)
    }
}

impl TryFrom<Frame> for Request {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let code = frame.opcode;
        let mut fields = frame.fields.into_iter();
        let mut next = || {
            fields.next().ok_or_else(|| {
                ProtocolError::malformed(format!("opcode {code} is missing a field"))
            })
        };

        let request = match code {
            opcode::KEEP_ALIVE => Self::KeepAlive,
            opcode::CREATE_ACCOUNT => Self::CreateAccount { name: next()? },
            opcode::LOG_IN => Self::LogIn { name: next()? },
            opcode::SEND_MESSAGE => Self::SendMessage { receiver: next()?, text: next()? },
            opcode::CHECK_MESSAGE => Self::CheckMessage,
            opcode::DELETE_ACCOUNT => Self::DeleteAccount,
            opcode::LIST_ACCOUNT => Self::ListAccount { pattern: next()? },
            opcode::QUIT => Self::Quit,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok(request)
    }
}

/// Outcome code carried by a reply frame; the discriminant is the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ReplyCode {
    /// Account created.
    AccountCreated = 1,
    /// Account not created (name taken or invalid).
    AccountExists = 2,
    /// Message accepted for delivery.
    MessageSent = 3,
    /// Sender has no account bound to its connection.
    SenderNotLoggedIn = 4,
    /// Recipient does not exist.
    NoSuchReceiver = 5,
    /// Queued messages follow.
    Messages = 6,
    /// Check failed: not logged in.
    CheckNotLoggedIn = 7,
    /// Account deleted; remaining messages follow.
    AccountDeleted = 8,
    /// Delete failed: not logged in.
    DeleteNotLoggedIn = 9,
    /// Matching account names follow.
    AccountList = 10,
    /// Logged out.
    LoggedOut = 11,
    /// Logout failed: not logged in.
    QuitNotLoggedIn = 12,
    /// Logged in.
    LoggedIn = 13,
    /// Login failed: no such account.
    NoSuchAccount = 14,
    /// Login failed: already logged in to that account here.
    AlreadyLoggedIn = 15,
    /// Logged in after forcing another account off this connection.
    TakeOver = 16,
    /// Listing failed unexpectedly.
    ListFailed = 18,
}

impl ReplyCode {
    /// Opcode for this reply.
    pub fn opcode(self) -> u32 {
        self as u32
    }

    /// Whether this code reports a successful operation.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::AccountCreated
                | Self::MessageSent
                | Self::Messages
                | Self::AccountDeleted
                | Self::AccountList
                | Self::LoggedOut
                | Self::LoggedIn
                | Self::TakeOver
        )
    }
}

impl TryFrom<u32> for ReplyCode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let code = match value {
            1 => Self::AccountCreated,
            2 => Self::AccountExists,
            3 => Self::MessageSent,
            4 => Self::SenderNotLoggedIn,
            5 => Self::NoSuchReceiver,
            6 => Self::Messages,
            7 => Self::CheckNotLoggedIn,
            8 => Self::AccountDeleted,
            9 => Self::DeleteNotLoggedIn,
            10 => Self::AccountList,
            11 => Self::LoggedOut,
            12 => Self::QuitNotLoggedIn,
            13 => Self::LoggedIn,
            14 => Self::NoSuchAccount,
            15 => Self::AlreadyLoggedIn,
            16 => Self::TakeOver,
            18 => Self::ListFailed,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok(code)
    }
}

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Opcode 0.
    KeepAlive,
    /// Reply to a request.
    Reply {
        /// Outcome.
        code: ReplyCode,
        /// Human-readable text or payload (queued messages, names).
        text: String,
    },
    /// A chat message pushed to an online recipient.
    Delivery {
        /// `"<sender>:<text>\n"`.
        text: String,
    },
    /// Proof-of-work challenge.
    Challenge {
        /// Number of bits of the search space.
        difficulty: u32,
        /// Hex digest to match.
        target: String,
    },
}

impl ServerMessage {
    /// Shorthand for a reply.
    pub fn reply(code: ReplyCode, text: impl Into<String>) -> Self {
        Self::Reply { code, text: text.into() }
    }

    /// Opcode for this message.
    pub fn opcode(&self) -> u32 {
        match self {
            Self::KeepAlive => opcode::KEEP_ALIVE,
            Self::Reply { code, .. } => code.opcode(),
            Self::Delivery { .. } => opcode::DELIVERY,
            Self::Challenge { .. } => opcode::CHALLENGE,
        }
    }

    /// Build the frame for this message.
    pub fn to_frame(&self) -> Frame {
        let fields = match self {
            Self::KeepAlive => Vec::new(),
            Self::Reply { text, .. } | Self::Delivery { text } => vec![text.clone()],
            Self::Challenge { difficulty, target } => vec![difficulty.to_string(), target.clone()],
        };
        Frame::new(PROTOCOL_VERSION, self.opcode(), fields)
    }
}

impl TryFrom<Frame> for ServerMessage {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let code = frame.opcode;
        let mut fields = frame.fields.into_iter();
        let mut next = || {
            fields.next().ok_or_else(|| {
                ProtocolError::malformed(format!("opcode {code} is missing a field"))
            })
        };

        let message = match code {
            opcode::KEEP_ALIVE => Self::KeepAlive,
            opcode::DELIVERY => Self::Delivery { text: next()? },
            opcode::CHALLENGE => {
                let difficulty = next()?;
                let difficulty = difficulty.parse().map_err(|_| {
                    ProtocolError::malformed(format!("invalid challenge difficulty {difficulty:?}"))
                })?;
                Self::Challenge { difficulty, target: next()? }
            },
            other => Self::Reply { code: ReplyCode::try_from(other)?, text: next()? },
        };
        Ok(message)
    }
}
