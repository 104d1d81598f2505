//! The contract between the game and whatever chat client shows it.
use std::future::Future;

/// Opaque reference to a posted message, used to edit it later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub i64);

/// A vote button. `token` is what comes back in the vote event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

/// Rows of buttons shown under the message.
pub type Keyboard = Vec<Vec<Button>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayContent {
    pub text: String,
    pub buttons: Option<Keyboard>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayError {
    /// The handle no longer points at a message.
    StaleHandle(DisplayHandle),
    /// The channel refused the request.
    Rejected(String),
}

impl std::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayError::StaleHandle(h) => write!(f, "message {} is gone", h.0),
            DisplayError::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

impl std::error::Error for DisplayError {}

/// Posts and edits the game message. Failures are reported, never retried by the caller.
pub trait ChatDisplay: Send + Sync + 'static {
    fn send_display(
        &self,
        content: &DisplayContent,
    ) -> impl Future<Output = Result<DisplayHandle, DisplayError>> + Send;

    fn edit_display(
        &self,
        handle: DisplayHandle,
        content: &DisplayContent,
    ) -> impl Future<Output = Result<(), DisplayError>> + Send;
}
