//! Result area state machine.
//!
//! Every flag the result area exposes is derived from `UiState` in `render`, so
//! combinations such as "download enabled while loading" cannot be expressed.

use crate::models::DataUri;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub image: DataUri,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Loading,
    Success(Generated),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    GenerateClicked,
    Generated(Generated),
    Failed(String),
}

/// Snapshot of what the result area displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View<'a> {
    pub placeholder_visible: bool,
    pub spinner_visible: bool,
    pub image: Option<&'a DataUri>,
    pub text: Option<&'a str>,
    pub error: Option<&'a str>,
    pub generate_enabled: bool,
    pub download_enabled: bool,
}

impl UiState {
    pub fn apply(self, event: UiEvent) -> UiState {
        match (self, event) {
            // While loading the control is disabled, so this is a no-op there.
            (_, UiEvent::GenerateClicked) => UiState::Loading,
            (UiState::Loading, UiEvent::Generated(generated)) => UiState::Success(generated),
            (state, UiEvent::Generated(_)) => {
                warn!("Ignoring result outside of loading state ({})", state.name());
                state
            }
            (_, UiEvent::Failed(message)) => UiState::Error { message },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UiState::Idle => "idle",
            UiState::Loading => "loading",
            UiState::Success(_) => "success",
            UiState::Error { .. } => "error",
        }
    }

    pub fn render(&self) -> View<'_> {
        let blank = View {
            placeholder_visible: false,
            spinner_visible: false,
            image: None,
            text: None,
            error: None,
            generate_enabled: true,
            download_enabled: false,
        };
        match self {
            UiState::Idle => View { placeholder_visible: true, ..blank },
            UiState::Loading => View { spinner_visible: true, generate_enabled: false, ..blank },
            UiState::Success(generated) => View {
                image: Some(&generated.image),
                text: generated.text.as_deref(),
                download_enabled: true,
                ..blank
            },
            UiState::Error { message } => View { error: Some(message), ..blank },
        }
    }
}
