//! Command catalog
//!
//! The closed set of symbolic commands the remote entity accepts, and the
//! projector action each one maps to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A command name outside the catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

/// Symbolic remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Command {
    PowerOn,
    PowerOff,
    InputHdmi1,
    InputHdmi2,
    AspectRatioNormal,
    AspectRatioVStretch,
    AspectRatioZoom185,
    AspectRatioZoom235,
    AspectRatioStretch,
    AspectRatioSqueeze,
    PicturePosition185,
    PicturePosition235,
    PicturePositionCustom1,
    PicturePositionCustom2,
    PicturePositionCustom3,
}

impl Command {
    pub const ALL: [Command; 15] = [
        Command::PowerOn,
        Command::PowerOff,
        Command::InputHdmi1,
        Command::InputHdmi2,
        Command::AspectRatioNormal,
        Command::AspectRatioVStretch,
        Command::AspectRatioZoom185,
        Command::AspectRatioZoom235,
        Command::AspectRatioStretch,
        Command::AspectRatioSqueeze,
        Command::PicturePosition185,
        Command::PicturePosition235,
        Command::PicturePositionCustom1,
        Command::PicturePositionCustom2,
        Command::PicturePositionCustom3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::PowerOn => "power_on",
            Command::PowerOff => "power_off",
            Command::InputHdmi1 => "input_hdmi1",
            Command::InputHdmi2 => "input_hdmi2",
            Command::AspectRatioNormal => "aspect_ratio_normal",
            Command::AspectRatioVStretch => "aspect_ratio_v_stretch",
            Command::AspectRatioZoom185 => "aspect_ratio_zoom_1_85",
            Command::AspectRatioZoom235 => "aspect_ratio_zoom_2_35",
            Command::AspectRatioStretch => "aspect_ratio_stretch",
            Command::AspectRatioSqueeze => "aspect_ratio_squeeze",
            Command::PicturePosition185 => "picture_position_1_85",
            Command::PicturePosition235 => "picture_position_2_35",
            Command::PicturePositionCustom1 => "picture_position_custom_1",
            Command::PicturePositionCustom2 => "picture_position_custom_2",
            Command::PicturePositionCustom3 => "picture_position_custom_3",
        }
    }

    /// What executing this command does against the projector
    pub fn action(&self) -> CommandAction {
        use AspectRatio as Ar;
        use PicturePosition as Pp;

        match self {
            Command::PowerOn => CommandAction::TurnOn,
            Command::PowerOff => CommandAction::TurnOff,
            Command::InputHdmi1 => CommandAction::HdmiInput(1),
            Command::InputHdmi2 => CommandAction::HdmiInput(2),
            Command::AspectRatioNormal => ScreenSetting::AspectRatio(Ar::Normal).into(),
            Command::AspectRatioVStretch => ScreenSetting::AspectRatio(Ar::VStretch).into(),
            Command::AspectRatioZoom185 => ScreenSetting::AspectRatio(Ar::Zoom185).into(),
            Command::AspectRatioZoom235 => ScreenSetting::AspectRatio(Ar::Zoom235).into(),
            Command::AspectRatioStretch => ScreenSetting::AspectRatio(Ar::Stretch).into(),
            Command::AspectRatioSqueeze => ScreenSetting::AspectRatio(Ar::Squeeze).into(),
            Command::PicturePosition185 => ScreenSetting::PicturePosition(Pp::P185).into(),
            Command::PicturePosition235 => ScreenSetting::PicturePosition(Pp::P235).into(),
            Command::PicturePositionCustom1 => ScreenSetting::PicturePosition(Pp::Custom1).into(),
            Command::PicturePositionCustom2 => ScreenSetting::PicturePosition(Pp::Custom2).into(),
            Command::PicturePositionCustom3 => ScreenSetting::PicturePosition(Pp::Custom3).into(),
        }
    }

    /// Parse every name, failing on the first one outside the catalog.
    pub fn parse_all<I, S>(names: I) -> Result<Vec<Command>, UnknownCommand>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|name| name.as_ref().parse()).collect()
    }

    /// Catalog names, in catalog order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Command::as_str).collect()
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|command| command.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl TryFrom<String> for Command {
    type Error = UnknownCommand;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.as_str().to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projector-side effect of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Handled by the entity's own turn-on
    TurnOn,
    /// Handled by the entity's own turn-off
    TurnOff,
    HdmiInput(u8),
    Screen(ScreenSetting),
}

impl From<ScreenSetting> for CommandAction {
    fn from(setting: ScreenSetting) -> Self {
        CommandAction::Screen(setting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Normal,
    VStretch,
    Zoom185,
    Zoom235,
    Stretch,
    Squeeze,
}

impl AspectRatio {
    pub fn mode(&self) -> &'static str {
        match self {
            AspectRatio::Normal => "NORMAL",
            AspectRatio::VStretch => "V_STRETCH",
            AspectRatio::Zoom185 => "ZOOM_1_85",
            AspectRatio::Zoom235 => "ZOOM_2_35",
            AspectRatio::Stretch => "STRETCH",
            AspectRatio::Squeeze => "SQUEEZE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicturePosition {
    P185,
    P235,
    Custom1,
    Custom2,
    Custom3,
}

impl PicturePosition {
    pub fn mode(&self) -> &'static str {
        match self {
            PicturePosition::P185 => "1_85",
            PicturePosition::P235 => "2_35",
            PicturePosition::Custom1 => "CUSTOM_1",
            PicturePosition::Custom2 => "CUSTOM_2",
            PicturePosition::Custom3 => "CUSTOM_3",
        }
    }
}

/// A screen-mode change, as the (category, mode) pair the client expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSetting {
    AspectRatio(AspectRatio),
    PicturePosition(PicturePosition),
}

impl ScreenSetting {
    pub fn category(&self) -> &'static str {
        match self {
            ScreenSetting::AspectRatio(_) => "ASPECT_RATIO",
            ScreenSetting::PicturePosition(_) => "PICTURE_POSITION",
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ScreenSetting::AspectRatio(ratio) => ratio.mode(),
            ScreenSetting::PicturePosition(position) => position.mode(),
        }
    }
}
