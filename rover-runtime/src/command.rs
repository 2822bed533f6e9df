// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::fmt;

use crate::{consts::MAX_SPEED, Error, Result};

/// Manual control command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    SetSpeed(i16),
    ToggleRoving,
}

impl Command {
    /// Parse a control verb and its optional speed argument.
    ///
    /// The speed is only consulted for `setSpeed`.
    pub fn parse(action: &str, speed: Option<&str>) -> Result<Self> {
        match action {
            "forward" => Ok(Command::Forward),
            "backward" => Ok(Command::Backward),
            "left" => Ok(Command::Left),
            "right" => Ok(Command::Right),
            "stop" => Ok(Command::Stop),
            "roving" | "toggleRoving" => Ok(Command::ToggleRoving),
            "setSpeed" => {
                let value = speed.unwrap_or_default().trim();

                match value.parse::<i16>() {
                    Ok(speed) if (-MAX_SPEED..=MAX_SPEED).contains(&speed) => {
                        Ok(Command::SetSpeed(speed))
                    }
                    _ => Err(Error::InvalidSpeed(value.to_owned())),
                }
            }
            _ => Err(Error::UnknownCommand(action.to_owned())),
        }
    }

    /// Whether the command takes manual control away from the roving loop.
    pub fn is_manual_drive(&self) -> bool {
        matches!(
            self,
            Command::Forward | Command::Backward | Command::Left | Command::Right
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Forward => write!(f, "forward"),
            Command::Backward => write!(f, "backward"),
            Command::Left => write!(f, "left"),
            Command::Right => write!(f, "right"),
            Command::Stop => write!(f, "stop"),
            Command::SetSpeed(speed) => write!(f, "setSpeed {}", speed),
            Command::ToggleRoving => write!(f, "roving"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_verbs() {
        assert_eq!(Command::parse("forward", None).unwrap(), Command::Forward);
        assert_eq!(Command::parse("backward", Some("12")).unwrap(), Command::Backward);
        assert_eq!(Command::parse("left", None).unwrap(), Command::Left);
        assert_eq!(Command::parse("right", None).unwrap(), Command::Right);
        assert_eq!(Command::parse("stop", None).unwrap(), Command::Stop);
        assert_eq!(Command::parse("roving", None).unwrap(), Command::ToggleRoving);
    }

    #[test]
    fn parse_speed() {
        assert_eq!(
            Command::parse("setSpeed", Some("64")).unwrap(),
            Command::SetSpeed(64)
        );
        assert_eq!(
            Command::parse("setSpeed", Some("-255")).unwrap(),
            Command::SetSpeed(-255)
        );
        assert!(matches!(
            Command::parse("setSpeed", Some("256")),
            Err(Error::InvalidSpeed(_))
        ));
        assert!(matches!(
            Command::parse("setSpeed", Some("fast")),
            Err(Error::InvalidSpeed(_))
        ));
        assert!(matches!(
            Command::parse("setSpeed", None),
            Err(Error::InvalidSpeed(_))
        ));
    }

    #[test]
    fn parse_unknown() {
        match Command::parse("jump", None) {
            Err(Error::UnknownCommand(verb)) => assert_eq!(verb, "jump"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(Command::parse("Forward", None).is_err());
    }
}
