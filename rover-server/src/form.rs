// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use rover::{robot::RobotState, Command};

const MAIN_PAGE: &str = include_str!("../html/index.html");
const CONTROL_FORM: &str = include_str!("../html/control.html");

const ACTIVE_COLOR: &str = "hotpink";
const NORMAL_COLOR: &str = "black";

pub const ROVING_ON: &str = "Roving ON";
pub const ROVING_OFF: &str = "Roving OFF";

/// Control button which can be highlighted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Roving,
}

/// Feedback shown on the control form.
#[derive(Debug, Default)]
pub struct ControlForm {
    message: String,
    active: Option<Button>,
}

impl ControlForm {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn active(&self) -> Option<Button> {
        self.active
    }

    /// Record a command that was executed, `state` is the robot state after
    /// the command.
    pub fn executed(&mut self, command: Command, state: &RobotState) {
        let (message, active) = match command {
            Command::Forward => ("Going forward".to_owned(), Some(Button::Forward)),
            Command::Backward => ("Going backward".to_owned(), Some(Button::Backward)),
            Command::Left => ("Turning left".to_owned(), Some(Button::Left)),
            Command::Right => ("Turning right".to_owned(), Some(Button::Right)),
            Command::Stop => ("Stopping".to_owned(), Some(Button::Stop)),
            Command::SetSpeed(speed) => (format!("Setting speed to {}", speed), self.active),
            Command::ToggleRoving if state.is_roving => {
                ("Start roving".to_owned(), Some(Button::Roving))
            }
            Command::ToggleRoving => ("End roving".to_owned(), None),
        };

        self.message = message;
        self.active = active;
    }

    /// Record a failure, the highlighted button is left as is.
    pub fn failed(&mut self, message: impl std::fmt::Display) {
        self.message = format!("Error: {}", message);
    }

    /// Render the control form.
    pub fn render(&self, state: &RobotState) -> String {
        let color = |button: Button| {
            if self.active == Some(button) {
                ACTIVE_COLOR
            } else {
                NORMAL_COLOR
            }
        };

        // Roving may have ended outside of this form.
        let roving_color = if state.is_roving {
            ACTIVE_COLOR
        } else {
            NORMAL_COLOR
        };

        CONTROL_FORM
            .replace("{{forward_color}}", color(Button::Forward))
            .replace("{{backward_color}}", color(Button::Backward))
            .replace("{{left_color}}", color(Button::Left))
            .replace("{{right_color}}", color(Button::Right))
            .replace("{{stop_color}}", color(Button::Stop))
            .replace("{{roving_color}}", roving_color)
            .replace(
                "{{roving_text}}",
                if state.is_roving { ROVING_ON } else { ROVING_OFF },
            )
            .replace("{{speed}}", &state.drive_speed.to_string())
            .replace("{{message}}", &escape(&self.message))
    }
}

/// Render the main page.
pub fn main_page(stream_url: &str) -> String {
    MAIN_PAGE.replace("{{stream_url}}", &escape(stream_url))
}

/// Escape text for inclusion in HTML.
fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            c => output.push(c),
        }
    }

    output
}
