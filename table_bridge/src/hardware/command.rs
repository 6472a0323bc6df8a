//! Command classification for SS2 protocol log lines.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::ClassifyError;

/// Highest value a warning-flag bitmask may carry (bits 1, 2, 4 and 8)
pub const MAX_WARNING_MASK: u8 = 0b1111;

/// Highest winning number on a single-zero wheel
pub const MAX_WINNING_NUMBER: u8 = 36;

/// A single classified protocol command.
///
/// Built once per log line by [`classify`]; consumers match on it
/// exhaustively so a new family can't be silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `*P 1`
    PowerOn,
    /// `*P 0`
    PowerOff,
    /// `*P OK`
    PowerAck,
    /// `*X;n` with `n` in 1..=6
    GameTransition(u8),
    /// `*F n`
    Fault(u8),
    /// `*W;...;mask`
    WarningFlag(u8),
    /// `*C`
    Calibration,
    /// `*M`
    Statistics,
    /// `*o`
    OperationMode,
    /// `*T`
    TimingSetting,
    /// Bare integer line, 0..=36
    WinningNumber(u8),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PowerOn => write!(f, "*P 1"),
            Command::PowerOff => write!(f, "*P 0"),
            Command::PowerAck => write!(f, "*P OK"),
            Command::GameTransition(n) => write!(f, "*X;{n}"),
            Command::Fault(code) => write!(f, "*F {code}"),
            Command::WarningFlag(mask) => write!(f, "*W;;;;{mask}"),
            Command::Calibration => write!(f, "*C"),
            Command::Statistics => write!(f, "*M"),
            Command::OperationMode => write!(f, "*o"),
            Command::TimingSetting => write!(f, "*T"),
            Command::WinningNumber(n) => write!(f, "{n}"),
        }
    }
}

/// Classify a raw protocol log line.
///
/// The command marker may appear anywhere in the line, so timestamped log
/// output such as `12:00:01 <<< *X;2;085;25` is accepted. Families are tried
/// in a fixed priority order: `*X;`, `*P`, `*F`, `*W`, `*C`, `*M`, `*o`, `*T`,
/// then a bare winning number.
///
/// # Examples
///
/// ```
/// use table_bridge::hardware::{Command, classify};
///
/// assert_eq!(classify("*X;3;120;0;0"), Ok(Command::GameTransition(3)));
/// assert_eq!(classify("*P OK"), Ok(Command::PowerAck));
/// assert_eq!(classify("17"), Ok(Command::WinningNumber(17)));
/// assert!(classify("hello").is_err());
/// ```
pub fn classify(line: &str) -> Result<Command, ClassifyError> {
    let trimmed = line.trim();

    if let Some(rest) = after_marker(trimmed, "*X;") {
        return parse_transition(rest);
    }
    if let Some(rest) = after_marker(trimmed, "*P") {
        return parse_power(rest);
    }
    if let Some(rest) = after_marker(trimmed, "*F") {
        return parse_fault(rest);
    }
    if let Some(rest) = after_marker(trimmed, "*W") {
        return parse_warning(rest);
    }
    if after_marker(trimmed, "*C").is_some() {
        return Ok(Command::Calibration);
    }
    if after_marker(trimmed, "*M").is_some() {
        return Ok(Command::Statistics);
    }
    if after_marker(trimmed, "*o").is_some() {
        return Ok(Command::OperationMode);
    }
    if after_marker(trimmed, "*T").is_some() {
        return Ok(Command::TimingSetting);
    }

    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.parse::<u8>() {
            Ok(n) if n <= MAX_WINNING_NUMBER => Ok(Command::WinningNumber(n)),
            _ => Err(ClassifyError::InvalidOperand {
                family: "winning number",
                operand: trimmed.to_string(),
            }),
        };
    }

    Err(ClassifyError::UnknownCommand(trimmed.to_string()))
}

/// Text following the first occurrence of `marker`, if any
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

/// First operand token after a family marker. Accepts space or `;` separators.
fn first_operand(rest: &str) -> &str {
    rest.trim_start_matches([' ', ';'])
        .split([' ', ';'])
        .next()
        .unwrap_or("")
        .trim()
}

fn parse_transition(rest: &str) -> Result<Command, ClassifyError> {
    let operand = rest.split(';').next().unwrap_or("").trim();
    match operand.parse::<u8>() {
        Ok(n) if (1..=6).contains(&n) => Ok(Command::GameTransition(n)),
        _ => Err(ClassifyError::InvalidOperand {
            family: "*X",
            operand: operand.to_string(),
        }),
    }
}

fn parse_power(rest: &str) -> Result<Command, ClassifyError> {
    match first_operand(rest) {
        "1" => Ok(Command::PowerOn),
        "0" => Ok(Command::PowerOff),
        "OK" => Ok(Command::PowerAck),
        other => Err(ClassifyError::InvalidOperand {
            family: "*P",
            operand: other.to_string(),
        }),
    }
}

fn parse_fault(rest: &str) -> Result<Command, ClassifyError> {
    let operand = first_operand(rest);
    operand
        .parse::<u8>()
        .map(Command::Fault)
        .map_err(|_| ClassifyError::InvalidOperand {
            family: "*F",
            operand: operand.to_string(),
        })
}

/// `*W;a;b;c;mask` - the bitmask is the fifth `;`-separated token, counting
/// the `*W` marker itself as the first.
fn parse_warning(rest: &str) -> Result<Command, ClassifyError> {
    let operand = rest.split(';').nth(4).unwrap_or("").trim();
    match operand.parse::<u8>() {
        Ok(mask) if mask <= MAX_WARNING_MASK => Ok(Command::WarningFlag(mask)),
        _ => Err(ClassifyError::InvalidOperand {
            family: "*W",
            operand: operand.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_game_transitions() {
        for n in 1..=6 {
            let line = format!("*X;{n};085;25;0;0;0");
            assert_eq!(classify(&line), Ok(Command::GameTransition(n)));
        }
    }

    #[test]
    fn test_classify_transition_out_of_range() {
        assert!(matches!(
            classify("*X;7;0"),
            Err(ClassifyError::InvalidOperand { family: "*X", .. })
        ));
        assert!(matches!(
            classify("*X;"),
            Err(ClassifyError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_classify_power() {
        assert_eq!(classify("*P 1"), Ok(Command::PowerOn));
        assert_eq!(classify("*P 0"), Ok(Command::PowerOff));
        assert_eq!(classify("*P OK"), Ok(Command::PowerAck));
        assert!(matches!(
            classify("*P 7"),
            Err(ClassifyError::InvalidOperand { family: "*P", .. })
        ));
    }

    #[test]
    fn test_classify_fault_codes() {
        assert_eq!(classify("*F 2"), Ok(Command::Fault(2)));
        assert_eq!(classify("*F 23"), Ok(Command::Fault(23)));
        // Unrecognised codes are still faults; the tracker decides
        assert_eq!(classify("*F 99"), Ok(Command::Fault(99)));
        assert!(classify("*F").is_err());
    }

    #[test]
    fn test_classify_warning_flag_uses_fifth_token() {
        assert_eq!(classify("*W;0;0;0;5"), Ok(Command::WarningFlag(5)));
        assert_eq!(classify("*W;1;2;3;0"), Ok(Command::WarningFlag(0)));
        assert!(classify("*W;0;0;0;16").is_err());
        assert!(classify("*W;0;0").is_err());
    }

    #[test]
    fn test_classify_mode_families() {
        assert_eq!(classify("*C"), Ok(Command::Calibration));
        assert_eq!(classify("*M;1;2"), Ok(Command::Statistics));
        assert_eq!(classify("*o 1"), Ok(Command::OperationMode));
        assert_eq!(classify("*T 30"), Ok(Command::TimingSetting));
    }

    #[test]
    fn test_classify_winning_number() {
        assert_eq!(classify("0"), Ok(Command::WinningNumber(0)));
        assert_eq!(classify(" 36 \r"), Ok(Command::WinningNumber(36)));
        assert!(matches!(
            classify("37"),
            Err(ClassifyError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_classify_with_log_prefix() {
        assert_eq!(
            classify("2024-05-01 12:00:01.123 Receive <<< *X;4;120;0"),
            Ok(Command::GameTransition(4))
        );
    }

    #[test]
    fn test_transition_marker_has_priority() {
        // A line carrying several markers resolves to the first family in order
        assert_eq!(classify("*P 1 *X;2"), Ok(Command::GameTransition(2)));
    }

    #[test]
    fn test_classify_unknown() {
        assert!(matches!(
            classify("garbage"),
            Err(ClassifyError::UnknownCommand(_))
        ));
        assert!(matches!(classify(""), Err(ClassifyError::UnknownCommand(_))));
    }

    #[test]
    fn test_display_reclassifies() {
        let commands = [
            Command::PowerOn,
            Command::GameTransition(5),
            Command::Fault(13),
            Command::WarningFlag(9),
            Command::WinningNumber(12),
        ];
        for command in commands {
            assert_eq!(classify(&command.to_string()), Ok(command));
        }
    }
}
