//! Console commands for the host simulator.
//!
//! Each line typed at the prompt plays one action of the central (the phone).

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Central connects and subscribes to status notifications.
    Connect,
    /// Central disconnects.
    Disconnect,
    /// Write the network ID characteristic.
    NetworkId(String),
    /// Write the network secret characteristic.
    Secret(String),
    /// Read the status characteristic.
    Status,
    /// Show help.
    Help,
    /// Exit the simulator.
    Quit,
    /// Unknown or invalid command.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    ///
    /// Values keep inner spaces (`id My Home Net`) but not surrounding ones.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ConsoleCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd.to_lowercase().as_str() {
            "connect" | "c" => ConsoleCommand::Connect,
            "disconnect" | "d" => ConsoleCommand::Disconnect,
            "id" | "ssid" => {
                if args.is_empty() {
                    ConsoleCommand::Unknown("Usage: id <network id>".to_string())
                } else {
                    ConsoleCommand::NetworkId(args.to_string())
                }
            }
            "secret" | "pw" => {
                if args.is_empty() {
                    ConsoleCommand::Unknown("Usage: secret <network secret>".to_string())
                } else {
                    ConsoleCommand::Secret(args.to_string())
                }
            }
            "status" | "s" => ConsoleCommand::Status,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  connect            Central connects and subscribes to status
  disconnect         Central disconnects (device re-advertises)
  id <value>         Write the network ID characteristic
  secret <value>     Write the network secret characteristic
  status             Read the status characteristic
  help               Show this help
  quit               Exit

Shortcuts: c=connect, d=disconnect, pw=secret, s=status, h=help, q=quit

Example session:
  connect
  id HomeNet
  secret pw1234
  status
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_disconnect() {
        assert_eq!(ConsoleCommand::parse("connect"), ConsoleCommand::Connect);
        assert_eq!(ConsoleCommand::parse("c"), ConsoleCommand::Connect);
        assert_eq!(ConsoleCommand::parse("DISCONNECT"), ConsoleCommand::Disconnect);
    }

    #[test]
    fn test_parse_id_keeps_inner_spaces() {
        assert_eq!(
            ConsoleCommand::parse("id  My Home Net "),
            ConsoleCommand::NetworkId("My Home Net".to_string())
        );
    }

    #[test]
    fn test_parse_secret() {
        assert_eq!(
            ConsoleCommand::parse("pw hunter22"),
            ConsoleCommand::Secret("hunter22".to_string())
        );
    }

    #[test]
    fn test_parse_missing_value() {
        assert!(matches!(ConsoleCommand::parse("id"), ConsoleCommand::Unknown(_)));
        assert!(matches!(ConsoleCommand::parse("secret   "), ConsoleCommand::Unknown(_)));
    }

    #[test]
    fn test_parse_status_help_quit() {
        assert_eq!(ConsoleCommand::parse("s"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("?"), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("exit"), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert!(matches!(ConsoleCommand::parse("foo"), ConsoleCommand::Unknown(_)));
        assert_eq!(ConsoleCommand::parse("   "), ConsoleCommand::Unknown(String::new()));
    }
}
