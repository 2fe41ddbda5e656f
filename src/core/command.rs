//! Command parser for the explorer prompt

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Chain selection
    Chains,
    Chain(String),
    Open(String),

    // Listings
    Tokens(String),
    History(Option<String>),
    Token(String),
    Owners(String),
    Next,
    Prev,
    Modules,

    // Wallet session
    Connect(String),
    Disconnect,

    Status,
    Help,
    Quit,

    // Unknown command
    Unknown(String),
}

/// Parse one line of input
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let mut parts = input.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let args = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.to_lowercase().as_str() {
        "chains" | "ls" => Command::Chains,
        "chain" | "switch" => match args {
            Some(rid) => Command::Chain(rid),
            None => Command::Unknown(input.to_string()),
        },
        "open" | "goto" => match args {
            Some(path) => Command::Open(path),
            None => Command::Unknown(input.to_string()),
        },

        "tokens" | "tok" => match args {
            Some(account) => Command::Tokens(account),
            None => Command::Unknown(input.to_string()),
        },
        "history" | "hist" => Command::History(args),
        "token" | "nft" => match args {
            Some(uid) => Command::Token(uid),
            None => Command::Unknown(input.to_string()),
        },
        "owners" => match args {
            Some(uid) => Command::Owners(uid),
            None => Command::Unknown(input.to_string()),
        },
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "modules" | "mods" => Command::Modules,

        "connect" | "conn" => match args {
            Some(address) => Command::Connect(address),
            None => Command::Unknown(input.to_string()),
        },
        "disconnect" => Command::Disconnect,

        "status" | "st" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,

        _ => Command::Unknown(input.to_string()),
    }
}
