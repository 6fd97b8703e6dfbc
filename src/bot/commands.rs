//! Bot command parsing

/// Commands the bot answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    All,
    AdminOnly,
    IgnoreMe,
}

impl Command {
    /// Parse the leading `/command[@botname]` token of a message.
    ///
    /// A command addressed to a different bot is not ours and yields `None`,
    /// as does anything that isn't a known command.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?.strip_prefix('/')?;
        let (name, target) = match token.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (token, None),
        };

        if let (Some(target), Some(me)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(me) {
                return None;
            }
        }

        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "all" => Some(Self::All),
            "adminonly" => Some(Self::AdminOnly),
            "ignoreme" => Some(Self::IgnoreMe),
            _ => None,
        }
    }
}
