/// One line of Twitch chat (IRCv3 with tags).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IrcMessage {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl IrcMessage {
    /// Parses a single line (without the `\r\n` terminator).
    pub fn parse(line: &str) -> Self {
        let mut rest = line.trim();
        let mut message = Self::default();

        if let Some(stripped) = rest.strip_prefix('@') {
            match stripped.split_once(' ') {
                Some((tags, tail)) => {
                    message.tags = Some(tags.to_string());
                    rest = tail.trim_start();
                }
                None => {
                    message.tags = Some(stripped.to_string());
                    return message;
                }
            }
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            match stripped.split_once(' ') {
                Some((prefix, tail)) => {
                    message.prefix = Some(prefix.to_string());
                    rest = tail.trim_start();
                }
                None => {
                    message.prefix = Some(stripped.to_string());
                    return message;
                }
            }
        }

        let (command, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        message.command = command.to_ascii_uppercase();

        let (middle, trailing) = match tail.strip_prefix(':') {
            Some(trailing) => ("", Some(trailing)),
            None => match tail.split_once(" :") {
                Some((middle, trailing)) => (middle, Some(trailing)),
                None => (tail, None),
            },
        };
        message.params = middle.split_whitespace().map(str::to_string).collect();
        message.trailing = trailing.map(str::to_string);

        message
    }

    /// Nickname part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split_once('!').map_or(prefix, |(nick, _)| nick);
        (!nick.is_empty()).then_some(nick)
    }

    /// Value of a tag such as `display-name`. Empty values count as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_deref()?
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }

    /// Channel a PRIVMSG/JOIN targets, without the leading `#`.
    pub fn channel(&self) -> Option<&str> {
        self.params
            .first()
            .map(|param| param.trim_start_matches('#'))
    }
}

/// Splits a transport frame into its non-empty IRC lines.
pub fn split_lines(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split("\r\n")
        .flat_map(|chunk| chunk.split('\n'))
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_privmsg() {
        let line = "@badge-info=;display-name=Viewer_One;user-id=42 :viewer_one!viewer_one@viewer_one.tmi.twitch.tv PRIVMSG #streamer :hello there :)";
        let message = IrcMessage::parse(line);

        assert_eq!(message.command, "PRIVMSG");
        assert_eq!(message.nick(), Some("viewer_one"));
        assert_eq!(message.tag("display-name"), Some("Viewer_One"));
        assert_eq!(message.tag("user-id"), Some("42"));
        assert_eq!(message.tag("badge-info"), None);
        assert_eq!(message.channel(), Some("streamer"));
        assert_eq!(message.trailing.as_deref(), Some("hello there :)"));
    }

    #[test]
    fn parses_ping_without_prefix() {
        let message = IrcMessage::parse("PING :tmi.twitch.tv");
        assert_eq!(message.command, "PING");
        assert!(message.params.is_empty());
        assert_eq!(message.trailing.as_deref(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn parses_numeric_reply_params() {
        let message = IrcMessage::parse(":tmi.twitch.tv 001 bridge_bot :Welcome, GLHF!");
        assert_eq!(message.command, "001");
        assert_eq!(message.params, vec!["bridge_bot".to_string()]);
        assert_eq!(message.prefix.as_deref(), Some("tmi.twitch.tv"));
        assert_eq!(message.nick(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn split_lines_handles_batched_frames() {
        let frame = ":a!a@a PRIVMSG #c :one\r\n:b!b@b PRIVMSG #c :two\r\n";
        let lines: Vec<&str> = split_lines(frame).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(":two"));
    }
}
