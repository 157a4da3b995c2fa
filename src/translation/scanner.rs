/// Scanner states for host-variable parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    /// Saw the prefix; the next character decides whether a name follows.
    NameStart,
    Name,
    /// Saw `\` outside quotes; the next character is copied verbatim.
    Escape,
    Quoted(char),
    QuotedEscape(char),
}

pub(super) fn is_quote(ch: char) -> bool {
    matches!(ch, '\'' | '"' | '`')
}

pub(super) fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic()
}

pub(super) fn is_name_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
}
