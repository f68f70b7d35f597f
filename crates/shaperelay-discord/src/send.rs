use serenity::http::Http;
use serenity::model::id::ChannelId;

/// Discord rejects messages over 2000 characters; replies are cut below that.
pub const REPLY_CHUNK_CHARS: usize = 1950;

/// Byte offset of the first character past `max_chars`, or `None` when all
/// of `text` fits.
fn char_limit_offset(text: &str, max_chars: usize) -> Option<usize> {
    text.char_indices().nth(max_chars).map(|(at, _)| at)
}

/// Cut a provider reply into Discord-sized pieces.
///
/// Each cut lands on the last newline inside the limit, else the last space.
/// A run with neither is cut at the limit. Leading whitespace of a piece is
/// dropped; an empty reply yields no pieces.
pub fn split_reply(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some(limit) = char_limit_offset(rest, REPLY_CHUNK_CHARS) {
        let window = &rest[..limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|at| *at > 0)
            .unwrap_or(limit);
        pieces.push(&rest[..cut]);
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

/// Post `text` to `channel_id`, one message per piece, in order.
pub async fn send_reply(
    http: &Http,
    channel_id: ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    for piece in split_reply(text) {
        channel_id.say(http, piece).await?;
    }
    Ok(())
}
