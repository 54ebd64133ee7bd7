//! Chat Moderation
//!
//! Tick-expiring mutes keyed by network address, plus a spam heuristic
//! over chat text. Spammers are muted automatically; everything here is
//! driven by the simulation tick counter, never wall-clock time.

use tracing::info;

use crate::TICK_RATE;

/// Upper bound on simultaneously tracked mutes.
pub const MAX_MUTES: usize = 32;

/// Automatic mute duration handed to detected spammers, in seconds.
pub const SPAM_MUTE_SECS: u32 = 60;

/// One muted address.
#[derive(Clone, Debug)]
pub struct MuteEntry {
    /// The muted network address.
    pub addr: String,
    /// Tick at which the mute expires.
    pub expires_tick: u64,
}

/// The set of active mutes.
#[derive(Clone, Debug, Default)]
pub struct MuteList {
    mutes: Vec<MuteEntry>,
    last_purge_tick: u64,
}

impl MuteList {
    /// Create an empty mute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active mutes, purging expired entries at most once per
    /// tick.
    pub fn num_mutes(&mut self, now: u64) -> usize {
        if self.last_purge_tick != now {
            self.last_purge_tick = now;
            self.mutes.retain(|m| m.expires_tick > now);
        }
        self.mutes.len()
    }

    /// Mute an address for a number of seconds.
    ///
    /// A negative duration removes any existing mute instead. Re-muting
    /// an already muted address overwrites its expiry. Returns true if a
    /// mute is in place afterwards.
    pub fn add_mute(&mut self, addr: &str, secs: i32, now: u64) -> bool {
        if secs < 0 {
            self.unmute_addr(addr);
            return false;
        }

        let expires = now + secs as u64 * TICK_RATE as u64;
        if let Some(entry) = self.mutes.iter_mut().find(|m| m.addr == addr) {
            entry.expires_tick = expires; // overwrite mute
            return true;
        }

        if self.num_mutes(now) >= MAX_MUTES {
            return false;
        }
        self.mutes.push(MuteEntry {
            addr: addr.to_string(),
            expires_tick: expires,
        });
        true
    }

    /// Remaining mute duration in ticks for an address, if muted.
    pub fn muted(&mut self, addr: &str, now: u64) -> Option<u64> {
        if addr.is_empty() {
            return None;
        }
        self.num_mutes(now);
        self.mutes
            .iter()
            .find(|m| m.addr == addr)
            .map(|m| m.expires_tick - now)
    }

    /// Mute entry by list index, for listing commands.
    pub fn get(&self, index: usize) -> Option<&MuteEntry> {
        self.mutes.get(index)
    }

    /// Remove the mute on an address. Returns true if one existed.
    pub fn unmute_addr(&mut self, addr: &str) -> bool {
        let before = self.mutes.len();
        self.mutes.retain(|m| m.addr != addr);
        let removed = self.mutes.len() != before;
        if removed {
            info!(addr, "unmuted");
        }
        removed
    }

    /// Remove a mute by list index. Returns the unmuted address.
    pub fn unmute_index(&mut self, index: usize) -> Option<String> {
        if index >= self.mutes.len() {
            return None;
        }
        let entry = self.mutes.remove(index);
        info!(addr = %entry.addr, "unmuted");
        Some(entry.addr)
    }
}

// =============================================================================
// SPAM DETECTION
// =============================================================================

/// Stylized unicode alphabets favored by ad bots, QWERTY order.
const FANCY_ALPHABETS: [char; 130] = [
    '𝕢', '𝕨', '𝕖', '𝕣', '𝕥', '𝕪', '𝕦', '𝕚', '𝕠', '𝕡', '𝕒', '𝕤', '𝕕', '𝕗', '𝕘', '𝕙', '𝕛', '𝕜',
    '𝕝', '𝕫', '𝕩', '𝕔', '𝕧', '𝕓', '𝕟', '𝕞', 'ｑ', 'ｗ', 'ｅ', 'ｒ', 'ｔ', 'ｙ', 'ｕ', 'ｉ', 'ｏ',
    'ｐ', 'ａ', 'ｓ', 'ｄ', 'ｆ', 'ｇ', 'ｈ', 'ｊ', 'ｋ', 'ｌ', 'ｚ', 'ｘ', 'ｃ', 'ｖ', 'ｂ', 'ｎ',
    'ｍ', '🆀', '🆆', '🅴', '🆁', '🆃', '🆈', '🆄', '🅸', '🅾', '🅿', '🅰', '🆂', '🅳', '🅵', '🅶',
    '🅷', '🅹', '🅺', '🅻', '🆉', '🆇', '🅲', '🆅', '🅱', '🅽', '🅼', '🅀', '🅆', '🄴', '🅁', '🅃',
    '🅈', '🅄', '🄸', '🄾', '🄿', '🄰', '🅂', '🄳', '🄵', '🄶', '🄷', '🄹', '🄺', '🄻', '🅉', '🅇',
    '🄲', '🅅', '🄱', '🄽', '🄼', 'ⓠ', 'ⓦ', 'ⓔ', 'ⓡ', 'ⓣ', 'ⓨ', 'ⓤ', 'ⓘ', 'ⓞ', 'ⓟ', 'ⓐ',
    'ⓢ', 'ⓓ', 'ⓕ', 'ⓖ', 'ⓗ', 'ⓙ', 'ⓚ', 'ⓛ', 'ⓩ', 'ⓧ', 'ⓒ', 'ⓥ', 'ⓑ', 'ⓝ', 'ⓜ',
];

/// General needles to disallow.
const DISALLOWED_STRINGS: [&str; 6] = ["krx", "discord.gg", "http", "free", "bot client", "cheat client"];

/// Heuristic spam check for a chat message.
///
/// Flagged strings accumulate strikes (some count double); two strikes
/// mark the message as spam.
pub fn is_spam(msg: &str) -> bool {
    let mut count = 0;
    let lower = msg.to_lowercase();

    // fancy alphabet detection
    let fancy_count = FANCY_ALPHABETS.iter().filter(|&&c| msg.contains(c)).count();
    if fancy_count > 3 {
        count += 2;
    }

    for needle in DISALLOWED_STRINGS {
        if lower.contains(needle) {
            count += 1;
        }
    }

    // anti whisper ad bot
    if (lower.contains("/whisper") || lower.contains("/w"))
        && lower.contains("bro, check out this client")
    {
        count += 2;
    }

    count >= 2
}

/// Outcome of vetting one chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatVerdict {
    /// Deliver the message.
    Allowed,
    /// Sender is muted; seconds until the mute lifts.
    Muted(u64),
    /// Message flagged as spam; the sender has been auto-muted.
    Spam,
}

/// Vet a chat message from an address, auto-muting detected spammers.
pub fn check_chat(mutes: &mut MuteList, addr: &str, text: &str, now: u64) -> ChatVerdict {
    if let Some(remaining) = mutes.muted(addr, now) {
        return ChatVerdict::Muted(remaining / TICK_RATE as u64);
    }

    if is_spam(text) {
        mutes.add_mute(addr, SPAM_MUTE_SECS as i32, now);
        return ChatVerdict::Spam;
    }

    ChatVerdict::Allowed
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mute_expires() {
        let mut mutes = MuteList::new();
        assert!(mutes.add_mute("10.0.0.1", 2, 100));

        assert!(mutes.muted("10.0.0.1", 100).is_some());
        assert!(mutes.muted("10.0.0.1", 100 + 2 * TICK_RATE as u64 - 1).is_some());
        assert!(mutes.muted("10.0.0.1", 100 + 2 * TICK_RATE as u64).is_none());
    }

    #[test]
    fn test_remute_overwrites_expiry() {
        let mut mutes = MuteList::new();
        mutes.add_mute("10.0.0.1", 2, 0);
        mutes.add_mute("10.0.0.1", 60, 0);

        assert_eq!(mutes.num_mutes(0), 1);
        assert!(mutes.muted("10.0.0.1", 10 * TICK_RATE as u64).is_some());
    }

    #[test]
    fn test_negative_duration_unmutes() {
        let mut mutes = MuteList::new();
        mutes.add_mute("10.0.0.1", 60, 0);
        assert!(!mutes.add_mute("10.0.0.1", -1, 1));
        assert!(mutes.muted("10.0.0.1", 1).is_none());
    }

    #[test]
    fn test_unmute_by_index() {
        let mut mutes = MuteList::new();
        mutes.add_mute("10.0.0.1", 60, 0);
        mutes.add_mute("10.0.0.2", 60, 0);

        assert_eq!(mutes.unmute_index(0), Some("10.0.0.1".to_string()));
        assert_eq!(mutes.num_mutes(0), 1);
        assert_eq!(mutes.get(0).map(|m| m.addr.as_str()), Some("10.0.0.2"));
        assert_eq!(mutes.unmute_index(5), None);
    }

    #[test]
    fn test_empty_address_never_muted() {
        let mut mutes = MuteList::new();
        assert!(mutes.muted("", 0).is_none());
    }

    #[test]
    fn test_spam_needs_two_strikes() {
        assert!(!is_spam("hello there"));
        assert!(!is_spam("krx is a word"));
        assert!(is_spam("free stuff at http://example.com"));
        assert!(is_spam("join discord.gg/xyz for a free bot client"));
    }

    #[test]
    fn test_spam_fancy_alphabet() {
        // Dense stylized lettering alone is enough
        assert!(is_spam("𝕙𝕖𝕝𝕝𝕠 𝕨𝕠𝕣𝕝𝕕"));
        // A couple of stylized glyphs is not
        assert!(!is_spam("nice 𝕘𝕘"));
    }

    #[test]
    fn test_spam_whisper_ad() {
        assert!(is_spam("/w somebody bro, check out this client"));
        assert!(!is_spam("/w somebody hello"));
    }

    #[test]
    fn test_check_chat_auto_mutes_spammer() {
        let mut mutes = MuteList::new();

        assert_eq!(check_chat(&mut mutes, "10.0.0.1", "hi all", 0), ChatVerdict::Allowed);
        assert_eq!(
            check_chat(&mut mutes, "10.0.0.1", "free cheat client at http://x", 0),
            ChatVerdict::Spam
        );
        assert!(matches!(
            check_chat(&mut mutes, "10.0.0.1", "hi again", 1),
            ChatVerdict::Muted(_)
        ));

        // The mute lifts eventually
        let later = 1 + SPAM_MUTE_SECS as u64 * TICK_RATE as u64;
        assert_eq!(check_chat(&mut mutes, "10.0.0.1", "hi again", later), ChatVerdict::Allowed);
    }
}
