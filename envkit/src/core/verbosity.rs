//! Verbosity forwarding for sub-invocations.

/// Upper bound on repeated `-v`/`-q` characters in a forwarded flag.
const MAX_FLAG_REPEAT: i32 = 3;

/// Translate a verbosity level into a `-v`/`-q` style flag.
///
/// `adjustment` is added to `verbosity` first. Zero yields no flag, positive
/// values yield up to three `v`s, negative values up to three `q`s.
pub fn verbosity_flag(verbosity: i32, adjustment: i32) -> Option<String> {
    let level = verbosity.saturating_add(adjustment);
    if level == 0 {
        return None;
    }
    let (ch, count) = if level > 0 {
        ("v", level.min(MAX_FLAG_REPEAT))
    } else {
        ("q", level.saturating_neg().min(MAX_FLAG_REPEAT))
    };
    Some(format!("-{}", ch.repeat(count as usize)))
}

/// Append the flag for `verbosity + adjustment` to `command`, if any.
pub fn add_verbosity_flag(command: &mut Vec<String>, verbosity: i32, adjustment: i32) {
    if let Some(flag) = verbosity_flag(verbosity, adjustment) {
        command.push(flag);
    }
}
